//! Two-player snake on a shared grid.
//!
//! Each move payload is `{"direction": "UP"|"DOWN"|"LEFT"|"RIGHT"}` and
//! advances that player's snake one cell. Running into a wall, yourself or
//! the opponent loses the game; eating food grows the snake and scores a
//! point.

use crate::error::ArenaError;
use crate::games::payload_str;
use rand::Rng;
use serde_json::json;
use shared::ClientId;

pub const BOARD_SIZE: i32 = 20;

type Cell = (i32, i32);

#[derive(Debug, Clone)]
pub struct SnakeGame {
    players: [ClientId; 2],
    snakes: [Vec<Cell>; 2],
    directions: [String; 2],
    food: Cell,
    scores: [u32; 2],
    winner: Option<ClientId>,
}

impl SnakeGame {
    pub fn new(players: [ClientId; 2]) -> Self {
        let snakes = [
            vec![(10, 5), (10, 4), (10, 3)],
            vec![(10, 15), (10, 16), (10, 17)],
        ];
        let food = Self::place_food(&snakes);

        Self {
            players,
            snakes,
            directions: ["UP".to_string(), "DOWN".to_string()],
            food,
            scores: [0, 0],
            winner: None,
        }
    }

    /// Picks a free cell for the next food item.
    fn place_food(snakes: &[Vec<Cell>; 2]) -> Cell {
        let mut rng = rand::thread_rng();
        loop {
            let cell = (rng.gen_range(0..BOARD_SIZE), rng.gen_range(0..BOARD_SIZE));
            if !snakes[0].contains(&cell) && !snakes[1].contains(&cell) {
                return cell;
            }
        }
    }

    fn player_index(&self, client_id: ClientId) -> Result<usize, ArenaError> {
        self.players
            .iter()
            .position(|&p| p == client_id)
            .ok_or_else(|| ArenaError::InvalidMove(format!("client {} not in game", client_id)))
    }

    pub fn apply_move(
        &mut self,
        client_id: ClientId,
        payload: &serde_json::Value,
    ) -> Result<(), ArenaError> {
        if self.winner.is_some() {
            return Err(ArenaError::InvalidMove("game already decided".to_string()));
        }

        let idx = self.player_index(client_id)?;
        let direction = payload_str(payload, "direction")?;

        let head = self.snakes[idx][0];
        let new_head = match direction {
            "UP" => (head.0, head.1 - 1),
            "DOWN" => (head.0, head.1 + 1),
            "LEFT" => (head.0 - 1, head.1),
            "RIGHT" => (head.0 + 1, head.1),
            other => {
                return Err(ArenaError::InvalidMove(format!(
                    "unknown direction '{}'",
                    other
                )))
            }
        };
        self.directions[idx] = direction.to_string();

        let opponent = 1 - idx;

        // Hitting a wall or any snake body ends the game in the opponent's
        // favor. The move itself is still valid input.
        let out_of_bounds = new_head.0 < 0
            || new_head.0 >= BOARD_SIZE
            || new_head.1 < 0
            || new_head.1 >= BOARD_SIZE;
        if out_of_bounds
            || self.snakes[idx].contains(&new_head)
            || self.snakes[opponent].contains(&new_head)
        {
            self.winner = Some(self.players[opponent]);
            return Ok(());
        }

        self.snakes[idx].insert(0, new_head);

        if new_head == self.food {
            self.scores[idx] += 1;
            self.food = Self::place_food(&self.snakes);
        } else {
            self.snakes[idx].pop();
        }

        Ok(())
    }

    pub fn winner(&self) -> Option<ClientId> {
        self.winner
    }

    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "game_type": "snake",
            "board_size": BOARD_SIZE,
            "player1_snake": self.snakes[0],
            "player2_snake": self.snakes[1],
            "player1_direction": self.directions[0],
            "player2_direction": self.directions[1],
            "food": self.food,
            "player1_score": self.scores[0],
            "player2_score": self.scores[1],
            "winner_id": self.winner,
        })
    }
}
