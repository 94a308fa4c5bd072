//! Head-to-head pong.
//!
//! Paddles are move-driven (`{"direction": "UP"|"DOWN"}` payloads); the
//! ball advances on the server tick via [`PongGame::update_ball`]. First
//! player to `MAX_SCORE` points wins.

use crate::error::ArenaError;
use crate::games::payload_str;
use rand::Rng;
use serde_json::json;
use shared::ClientId;

pub const BOARD_WIDTH: i32 = 800;
pub const BOARD_HEIGHT: i32 = 400;
pub const PADDLE_HEIGHT: i32 = 80;
pub const PADDLE_WIDTH: i32 = 10;
pub const BALL_SIZE: i32 = 10;
pub const PADDLE_STEP: i32 = 20;
pub const MAX_SCORE: u32 = 5;

#[derive(Debug, Clone)]
pub struct PongGame {
    players: [ClientId; 2],
    paddle_y: [i32; 2],
    ball_x: i32,
    ball_y: i32,
    ball_vx: i32,
    ball_vy: i32,
    scores: [u32; 2],
    winner: Option<ClientId>,
}

impl PongGame {
    pub fn new(players: [ClientId; 2]) -> Self {
        let mut game = Self {
            players,
            paddle_y: [BOARD_HEIGHT / 2 - PADDLE_HEIGHT / 2; 2],
            ball_x: 0,
            ball_y: 0,
            ball_vx: 0,
            ball_vy: 0,
            scores: [0, 0],
            winner: None,
        };
        game.reset_ball();
        game
    }

    fn reset_ball(&mut self) {
        let mut rng = rand::thread_rng();
        self.ball_x = BOARD_WIDTH / 2;
        self.ball_y = BOARD_HEIGHT / 2;
        self.ball_vx = if rng.gen_bool(0.5) { 5 } else { -5 };
        self.ball_vy = rng.gen_range(-3..=3);
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

        match payload_str(payload, "direction")? {
            "UP" => {
                if self.paddle_y[idx] > 0 {
                    self.paddle_y[idx] -= PADDLE_STEP;
                }
            }
            "DOWN" => {
                if self.paddle_y[idx] < BOARD_HEIGHT - PADDLE_HEIGHT {
                    self.paddle_y[idx] += PADDLE_STEP;
                }
            }
            other => {
                return Err(ArenaError::InvalidMove(format!(
                    "unknown direction '{}'",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Advances the ball one step: wall and paddle bounces, scoring, win
    /// check. Called once per server tick while the session is running.
    pub fn update_ball(&mut self) {
        if self.winner.is_some() {
            return;
        }

        let mut rng = rand::thread_rng();

        self.ball_x += self.ball_vx;
        self.ball_y += self.ball_vy;

        if self.ball_y <= 0 || self.ball_y >= BOARD_HEIGHT - BALL_SIZE {
            self.ball_vy = -self.ball_vy;
        }

        let left_paddle = (self.paddle_y[0]..=self.paddle_y[0] + PADDLE_HEIGHT)
            .contains(&self.ball_y);
        if self.ball_x <= PADDLE_WIDTH && left_paddle {
            self.ball_vx = -self.ball_vx;
            self.ball_vy += rng.gen_range(-2..=2);
        }

        let right_paddle = (self.paddle_y[1]..=self.paddle_y[1] + PADDLE_HEIGHT)
            .contains(&self.ball_y);
        if self.ball_x >= BOARD_WIDTH - PADDLE_WIDTH - BALL_SIZE && right_paddle {
            self.ball_vx = -self.ball_vx;
            self.ball_vy += rng.gen_range(-2..=2);
        }

        if self.ball_x < 0 {
            self.scores[1] += 1;
            self.reset_ball();
        } else if self.ball_x > BOARD_WIDTH {
            self.scores[0] += 1;
            self.reset_ball();
        }

        if self.scores[0] >= MAX_SCORE {
            self.winner = Some(self.players[0]);
        } else if self.scores[1] >= MAX_SCORE {
            self.winner = Some(self.players[1]);
        }
    }

    pub fn winner(&self) -> Option<ClientId> {
        self.winner
    }

    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "game_type": "pong",
            "board_width": BOARD_WIDTH,
            "board_height": BOARD_HEIGHT,
            "player1_y": self.paddle_y[0],
            "player2_y": self.paddle_y[1],
            "ball_x": self.ball_x,
            "ball_y": self.ball_y,
            "player1_score": self.scores[0],
            "player2_score": self.scores[1],
            "winner_id": self.winner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn direction(d: &str) -> serde_json::Value {
        json!({ "direction": d })
    }

    #[test]
    fn test_paddle_moves_within_bounds() {
        let mut game = PongGame::new([1, 2]);
        let start = game.paddle_y[0];

        game.apply_move(1, &direction("UP")).unwrap();
        assert_eq!(game.paddle_y[0], start - PADDLE_STEP);

        game.apply_move(1, &direction("DOWN")).unwrap();
        assert_eq!(game.paddle_y[0], start);
    }

    #[test]
    fn test_paddle_stops_at_top_edge() {
        let mut game = PongGame::new([1, 2]);
        game.paddle_y[0] = 0;

        game.apply_move(1, &direction("UP")).unwrap();
        assert_eq!(game.paddle_y[0], 0);
    }

    #[test]
    fn test_paddle_stops_at_bottom_edge() {
        let mut game = PongGame::new([1, 2]);
        game.paddle_y[1] = BOARD_HEIGHT - PADDLE_HEIGHT;

        game.apply_move(2, &direction("DOWN")).unwrap();
        assert_eq!(game.paddle_y[1], BOARD_HEIGHT - PADDLE_HEIGHT);
    }

    #[test]
    fn test_unknown_direction_is_invalid_move() {
        let mut game = PongGame::new([1, 2]);
        let result = game.apply_move(1, &direction("LEFT"));
        assert!(matches!(result, Err(ArenaError::InvalidMove(_))));
    }

    #[test]
    fn test_ball_bounces_off_walls() {
        let mut game = PongGame::new([1, 2]);
        game.ball_x = BOARD_WIDTH / 2;
        game.ball_y = 1;
        game.ball_vx = 5;
        game.ball_vy = -3;

        game.update_ball();
        assert!(game.ball_vy > 0);
    }

    #[test]
    fn test_missed_ball_scores_opponent() {
        let mut game = PongGame::new([1, 2]);
        game.ball_x = -6;
        game.ball_y = BOARD_HEIGHT - 1; // out of paddle reach
        game.ball_vx = -5;
        game.ball_vy = 0;

        game.update_ball();

        assert_eq!(game.scores[1], 1);
        // Ball resets to center after a point.
        assert_eq!(game.ball_x, BOARD_WIDTH / 2);
        assert_eq!(game.ball_y, BOARD_HEIGHT / 2);
    }

    #[test]
    fn test_reaching_max_score_wins() {
        let mut game = PongGame::new([1, 2]);
        game.scores[0] = MAX_SCORE - 1;
        game.ball_x = BOARD_WIDTH + 1;
        game.ball_y = BOARD_HEIGHT / 2;
        game.ball_vx = 0;
        game.ball_vy = 0;

        game.update_ball();

        assert_eq!(game.scores[0], MAX_SCORE);
        assert_eq!(game.winner(), Some(1));
    }

    #[test]
    fn test_ball_frozen_after_win() {
        let mut game = PongGame::new([1, 2]);
        game.winner = Some(1);
        let (x, y) = (game.ball_x, game.ball_y);

        game.update_ball();
        assert_eq!((game.ball_x, game.ball_y), (x, y));
    }

    #[test]
    fn test_snapshot_contents() {
        let game = PongGame::new([1, 2]);
        let snap = game.snapshot();

        assert_eq!(snap["game_type"], "pong");
        assert_eq!(snap["ball_x"], BOARD_WIDTH / 2);
        assert_eq!(snap["player1_score"], 0);
        assert!(snap["winner_id"].is_null());
    }
}
