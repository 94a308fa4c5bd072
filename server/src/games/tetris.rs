//! Competitive tetris: two independent boards, one winner.
//!
//! Move payloads are `{"action": "LEFT"|"RIGHT"|"DOWN"|"ROTATE"}`. A DOWN
//! that cannot descend locks the piece, clears full lines and spawns the
//! next piece; if the fresh piece does not fit, that player tops out and
//! the opponent wins.

use crate::error::ArenaError;
use crate::games::payload_str;
use rand::seq::SliceRandom;
use serde_json::json;
use shared::ClientId;

pub const BOARD_WIDTH: usize = 10;
pub const BOARD_HEIGHT: usize = 20;
pub const SPAWN_X: i32 = 4;
pub const POINTS_PER_LINE: u32 = 100;

type Board = Vec<Vec<u8>>;
type Piece = Vec<Vec<u8>>;

/// One player's half of the match.
#[derive(Debug, Clone)]
struct PlayerBoard {
    board: Board,
    piece: Piece,
    piece_x: i32,
    piece_y: i32,
    score: u32,
    lines: u32,
}

impl PlayerBoard {
    fn new() -> Self {
        Self {
            board: vec![vec![0; BOARD_WIDTH]; BOARD_HEIGHT],
            piece: random_piece(),
            piece_x: SPAWN_X,
            piece_y: 0,
            score: 0,
            lines: 0,
        }
    }
}

fn random_piece() -> Piece {
    let pieces: [&[&[u8]]; 7] = [
        &[&[1, 1, 1, 1]],             // I
        &[&[1, 1], &[1, 1]],          // O
        &[&[0, 1, 0], &[1, 1, 1]],    // T
        &[&[0, 1, 1], &[1, 1, 0]],    // S
        &[&[1, 1, 0], &[0, 1, 1]],    // Z
        &[&[1, 0, 0], &[1, 1, 1]],    // J
        &[&[0, 0, 1], &[1, 1, 1]],    // L
    ];

    let mut rng = rand::thread_rng();
    let chosen = pieces.choose(&mut rng).unwrap();
    chosen.iter().map(|row| row.to_vec()).collect()
}

/// Rotates a piece 90 degrees clockwise.
fn rotate(piece: &Piece) -> Piece {
    let rows = piece.len();
    let cols = piece[0].len();
    let mut rotated = vec![vec![0; rows]; cols];

    for (y, row) in piece.iter().enumerate() {
        for (x, &cell) in row.iter().enumerate() {
            rotated[x][rows - 1 - y] = cell;
        }
    }

    rotated
}

fn can_place(board: &Board, piece: &Piece, x: i32, y: i32) -> bool {
    for (py, row) in piece.iter().enumerate() {
        for (px, &cell) in row.iter().enumerate() {
            if cell == 0 {
                continue;
            }
            let nx = x + px as i32;
            let ny = y + py as i32;
            if nx < 0 || nx >= BOARD_WIDTH as i32 || ny >= BOARD_HEIGHT as i32 {
                return false;
            }
            if ny >= 0 && board[ny as usize][nx as usize] != 0 {
                return false;
            }
        }
    }
    true
}

fn place(board: &mut Board, piece: &Piece, x: i32, y: i32) {
    for (py, row) in piece.iter().enumerate() {
        for (px, &cell) in row.iter().enumerate() {
            if cell != 0 {
                let nx = x + px as i32;
                let ny = y + py as i32;
                if ny >= 0 {
                    board[ny as usize][nx as usize] = 1;
                }
            }
        }
    }
}

fn clear_lines(board: &mut Board) -> u32 {
    let mut cleared = 0;
    let mut y = BOARD_HEIGHT as i32 - 1;
    while y >= 0 {
        if board[y as usize].iter().all(|&c| c != 0) {
            board.remove(y as usize);
            board.insert(0, vec![0; BOARD_WIDTH]);
            cleared += 1;
        } else {
            y -= 1;
        }
    }
    cleared
}

#[derive(Debug, Clone)]
pub struct TetrisGame {
    players: [ClientId; 2],
    boards: [PlayerBoard; 2],
    winner: Option<ClientId>,
}

impl TetrisGame {
    pub fn new(players: [ClientId; 2]) -> Self {
        Self {
            players,
            boards: [PlayerBoard::new(), PlayerBoard::new()],
            winner: None,
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
        let action = payload_str(payload, "action")?;

        let side = &mut self.boards[idx];
        match action {
            "LEFT" => {
                if can_place(&side.board, &side.piece, side.piece_x - 1, side.piece_y) {
                    side.piece_x -= 1;
                }
            }
            "RIGHT" => {
                if can_place(&side.board, &side.piece, side.piece_x + 1, side.piece_y) {
                    side.piece_x += 1;
                }
            }
            "DOWN" => {
                if can_place(&side.board, &side.piece, side.piece_x, side.piece_y + 1) {
                    side.piece_y += 1;
                } else {
                    // Piece landed: lock it, clear lines, spawn the next.
                    place(&mut side.board, &side.piece, side.piece_x, side.piece_y);
                    let cleared = clear_lines(&mut side.board);
                    side.lines += cleared;
                    side.score += cleared * POINTS_PER_LINE;

                    side.piece = random_piece();
                    side.piece_x = SPAWN_X;
                    side.piece_y = 0;

                    if !can_place(&side.board, &side.piece, side.piece_x, side.piece_y) {
                        self.winner = Some(self.players[1 - idx]);
                    }
                }
            }
            "ROTATE" => {
                let rotated = rotate(&side.piece);
                if can_place(&side.board, &rotated, side.piece_x, side.piece_y) {
                    side.piece = rotated;
                }
            }
            other => {
                return Err(ArenaError::InvalidMove(format!(
                    "unknown action '{}'",
                    other
                )))
            }
        }

        Ok(())
    }

    pub fn winner(&self) -> Option<ClientId> {
        self.winner
    }

    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "game_type": "tetris",
            "player1_board": self.boards[0].board,
            "player2_board": self.boards[1].board,
            "player1_piece": self.boards[0].piece,
            "player2_piece": self.boards[1].piece,
            "player1_piece_x": self.boards[0].piece_x,
            "player1_piece_y": self.boards[0].piece_y,
            "player2_piece_x": self.boards[1].piece_x,
            "player2_piece_y": self.boards[1].piece_y,
            "player1_score": self.boards[0].score,
            "player2_score": self.boards[1].score,
            "player1_lines": self.boards[0].lines,
            "player2_lines": self.boards[1].lines,
            "winner_id": self.winner,
        })
    }
}
