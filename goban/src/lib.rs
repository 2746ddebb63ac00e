pub mod bitset;
mod board;
mod groups;
mod position;

pub use board::{Board, Player, Point, BOARD_AREA, BOARD_SIZE};
pub use groups::{groups, Group};
pub use position::{BoardPosition, Loc, Move, Ruleset, Scoring, DEFAULT_KOMI};

/// Failure to read a player, coordinate, move or ruleset from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid player '{0}'")]
    Player(String),
    #[error("invalid coordinate '{0}'")]
    Point(String),
    #[error("invalid move '{0}', expected <player>:<coordinate|pass>")]
    Move(String),
    #[error("unknown ruleset '{0}'")]
    Ruleset(String),
}
