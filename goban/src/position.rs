use std::fmt;
use std::str::FromStr;

use crate::board::{Board, Player, Point};
use crate::ParseError;

pub const DEFAULT_KOMI: f32 = 6.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Loc {
    Pass,
    Point(Point),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub player: Player,
    pub loc: Loc,
}

impl Move {
    pub fn play(player: Player, point: Point) -> Self {
        Self {
            player,
            loc: Loc::Point(point),
        }
    }

    pub fn pass(player: Player) -> Self {
        Self {
            player,
            loc: Loc::Pass,
        }
    }

    #[inline(always)]
    pub fn is_pass(&self) -> bool {
        self.loc == Loc::Pass
    }
}

/// `B:D4`, `W:pass`.
impl FromStr for Move {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (player, loc) = s
            .split_once(':')
            .ok_or_else(|| ParseError::Move(s.to_string()))?;
        let player = player.parse()?;
        if loc.eq_ignore_ascii_case("pass") {
            Ok(Move::pass(player))
        } else {
            Ok(Move::play(player, loc.parse()?))
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let player = match self.player {
            Player::Black => 'B',
            Player::White => 'W',
        };
        match self.loc {
            Loc::Pass => write!(f, "{}:pass", player),
            Loc::Point(point) => write!(f, "{}:{}", player, point),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scoring {
    Territory,
    Area,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ruleset {
    #[default]
    Japanese,
    Chinese,
}

impl Ruleset {
    pub fn scoring(self) -> Scoring {
        match self {
            Ruleset::Japanese => Scoring::Territory,
            Ruleset::Chinese => Scoring::Area,
        }
    }
}

impl FromStr for Ruleset {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "japanese" | "jp" | "territory" => Ok(Ruleset::Japanese),
            "chinese" | "cn" | "area" => Ok(Ruleset::Chinese),
            _ => Err(ParseError::Ruleset(s.to_string())),
        }
    }
}

/// Everything the encoder needs to know about the position being analysed.
///
/// Captures and legality are the caller's business: `board` must already
/// reflect the result of `history`.
#[derive(Debug, Clone)]
pub struct BoardPosition {
    pub board: Board,
    pub to_move: Player,
    /// Chronological, oldest first.
    pub history: Vec<Move>,
    pub komi: f32,
    pub rules: Ruleset,
    /// Intersection where an immediate recapture is forbidden.
    pub ko: Option<Point>,
    /// Set when evaluating the root of an analysis that follows a pass, to
    /// hide the "another pass ends the game" signal.
    pub conservative_pass: bool,
}

impl BoardPosition {
    pub fn new(board: Board, to_move: Player) -> Self {
        Self {
            board,
            to_move,
            history: Vec::new(),
            komi: DEFAULT_KOMI,
            rules: Ruleset::default(),
            ko: None,
            conservative_pass: false,
        }
    }

    pub fn with_history(mut self, history: Vec<Move>) -> Self {
        self.history = history;
        self
    }

    pub fn with_komi(mut self, komi: f32) -> Self {
        self.komi = komi;
        self
    }

    pub fn with_rules(mut self, rules: Ruleset) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_ko(mut self, ko: Option<Point>) -> Self {
        self.ko = ko;
        self
    }

    pub fn with_conservative_pass(mut self, conservative_pass: bool) -> Self {
        self.conservative_pass = conservative_pass;
        self
    }

    #[inline(always)]
    pub fn last_move(&self) -> Option<&Move> {
        self.history.last()
    }

    /// Most recent moves first.
    pub fn recent_moves(&self) -> impl Iterator<Item = &Move> {
        self.history.iter().rev()
    }
}
