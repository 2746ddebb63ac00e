use std::fmt;
use std::str::FromStr;

use crate::ParseError;

pub const BOARD_SIZE: usize = 19;
pub const BOARD_AREA: usize = BOARD_SIZE * BOARD_SIZE;

/// Column letters used by GTP coordinates ("I" is skipped).
const COLUMNS: &[u8; BOARD_SIZE] = b"ABCDEFGHJKLMNOPQRST";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Player {
    Black,
    White,
}

impl Player {
    #[inline(always)]
    pub fn opponent(self) -> Self {
        match self {
            Player::Black => Player::White,
            Player::White => Player::Black,
        }
    }
}

impl FromStr for Player {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "b" | "black" => Ok(Player::Black),
            "w" | "white" => Ok(Player::White),
            _ => Err(ParseError::Player(s.to_string())),
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::Black => write!(f, "black"),
            Player::White => write!(f, "white"),
        }
    }
}

/// An intersection. `x` is the column (0 = left), `y` the row (0 = top).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    x: u8,
    y: u8,
}

impl Point {
    pub fn new(x: usize, y: usize) -> Option<Self> {
        (x < BOARD_SIZE && y < BOARD_SIZE).then_some(Self {
            x: x as u8,
            y: y as u8,
        })
    }

    #[inline(always)]
    pub fn from_index(idx: usize) -> Self {
        let idx = idx.min(BOARD_AREA - 1);
        Self {
            x: (idx % BOARD_SIZE) as u8,
            y: (idx / BOARD_SIZE) as u8,
        }
    }

    #[inline(always)]
    pub fn x(self) -> usize {
        self.x as usize
    }

    #[inline(always)]
    pub fn y(self) -> usize {
        self.y as usize
    }

    /// Row-major index, `y * 19 + x`.
    #[inline(always)]
    pub fn index(self) -> usize {
        self.y() * BOARD_SIZE + self.x()
    }

    /// Orthogonal neighbours in the order right, left, down, up.
    pub fn neighbors(self) -> impl Iterator<Item = Point> {
        let (x, y) = (self.x as i32, self.y as i32);
        [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)]
            .into_iter()
            .filter_map(|(nx, ny)| {
                if nx < 0 || ny < 0 {
                    None
                } else {
                    Point::new(nx as usize, ny as usize)
                }
            })
    }

    pub fn all() -> impl Iterator<Item = Point> {
        (0..BOARD_AREA).map(Point::from_index)
    }
}

/// GTP notation, e.g. "D4" (row 1 is the bottom row).
impl FromStr for Point {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ParseError::Point(s.to_string());

        let mut chars = s.chars();
        let column = chars.next().ok_or_else(invalid)?.to_ascii_uppercase();
        let x = COLUMNS
            .iter()
            .position(|&c| c as char == column)
            .ok_or_else(invalid)?;
        let row: usize = chars.as_str().parse().map_err(|_| invalid())?;
        if row == 0 || row > BOARD_SIZE {
            return Err(invalid());
        }

        Point::new(x, BOARD_SIZE - row).ok_or_else(invalid)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            COLUMNS[self.x()] as char,
            BOARD_SIZE - self.y()
        )
    }
}

/// Stone placement on a 19x19 board.
#[derive(Clone, PartialEq, Eq)]
pub struct Board {
    cells: [Option<Player>; BOARD_AREA],
}

impl Board {
    pub fn empty() -> Self {
        Self {
            cells: [None; BOARD_AREA],
        }
    }

    #[inline(always)]
    pub fn get(&self, point: Point) -> Option<Player> {
        self.cells[point.index()]
    }

    #[inline(always)]
    pub fn set(&mut self, point: Point, stone: Option<Player>) {
        self.cells[point.index()] = stone;
    }

    pub fn with_stones(mut self, player: Player, points: &[Point]) -> Self {
        for &point in points {
            self.set(point, Some(player));
        }
        self
    }

    /// Occupied intersections in row-major order.
    pub fn stones(&self) -> impl Iterator<Item = (Point, Player)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(idx, cell)| cell.map(|player| (Point::from_index(idx), player)))
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in 0..BOARD_SIZE {
            for x in 0..BOARD_SIZE {
                let c = match self.cells[y * BOARD_SIZE + x] {
                    Some(Player::Black) => 'X',
                    Some(Player::White) => 'O',
                    None => '.',
                };
                write!(f, "{}", c)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
