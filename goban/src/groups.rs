use crate::bitset::PointSet;
use crate::board::{Board, Player, Point};

/// A maximal 4-connected chain of same-coloured stones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub color: Player,
    pub stones: Vec<Point>,
    /// Distinct empty intersections adjacent to any stone of the group.
    pub liberties: usize,
}

/// Splits every stone on the board into groups, counting liberties once per
/// group. Groups are discovered in row-major order of their first stone.
pub fn groups(board: &Board) -> Vec<Group> {
    let mut visited = PointSet::default();
    let mut result = Vec::new();
    let mut stack = Vec::new();

    for (origin, color) in board.stones() {
        if !visited.add(origin) {
            continue;
        }

        let mut liberties = PointSet::default();
        let mut stones = vec![origin];
        stack.clear();
        stack.push(origin);

        while let Some(point) = stack.pop() {
            for neighbor in point.neighbors() {
                match board.get(neighbor) {
                    None => {
                        liberties.add(neighbor);
                    }
                    Some(other) if other == color && visited.add(neighbor) => {
                        stack.push(neighbor);
                        stones.push(neighbor);
                    }
                    Some(_) => {}
                }
            }
        }

        result.push(Group {
            color,
            stones,
            liberties: liberties.count(),
        });
    }

    result
}
