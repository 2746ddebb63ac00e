use goban::{groups, BoardPosition, Loc, Player, Point, Scoring, BOARD_AREA};
use rayon::prelude::*;

/// Spatial input planes per intersection.
pub const NUM_SPATIAL_FEATURES: usize = 22;

/// Scalar inputs describing the whole position.
pub const NUM_GLOBAL_FEATURES: usize = 19;

/// Number of past moves visible to the network.
const HISTORY_LEN: usize = 5;

// Most recent move first.
const HISTORY_PLANES: [usize; HISTORY_LEN] = [13, 12, 11, 10, 9];
const PASS_GLOBALS: [usize; HISTORY_LEN] = [0, 1, 2, 3, 4];

const ON_BOARD_PLANE: usize = 0;
const OWN_STONE_PLANE: usize = 1;
const OPPONENT_STONE_PLANE: usize = 2;
const LIBERTY_PLANES: [usize; 3] = [3, 4, 5];
const KO_PLANE: usize = 6;

const KOMI_GLOBAL: usize = 5;
const TERRITORY_GLOBALS: [usize; 2] = [9, 10];
const PASS_ENDS_PHASE_GLOBAL: usize = 14;
const KOMI_WAVE_GLOBAL: usize = 18;

/// Network inputs for one position.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensors {
    /// `[19, 19, 22]` in NHWC order: `(y * 19 + x) * 22 + c`.
    pub spatial: Vec<f32>,
    pub global: Vec<f32>,
}

impl InputTensors {
    fn zeros() -> Self {
        Self {
            spatial: vec![0.0; BOARD_AREA * NUM_SPATIAL_FEATURES],
            global: vec![0.0; NUM_GLOBAL_FEATURES],
        }
    }

    #[inline(always)]
    fn set(&mut self, point: Point, plane: usize) {
        self.spatial[point.index() * NUM_SPATIAL_FEATURES + plane] = 1.0;
    }

    /// Value of one spatial feature.
    #[inline(always)]
    pub fn spatial_at(&self, point: Point, plane: usize) -> f32 {
        self.spatial[point.index() * NUM_SPATIAL_FEATURES + plane]
    }

    /// Every point where `plane` is set, in row-major order.
    pub fn plane_points(&self, plane: usize) -> Vec<Point> {
        Point::all()
            .filter(|&point| self.spatial_at(point, plane) != 0.0)
            .collect()
    }
}

/// Encodes a position as input feature version 7.
pub fn encode(position: &BoardPosition) -> InputTensors {
    let mut inputs = InputTensors::zeros();
    let own = position.to_move;

    for point in Point::all() {
        inputs.set(point, ON_BOARD_PLANE);
    }

    for (point, stone) in position.board.stones() {
        let plane = if stone == own {
            OWN_STONE_PLANE
        } else {
            OPPONENT_STONE_PLANE
        };
        inputs.set(point, plane);
    }

    for group in groups(&position.board) {
        if let Some(&plane) = group
            .liberties
            .checked_sub(1)
            .and_then(|i| LIBERTY_PLANES.get(i))
        {
            for &stone in &group.stones {
                inputs.set(stone, plane);
            }
        }
    }

    if let Some(ko) = position.ko {
        inputs.set(ko, KO_PLANE);
    }

    let pass_ends_phase = position.last_move().is_some_and(|m| m.is_pass());
    let suppress_history = position.conservative_pass && pass_ends_phase;

    if !suppress_history {
        encode_history(position, &mut inputs);
    }

    let self_komi = self_komi(position.komi, own);
    inputs.global[KOMI_GLOBAL] = (self_komi / 20.0) as f32;

    match position.rules.scoring() {
        Scoring::Territory => {
            for idx in TERRITORY_GLOBALS {
                inputs.global[idx] = 1.0;
            }
        }
        Scoring::Area => {
            inputs.global[KOMI_WAVE_GLOBAL] = komi_wave(self_komi, BOARD_AREA) as f32;
        }
    }

    if pass_ends_phase && !suppress_history {
        inputs.global[PASS_ENDS_PHASE_GLOBAL] = 1.0;
    }

    inputs
}

/// Encodes positions in parallel, preserving order.
pub fn encode_batch(positions: &[BoardPosition]) -> Vec<InputTensors> {
    positions.par_iter().map(encode).collect()
}

// Walks back from the most recent move while the players alternate, starting
// with the opponent of the side to move.
fn encode_history(position: &BoardPosition, inputs: &mut InputTensors) {
    let mut expected = position.to_move.opponent();

    for (slot, mv) in position.recent_moves().take(HISTORY_LEN).enumerate() {
        if mv.player != expected {
            break;
        }
        match mv.loc {
            Loc::Pass => inputs.global[PASS_GLOBALS[slot]] = 1.0,
            Loc::Point(point) => inputs.set(point, HISTORY_PLANES[slot]),
        }
        expected = expected.opponent();
    }
}

/// Komi from the side to move's perspective.
fn self_komi(komi: f32, to_move: Player) -> f64 {
    match to_move {
        Player::White => komi as f64,
        Player::Black => -(komi as f64),
    }
}

/// Triangular wave over the distance from the nearest drawable komi at or
/// below `self_komi`. Drawable komis are two apart, odd on odd-sized boards.
pub fn komi_wave(self_komi: f64, board_area: usize) -> f64 {
    let floor = if board_area % 2 == 0 {
        (self_komi / 2.0).floor() * 2.0
    } else {
        ((self_komi - 1.0) / 2.0).floor() * 2.0 + 1.0
    };

    let delta = (self_komi - floor).clamp(0.0, 2.0);
    if delta < 0.5 {
        delta
    } else if delta < 1.5 {
        1.0 - delta
    } else {
        delta - 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goban::{Board, Move, Ruleset};

    fn point(s: &str) -> Point {
        s.parse().unwrap()
    }

    fn moves(s: &str) -> Vec<Move> {
        s.split_whitespace().map(|m| m.parse().unwrap()).collect()
    }

    fn empty(to_move: Player) -> BoardPosition {
        BoardPosition::new(Board::empty(), to_move)
    }

    #[test]
    fn empty_board_only_sets_mask() {
        let inputs = encode(&empty(Player::Black));
        assert_eq!(inputs.spatial.len(), 361 * 22);
        assert_eq!(inputs.global.len(), 19);
        assert_eq!(inputs.plane_points(ON_BOARD_PLANE).len(), 361);
        for plane in 1..NUM_SPATIAL_FEATURES {
            assert!(inputs.plane_points(plane).is_empty(), "plane {}", plane);
        }
    }

    #[test]
    fn stones_are_relative_to_side_to_move() {
        let board = Board::empty()
            .with_stones(Player::Black, &[point("D4")])
            .with_stones(Player::White, &[point("Q16")]);

        let black = encode(&BoardPosition::new(board.clone(), Player::Black));
        assert_eq!(black.plane_points(OWN_STONE_PLANE), vec![point("D4")]);
        assert_eq!(black.plane_points(OPPONENT_STONE_PLANE), vec![point("Q16")]);

        let white = encode(&BoardPosition::new(board, Player::White));
        assert_eq!(white.plane_points(OWN_STONE_PLANE), vec![point("Q16")]);
        assert_eq!(white.plane_points(OPPONENT_STONE_PLANE), vec![point("D4")]);
    }

    #[test]
    fn nhwc_layout() {
        let board = Board::empty().with_stones(Player::White, &[point("T1")]);
        let inputs = encode(&BoardPosition::new(board, Player::White));
        // T1 is x = 18, y = 18.
        assert_eq!(inputs.spatial[(18 * 19 + 18) * 22 + OWN_STONE_PLANE], 1.0);
    }

    #[test]
    fn liberty_planes() {
        // A1 alone has two liberties; K10 is in atari between three white stones.
        let board = Board::empty()
            .with_stones(Player::Black, &[point("A1"), point("K10")])
            .with_stones(Player::White, &[point("J10"), point("L10"), point("K11")]);
        let inputs = encode(&BoardPosition::new(board, Player::Black));

        assert_eq!(inputs.plane_points(3), vec![point("K10")]);
        assert_eq!(inputs.plane_points(4), vec![point("A1")]);
        // Each white stone keeps three liberties.
        assert_eq!(
            inputs.plane_points(5),
            vec![point("K11"), point("J10"), point("L10")]
        );
    }

    #[test]
    fn two_stone_group_shares_liberties() {
        // A1-A2 against the edge with B1, B2 taken leaves only A3.
        let board = Board::empty()
            .with_stones(Player::Black, &[point("A1"), point("A2")])
            .with_stones(Player::White, &[point("B1"), point("B2")]);
        let inputs = encode(&BoardPosition::new(board, Player::White));
        assert_eq!(inputs.plane_points(3), vec![point("A2"), point("A1")]);

        // Corner pair with three liberties.
        let board = Board::empty().with_stones(Player::Black, &[point("A1"), point("B1")]);
        let inputs = encode(&BoardPosition::new(board, Player::White));
        assert!(inputs.plane_points(3).is_empty());
        assert_eq!(inputs.plane_points(5), vec![point("A1"), point("B1")]);

        let board = Board::empty()
            .with_stones(Player::Black, &[point("A1"), point("B1")])
            .with_stones(Player::White, &[point("A2")]);
        let inputs = encode(&BoardPosition::new(board, Player::Black));
        // Two shared liberties, B2 and C1.
        assert_eq!(inputs.plane_points(4), vec![point("A1"), point("B1")]);
    }

    #[test]
    fn ko_plane() {
        let position = empty(Player::Black).with_ko(Some(point("E5")));
        assert_eq!(encode(&position).plane_points(KO_PLANE), vec![point("E5")]);
    }

    #[test]
    fn history_fills_most_recent_first() {
        let position = empty(Player::Black).with_history(moves(
            "B:A1 W:B1 B:C1 W:D1 B:E1 W:F1",
        ));
        let inputs = encode(&position);

        assert_eq!(inputs.plane_points(13), vec![point("F1")]);
        assert_eq!(inputs.plane_points(12), vec![point("E1")]);
        assert_eq!(inputs.plane_points(11), vec![point("D1")]);
        assert_eq!(inputs.plane_points(10), vec![point("C1")]);
        // A1 is six moves back.
        assert_eq!(inputs.plane_points(9), vec![point("B1")]);
    }

    #[test]
    fn history_stops_at_alternation_break() {
        // Two black moves in a row: only W:C1 and B:B1 are used.
        let position = empty(Player::Black).with_history(moves("B:A1 B:B1 W:C1"));
        let inputs = encode(&position);
        assert_eq!(inputs.plane_points(13), vec![point("C1")]);
        assert_eq!(inputs.plane_points(12), vec![point("B1")]);
        assert!(inputs.plane_points(11).is_empty());

        // The most recent move was made by the side to move: nothing is used.
        let position = empty(Player::White).with_history(moves("W:A1"));
        assert!(encode(&position).plane_points(13).is_empty());
    }

    #[test]
    fn passes_use_global_slots() {
        let position = empty(Player::White).with_history(moves("B:D4 W:pass B:pass"));
        let inputs = encode(&position);

        assert_eq!(&inputs.global[0..5], &[1.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(inputs.plane_points(11), vec![point("D4")]);
        assert!(inputs.plane_points(13).is_empty());
        assert_eq!(inputs.global[PASS_ENDS_PHASE_GLOBAL], 1.0);
    }

    #[test]
    fn conservative_pass_hides_history() {
        let position = empty(Player::White).with_history(moves("B:D4 W:Q16 B:pass"));

        let normal = encode(&position);
        assert_eq!(normal.global[0], 1.0);
        assert_eq!(normal.global[PASS_ENDS_PHASE_GLOBAL], 1.0);

        let conservative = encode(&position.clone().with_conservative_pass(true));
        assert_eq!(conservative.global[0], 0.0);
        assert_eq!(conservative.global[PASS_ENDS_PHASE_GLOBAL], 0.0);
        for plane in HISTORY_PLANES {
            assert!(conservative.plane_points(plane).is_empty());
        }
    }

    #[test]
    fn conservative_flag_without_pass_changes_nothing() {
        let position = empty(Player::White).with_history(moves("B:D4"));
        assert_eq!(
            encode(&position),
            encode(&position.clone().with_conservative_pass(true))
        );
    }

    #[test]
    fn komi_is_relative_to_side_to_move() {
        let white = encode(&empty(Player::White).with_komi(7.5));
        assert_eq!(white.global[KOMI_GLOBAL], 0.375);

        let black = encode(&empty(Player::Black).with_komi(7.5));
        assert_eq!(black.global[KOMI_GLOBAL], -0.375);
    }

    #[test]
    fn territory_scoring_flags() {
        let japanese = encode(&empty(Player::Black).with_rules(Ruleset::Japanese));
        assert_eq!(japanese.global[9], 1.0);
        assert_eq!(japanese.global[10], 1.0);
        assert_eq!(japanese.global[KOMI_WAVE_GLOBAL], 0.0);

        let chinese = encode(&empty(Player::Black).with_rules(Ruleset::Chinese));
        assert_eq!(chinese.global[9], 0.0);
        assert_eq!(chinese.global[10], 0.0);
    }

    #[test]
    fn chinese_komi_wave() {
        let wave = |to_move, komi| {
            encode(
                &empty(to_move)
                    .with_rules(Ruleset::Chinese)
                    .with_komi(komi),
            )
            .global[KOMI_WAVE_GLOBAL]
        };

        assert_eq!(wave(Player::White, 7.5), 0.5);
        assert_eq!(wave(Player::White, 7.0), 0.0);
        assert_eq!(wave(Player::White, 6.5), -0.5);
        assert_eq!(wave(Player::White, 8.0), 0.0);
        assert_eq!(wave(Player::White, 7.25), 0.25);
        assert_eq!(wave(Player::Black, 7.5), -0.5);
    }

    #[test]
    fn komi_wave_on_even_boards() {
        assert_eq!(komi_wave(0.0, 64), 0.0);
        assert_eq!(komi_wave(0.5, 64), 0.5);
        assert_eq!(komi_wave(1.0, 64), 0.0);
        assert_eq!(komi_wave(1.5, 64), -0.5);
    }

    #[test]
    fn encoding_is_deterministic() {
        let board = Board::empty()
            .with_stones(Player::Black, &[point("D4"), point("D5")])
            .with_stones(Player::White, &[point("E4")]);
        let position = BoardPosition::new(board, Player::Black)
            .with_history(moves("B:D4 W:E4 B:D5 W:pass"))
            .with_rules(Ruleset::Chinese);
        assert_eq!(encode(&position), encode(&position));
    }

    #[test]
    fn batch_matches_single() {
        let positions: Vec<BoardPosition> = ["B:D4", "B:D4 W:Q16", "B:D4 W:Q16 B:pass"]
            .iter()
            .enumerate()
            .map(|(i, history)| {
                let to_move = if i % 2 == 0 {
                    Player::White
                } else {
                    Player::Black
                };
                empty(to_move).with_history(moves(history))
            })
            .collect();

        let batch = encode_batch(&positions);
        assert_eq!(batch.len(), positions.len());
        for (position, inputs) in positions.iter().zip(&batch) {
            assert_eq!(&encode(position), inputs);
        }
    }
}
