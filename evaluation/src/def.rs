use goban::{BoardPosition, Player, Point, BOARD_AREA};

/// Post-processed network output for one position.
///
/// Everything is from the perspective of the player to move unless the
/// accessor says otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub to_move: Player,
    /// Move probabilities over the 361 intersections, row-major.
    pub policy: Vec<f32>,
    pub pass_probability: f32,
    pub win_probability: f32,
    pub loss_probability: f32,
    pub no_result_probability: f32,
    pub score_mean: f32,
    pub score_stdev: f32,
    pub score_lead: f32,
    /// Expected smoothed score value in (-1, 1).
    pub score_value: f64,
    /// Per-intersection ownership in [-1, 1], +1 meaning the player to move.
    pub ownership: Vec<f32>,
}

impl Evaluation {
    /// Win probability counting a no-result as half a win.
    pub fn winrate(&self) -> f32 {
        self.win_probability + 0.5 * self.no_result_probability
    }

    pub fn white_winrate(&self) -> f32 {
        match self.to_move {
            Player::White => self.winrate(),
            Player::Black => 1.0 - self.winrate(),
        }
    }

    pub fn white_score_lead(&self) -> f32 {
        match self.to_move {
            Player::White => self.score_lead,
            Player::Black => -self.score_lead,
        }
    }

    /// The `n` most likely board moves, best first.
    pub fn top_moves(&self, n: usize) -> Vec<(Point, f32)> {
        let mut moves: Vec<(Point, f32)> = self
            .policy
            .iter()
            .take(BOARD_AREA)
            .enumerate()
            .map(|(idx, &p)| (Point::from_index(idx), p))
            .collect();
        moves.sort_by(|a, b| b.1.total_cmp(&a.1));
        moves.truncate(n);
        moves
    }
}

/// Neural-network evaluation interface.
pub trait Evaluator: Send + Sync {
    type Error: std::error::Error;

    fn name(&self) -> String;

    fn evaluate(&self, position: &BoardPosition) -> Result<Evaluation, Self::Error>;

    /// Evaluates several positions; implementations may run them as one batch.
    fn evaluate_batch(&self, positions: &[BoardPosition]) -> Result<Vec<Evaluation>, Self::Error> {
        positions.iter().map(|p| self.evaluate(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(to_move: Player) -> Evaluation {
        let mut policy = vec![0.0; BOARD_AREA];
        policy[0] = 0.1;
        policy[72] = 0.6;
        policy[300] = 0.2;
        Evaluation {
            to_move,
            policy,
            pass_probability: 0.1,
            win_probability: 0.7,
            loss_probability: 0.2,
            no_result_probability: 0.1,
            score_mean: 3.0,
            score_stdev: 10.0,
            score_lead: 2.5,
            score_value: 0.1,
            ownership: vec![0.0; BOARD_AREA],
        }
    }

    #[test]
    fn white_perspective_flips_for_black() {
        let eval = evaluation(Player::Black);
        assert!((eval.winrate() - 0.75).abs() < 1e-6);
        assert!((eval.white_winrate() - 0.25).abs() < 1e-6);
        assert_eq!(eval.white_score_lead(), -2.5);

        let eval = evaluation(Player::White);
        assert!((eval.white_winrate() - 0.75).abs() < 1e-6);
        assert_eq!(eval.white_score_lead(), 2.5);
    }

    #[test]
    fn top_moves_are_sorted() {
        let eval = evaluation(Player::Black);
        let top = eval.top_moves(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, Point::from_index(72));
        assert_eq!(top[1].0, Point::from_index(300));
    }
}
