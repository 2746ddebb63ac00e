pub mod def;
pub mod score_value;

pub use def::{Evaluation, Evaluator};
pub use score_value::{score_stdev, ScoreValueCache, ScoreValueTable, SQRT_BOARD_AREA};
