use std::borrow::Cow;
use std::path::Path;

use candle_core::{Device, Tensor, D};
use candle_nn::ops::softmax;
use evaluation::{Evaluation, Evaluator, ScoreValueCache, SQRT_BOARD_AREA};
use goban::{BoardPosition, Player, BOARD_AREA};
use rayon::prelude::*;

use crate::encoding::{encode, InputTensors, NUM_GLOBAL_FEATURES, NUM_SPATIAL_FEATURES};
use crate::model::{load_model_bytes, ModelDesc, ParseError, PostProcessParams};
use crate::network::KataGoNetwork;

#[derive(thiserror::Error, Debug)]
pub enum EvalError {
    #[error("failed to parse model: {0}")]
    Parse(#[from] ParseError),

    #[error("network error: {0}")]
    Network(#[from] candle_core::Error),

    #[error("failed to read model: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "model expects {spatial} spatial / {global} global inputs, encoder produces {} / {}",
        NUM_SPATIAL_FEATURES,
        NUM_GLOBAL_FEATURES
    )]
    UnsupportedInputs { spatial: usize, global: usize },

    #[error(
        "model has {channels} score outputs, at least {} (mean and stdev) are required",
        MIN_SCORE_CHANNELS
    )]
    UnsupportedScoreHead { channels: usize },
}

/// Score mean and score stdev; the lead is optional.
const MIN_SCORE_CHANNELS: usize = 2;

#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Width of the score-to-value curve, in units of board size.
    pub score_value_scale: f64,
    /// Encode every position as the root of an analysis following a pass.
    pub conservative_pass: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            score_value_scale: 2.0,
            conservative_pass: false,
        }
    }
}

/// Host-side copies of one batch of network outputs.
struct RawBatch {
    /// 361 board logits followed by the pass logit, already softmaxed.
    policy: Vec<Vec<f32>>,
    value: Vec<Vec<f32>>,
    scores: Vec<Vec<f32>>,
    ownership: Vec<Vec<f32>>,
}

pub struct KataGoEvaluator {
    network: KataGoNetwork,
    model_name: String,
    post_process: PostProcessParams,
    score_values: ScoreValueCache,
    config: EvaluatorConfig,
}

impl KataGoEvaluator {
    pub fn new(
        model: ModelDesc,
        device: &Device,
        config: EvaluatorConfig,
    ) -> Result<Self, EvalError> {
        if model.num_input_channels != NUM_SPATIAL_FEATURES
            || model.num_input_global_channels != NUM_GLOBAL_FEATURES
        {
            return Err(EvalError::UnsupportedInputs {
                spatial: model.num_input_channels,
                global: model.num_input_global_channels,
            });
        }
        if model.score_value_channels() < MIN_SCORE_CHANNELS {
            return Err(EvalError::UnsupportedScoreHead {
                channels: model.score_value_channels(),
            });
        }

        Ok(Self {
            network: KataGoNetwork::new(&model, device)?,
            model_name: model.name,
            post_process: model.post_process,
            score_values: ScoreValueCache::new(),
            config,
        })
    }

    /// Reads, optionally inflates, and parses a weight file.
    pub fn from_file(
        path: impl AsRef<Path>,
        device: &Device,
        config: EvaluatorConfig,
    ) -> Result<Self, EvalError> {
        let path = path.as_ref();
        log::info!("Loading model from {}", path.display());
        let bytes = std::fs::read(path)?;
        Self::new(load_model_bytes(&bytes)?, device, config)
    }

    /// Shares an already built (or to be built) score value table.
    pub fn with_score_values(mut self, cache: ScoreValueCache) -> Self {
        self.score_values = cache;
        self
    }

    pub fn network(&self) -> &KataGoNetwork {
        &self.network
    }

    pub fn release(self) {
        self.network.release();
    }

    fn encode(&self, position: &BoardPosition) -> InputTensors {
        let position = if self.config.conservative_pass && !position.conservative_pass {
            Cow::Owned(position.clone().with_conservative_pass(true))
        } else {
            Cow::Borrowed(position)
        };
        encode(&position)
    }

    fn run(&self, positions: &[BoardPosition]) -> Result<RawBatch, EvalError> {
        let inputs: Vec<InputTensors> = positions.par_iter().map(|p| self.encode(p)).collect();
        let output = self.network.forward(&inputs)?;
        let n = positions.len();

        let board_logits = output.policy.narrow(1, 0, 1)?.reshape((n, BOARD_AREA))?;
        let pass_logit = output.pass.narrow(1, 0, 1)?;
        let logits = Tensor::cat(&[&board_logits, &pass_logit], 1)?;

        Ok(RawBatch {
            policy: softmax(&logits, D::Minus1)?.to_vec2()?,
            value: softmax(&output.value, D::Minus1)?.to_vec2()?,
            scores: output.score_value.to_vec2()?,
            ownership: output.ownership.tanh()?.reshape((n, BOARD_AREA))?.to_vec2()?,
        })
    }

    fn analysis(&self, position: &BoardPosition, raw: &RawBatch, i: usize) -> Evaluation {
        let params = &self.post_process;
        let scores = &raw.scores[i];
        let score_mean = scores[0] * params.score_mean_multiplier;
        let score_stdev = softplus(scores[1]) * params.score_stdev_multiplier;
        let score_lead = scores
            .get(2)
            .map_or(score_mean, |lead| lead * params.lead_multiplier);

        let white_mean = match position.to_move {
            Player::White => score_mean,
            Player::Black => -score_mean,
        };
        let white_value = self.score_values.query(
            white_mean as f64,
            score_stdev as f64,
            0.0,
            self.config.score_value_scale,
            SQRT_BOARD_AREA,
        );
        let score_value = match position.to_move {
            Player::White => white_value,
            Player::Black => -white_value,
        };

        let policy = &raw.policy[i];
        let value = &raw.value[i];

        Evaluation {
            to_move: position.to_move,
            policy: policy[..BOARD_AREA].to_vec(),
            pass_probability: policy[BOARD_AREA],
            win_probability: value[0],
            loss_probability: value[1],
            no_result_probability: value[2],
            score_mean,
            score_stdev,
            score_lead,
            score_value,
            ownership: raw.ownership[i].clone(),
        }
    }
}

#[inline]
fn softplus(x: f32) -> f32 {
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

impl Evaluator for KataGoEvaluator {
    type Error = EvalError;

    fn name(&self) -> String {
        format!("KataGo ({})", self.model_name)
    }

    fn evaluate(&self, position: &BoardPosition) -> Result<Evaluation, EvalError> {
        let raw = self.run(std::slice::from_ref(position))?;
        Ok(self.analysis(position, &raw, 0))
    }

    fn evaluate_batch(&self, positions: &[BoardPosition]) -> Result<Vec<Evaluation>, EvalError> {
        if positions.is_empty() {
            return Ok(Vec::new());
        }
        let raw = self.run(positions)?;
        Ok(positions
            .iter()
            .enumerate()
            .map(|(i, position)| self.analysis(position, &raw, i))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn softplus_is_stable() {
        assert!((softplus(0.0) - std::f32::consts::LN_2).abs() < 1e-7);
        assert_eq!(softplus(100.0), 100.0);
        assert!(softplus(-100.0) < 1e-30);
        assert!((softplus(1.0) - 1.313_261_7).abs() < 1e-6);
    }
}
