//! Expected "score value" of a predicted final score distribution.
//!
//! The network predicts the final score margin as a mean and a standard
//! deviation. Search utilities want the expectation of a bounded, smooth
//! function of the score, `atan(score / (scale * sqrt(area))) * 2 / pi`,
//! under a normal distribution with those parameters. Integrating per query is
//! too slow, so the expectation is tabulated once over a discretized
//! (mean, stdev) grid and bilinearly interpolated afterwards.

use std::f64::consts::FRAC_2_PI;
use std::sync::Arc;

use once_cell::sync::OnceCell;

/// The table assumes a 19x19 board; other sizes rescale through `sqrt_board_area`.
const ASSUMED_BOARD_SIZE: usize = 19;
const EXTRA_SCORE_RADIUS: usize = 60;

const MEAN_RADIUS: usize = ASSUMED_BOARD_SIZE * ASSUMED_BOARD_SIZE + EXTRA_SCORE_RADIUS;
const MEAN_LEN: usize = MEAN_RADIUS * 2;
const STDEV_LEN: usize = ASSUMED_BOARD_SIZE * ASSUMED_BOARD_SIZE + EXTRA_SCORE_RADIUS;

/// Discretization steps per unit of score.
const STEPS_PER_UNIT: i64 = 10;
/// The normal kernel is truncated at this many standard deviations.
const BOUND_STDEVS: i64 = 5;

/// `sqrt(19 * 19)`, the natural `sqrt_board_area` argument for a full board.
pub const SQRT_BOARD_AREA: f64 = ASSUMED_BOARD_SIZE as f64;

/// Smoothed score value of a final white-minus-black score, in (-1, 1).
#[inline]
pub fn score_value_of_score(score: f64, center: f64, scale: f64, sqrt_board_area: f64) -> f64 {
    ((score - center) / (scale * sqrt_board_area)).atan() * FRAC_2_PI
}

/// Standard deviation from the first two raw moments, never NaN.
pub fn score_stdev(score_mean: f64, score_mean_sq: f64) -> f64 {
    let variance = score_mean_sq - score_mean * score_mean;
    if variance <= 0.0 {
        0.0
    } else {
        variance.sqrt()
    }
}

/// JavaScript-style rounding (halves towards positive infinity), which the
/// table's half-cell offset is built around.
#[inline(always)]
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

pub struct ScoreValueTable {
    /// Row-major `[mean_idx][stdev_idx]`.
    expected: Box<[f64]>,
}

impl ScoreValueTable {
    /// Tabulates every cell. Costs roughly `MEAN_LEN * STDEV_LEN * 101`
    /// kernel evaluations; callers normally go through [`ScoreValueCache`].
    pub fn build() -> Self {
        let min_stdev_steps = -BOUND_STDEVS * STEPS_PER_UNIT;
        let max_stdev_steps = -min_stdev_steps;

        let normal_pdf: Vec<f64> = (min_stdev_steps..=max_stdev_steps)
            .map(|i| {
                let x_in_stdevs = i as f64 / STEPS_PER_UNIT as f64;
                (-0.5 * x_in_stdevs * x_in_stdevs).exp()
            })
            .collect();

        let min_sv_steps = -(MEAN_RADIUS as i64 * STEPS_PER_UNIT
            + STEPS_PER_UNIT / 2
            + BOUND_STDEVS * STDEV_LEN as i64 * STEPS_PER_UNIT);
        let max_sv_steps = -min_sv_steps;

        let sv_precomp: Vec<f64> = (min_sv_steps..=max_sv_steps)
            .map(|i| {
                let score = i as f64 / STEPS_PER_UNIT as f64;
                score_value_of_score(score, 0.0, 1.0, SQRT_BOARD_AREA)
            })
            .collect();

        let mut expected = vec![0.0; MEAN_LEN * STDEV_LEN].into_boxed_slice();

        for (mean_idx, row) in expected.chunks_exact_mut(STDEV_LEN).enumerate() {
            let mean_steps =
                (mean_idx as i64 - MEAN_RADIUS as i64) * STEPS_PER_UNIT - STEPS_PER_UNIT / 2;

            for (stdev_idx, cell) in row.iter_mut().enumerate() {
                let mut w_sum = 0.0;
                let mut wsv_sum = 0.0;

                for (k, &w) in normal_pdf.iter().enumerate() {
                    let i = k as i64 + min_stdev_steps;
                    let x_steps = mean_steps + stdev_idx as i64 * i;
                    let sv = sv_precomp[(x_steps - min_sv_steps) as usize];
                    w_sum += w;
                    wsv_sum += w * sv;
                }

                *cell = wsv_sum / w_sum;
            }
        }

        Self { expected }
    }

    #[inline(always)]
    fn cell(&self, mean_idx: usize, stdev_idx: usize) -> f64 {
        self.expected[mean_idx * STDEV_LEN + stdev_idx]
    }

    /// Expected score value of a normal score distribution, white's
    /// perspective. Lookups outside the tabulated range clamp to the nearest
    /// edge row or column.
    pub fn query(
        &self,
        mean: f64,
        stdev: f64,
        center: f64,
        scale: f64,
        sqrt_board_area: f64,
    ) -> f64 {
        let scale_factor = ASSUMED_BOARD_SIZE as f64 / (scale * sqrt_board_area);

        let mean_scaled = (mean - center) * scale_factor;
        let stdev_scaled = stdev * scale_factor;

        let mean_rounded = round_half_up(mean_scaled);
        let stdev_floored = stdev_scaled.floor();

        let (mean_idx0, mean_idx1) = clamp_pair(mean_rounded + MEAN_RADIUS as f64, MEAN_LEN);
        let (stdev_idx0, stdev_idx1) = clamp_pair(stdev_floored, STDEV_LEN);

        let lambda_mean = mean_scaled - mean_rounded + 0.5;
        let lambda_stdev = stdev_scaled - stdev_floored;

        let a00 = self.cell(mean_idx0, stdev_idx0);
        let a01 = self.cell(mean_idx0, stdev_idx1);
        let a10 = self.cell(mean_idx1, stdev_idx0);
        let a11 = self.cell(mean_idx1, stdev_idx1);

        let b0 = a00 + lambda_stdev * (a01 - a00);
        let b1 = a10 + lambda_stdev * (a11 - a10);
        b0 + lambda_mean * (b1 - b0)
    }
}

/// Index pair `(i, i + 1)`, collapsed onto the first or last index when
/// either falls outside `0..len`. NaN collapses onto the first index.
#[inline]
fn clamp_pair(idx: f64, len: usize) -> (usize, usize) {
    let last = (len - 1) as f64;
    if idx >= last {
        (len - 1, len - 1)
    } else if idx >= 0.0 {
        let idx = idx as usize;
        (idx, idx + 1)
    } else {
        (0, 0)
    }
}

/// Build-once, read-many holder for a [`ScoreValueTable`].
///
/// Clones share the same table. Concurrent first use blocks on a single
/// build; the table is never mutated afterwards.
#[derive(Clone, Default)]
pub struct ScoreValueCache {
    table: Arc<OnceCell<ScoreValueTable>>,
}

impl ScoreValueCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> &ScoreValueTable {
        self.table.get_or_init(|| {
            log::debug!(
                "Building score value table ({}x{} cells)",
                MEAN_LEN,
                STDEV_LEN
            );
            ScoreValueTable::build()
        })
    }

    /// Forces the build now instead of on first query.
    pub fn build_now(&self) {
        self.get();
    }

    pub fn is_built(&self) -> bool {
        self.table.get().is_some()
    }

    pub fn query(
        &self,
        mean: f64,
        stdev: f64,
        center: f64,
        scale: f64,
        sqrt_board_area: f64,
    ) -> f64 {
        self.get()
            .query(mean, stdev, center, scale, sqrt_board_area)
    }
}
