use candle_core::{Result, Tensor};

/// Factors applied to the mean for the second and third pooled features:
/// `(0.1 * b, 0.01 * b^2 - 0.1)` with `b = sqrt(height * width) - 14`.
pub fn pooling_scales(height: usize, width: usize) -> (f64, f64) {
    let b = ((height * width) as f64).sqrt() - 14.0;
    (0.1 * b, 0.01 * b * b - 0.1)
}

/// `[N, C, H, W] -> [N, 3C]`: mean, board-size scaled mean, max.
pub fn gpool(x: &Tensor) -> Result<Tensor> {
    let (_, _, height, width) = x.dims4()?;
    let (mean_scale, _) = pooling_scales(height, width);

    let flat = x.flatten_from(2)?;
    let mean = flat.mean(2)?;
    let max = flat.max(2)?;
    let scaled = mean.affine(mean_scale, 0.0)?;
    Tensor::cat(&[&mean, &scaled, &max], 1)
}

/// Value head pooling: like [`gpool`] with the max replaced by a second
/// board-size term.
pub fn value_pool(x: &Tensor) -> Result<Tensor> {
    let (_, _, height, width) = x.dims4()?;
    let (mean_scale, square_scale) = pooling_scales(height, width);

    let mean = x.flatten_from(2)?.mean(2)?;
    let scaled = mean.affine(mean_scale, 0.0)?;
    let squared = mean.affine(square_scale, 0.0)?;
    Tensor::cat(&[&mean, &scaled, &squared], 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn full_board_constants_are_exact() {
        assert_eq!(pooling_scales(19, 19), (0.5, 0.15));
        assert_eq!(pooling_scales(14, 14), (0.0, -0.1));
    }

    #[test]
    fn gpool_concatenates_mean_scaled_and_max() -> Result<()> {
        let device = Device::Cpu;
        let mut values = vec![0.0f32; 2 * 361];
        // Channel 0: a single 361 so the mean is exactly 1.
        values[100] = 361.0;
        // Channel 1: constant 2.
        for v in &mut values[361..] {
            *v = 2.0;
        }
        let x = Tensor::from_slice(&values, (1, 2, 19, 19), &device)?;

        let pooled = gpool(&x)?.to_vec2::<f32>()?;
        let expected = [1.0, 2.0, 0.5, 1.0, 361.0, 2.0];
        assert_eq!(pooled.len(), 1);
        for (got, want) in pooled[0].iter().zip(expected) {
            assert!((got - want).abs() < 1e-5, "{} vs {}", got, want);
        }
        Ok(())
    }

    #[test]
    fn value_pool_uses_quadratic_term() -> Result<()> {
        let device = Device::Cpu;
        let x = Tensor::full(4.0f32, (2, 1, 19, 19), &device)?;

        let pooled = value_pool(&x)?.to_vec2::<f32>()?;
        for row in pooled {
            assert!((row[0] - 4.0).abs() < 1e-5);
            assert!((row[1] - 2.0).abs() < 1e-5);
            assert!((row[2] - 0.6).abs() < 1e-5);
        }
        Ok(())
    }
}
