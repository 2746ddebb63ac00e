use super::error::{ParseError, ParseResult};
use super::reader::ModelReader;

/// First format version whose activation layers name their function.
const ACTIVATION_KIND_VERSION: i32 = 11;

#[derive(Debug, Clone)]
pub struct ConvLayer {
    pub name: String,
    pub kernel_y: usize,
    pub kernel_x: usize,
    pub in_channels: usize,
    pub out_channels: usize,
    pub dilation_y: usize,
    pub dilation_x: usize,
    /// `[kernel_y][kernel_x][in_channels][out_channels]`, row-major.
    pub weights: Vec<f32>,
}

impl ConvLayer {
    pub fn read(reader: &mut ModelReader) -> ParseResult<Self> {
        let name = reader.read_token("conv name")?.to_string();
        let kernel_y = reader.read_usize("conv kernel height")?;
        let kernel_x = reader.read_usize("conv kernel width")?;
        let in_channels = reader.read_usize("conv input channels")?;
        let out_channels = reader.read_usize("conv output channels")?;
        let dilation_y = reader.read_usize("conv dilation")?;
        let dilation_x = reader.read_usize("conv dilation")?;

        if kernel_y == 0 || kernel_x == 0 || dilation_y == 0 || dilation_x == 0 {
            return Err(ParseError::InvalidShape {
                layer: name,
                reason: format!(
                    "kernel {}x{} with dilation {}x{}",
                    kernel_y, kernel_x, dilation_y, dilation_x
                ),
            });
        }

        let count = weight_count(&name, &[kernel_y, kernel_x, in_channels, out_channels])?;
        let weights = reader.read_floats(count, "conv weights")?;

        Ok(Self {
            name,
            kernel_y,
            kernel_x,
            in_channels,
            out_channels,
            dilation_y,
            dilation_x,
            weights,
        })
    }
}

/// Batch normalization folded into one affine transform per channel:
/// `y = x * scale + bias`.
#[derive(Debug, Clone)]
pub struct NormLayer {
    pub name: String,
    pub channels: usize,
    pub scale: Vec<f32>,
    pub bias: Vec<f32>,
}

impl NormLayer {
    /// Reads running mean, running variance and the optional learned scale
    /// and bias, and merges them so inference never divides.
    pub fn read(reader: &mut ModelReader) -> ParseResult<Self> {
        let name = reader.read_token("norm name")?.to_string();
        let channels = reader.read_usize("norm channels")?;
        let epsilon = reader.read_float("norm epsilon")?;
        let has_scale = reader.read_bool("norm has-scale flag")?;
        let has_bias = reader.read_bool("norm has-bias flag")?;

        let mean = reader.read_floats(channels, "norm mean")?;
        let variance = reader.read_floats(channels, "norm variance")?;
        let learned_scale = if has_scale {
            reader.read_floats(channels, "norm scale")?
        } else {
            vec![1.0; channels]
        };
        let learned_bias = if has_bias {
            reader.read_floats(channels, "norm bias")?
        } else {
            vec![0.0; channels]
        };

        let scale: Vec<f32> = learned_scale
            .iter()
            .zip(&variance)
            .map(|(&s, &v)| s / (v + epsilon).sqrt())
            .collect();
        let bias = learned_bias
            .iter()
            .zip(&scale)
            .zip(&mean)
            .map(|((&b, &s), &m)| b - s * m)
            .collect();

        Ok(Self {
            name,
            channels,
            scale,
            bias,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Identity,
    Relu,
    Mish,
}

impl Activation {
    /// Format versions before 11 store only the layer name and always mean ReLU.
    pub fn read(reader: &mut ModelReader, version: i32) -> ParseResult<Self> {
        reader.read_token("activation name")?;
        if version < ACTIVATION_KIND_VERSION {
            return Ok(Activation::Relu);
        }

        let offset = reader.peek_offset();
        match reader.read_token("activation kind")? {
            "ACTIVATION_IDENTITY" => Ok(Activation::Identity),
            "ACTIVATION_RELU" => Ok(Activation::Relu),
            "ACTIVATION_MISH" => Ok(Activation::Mish),
            token => Err(ParseError::UnknownActivation {
                token: token.to_string(),
                offset,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatMulLayer {
    pub name: String,
    pub in_channels: usize,
    pub out_channels: usize,
    /// `[in_channels][out_channels]`, row-major.
    pub weights: Vec<f32>,
}

impl MatMulLayer {
    pub fn read(reader: &mut ModelReader) -> ParseResult<Self> {
        let name = reader.read_token("matmul name")?.to_string();
        let in_channels = reader.read_usize("matmul input channels")?;
        let out_channels = reader.read_usize("matmul output channels")?;
        let count = weight_count(&name, &[in_channels, out_channels])?;
        let weights = reader.read_floats(count, "matmul weights")?;
        Ok(Self {
            name,
            in_channels,
            out_channels,
            weights,
        })
    }
}

#[derive(Debug, Clone)]
pub struct BiasLayer {
    pub name: String,
    pub channels: usize,
    pub weights: Vec<f32>,
}

impl BiasLayer {
    pub fn read(reader: &mut ModelReader) -> ParseResult<Self> {
        let name = reader.read_token("bias name")?.to_string();
        let channels = reader.read_usize("bias channels")?;
        let weights = reader.read_floats(channels, "bias weights")?;
        Ok(Self {
            name,
            channels,
            weights,
        })
    }
}

/// Product of a layer's declared dimensions, or [`ParseError::InvalidShape`]
/// when it does not fit in `usize`.
fn weight_count(layer: &str, dims: &[usize]) -> ParseResult<usize> {
    dims.iter()
        .try_fold(1usize, |count, &dim| count.checked_mul(dim))
        .ok_or_else(|| ParseError::InvalidShape {
            layer: layer.to_string(),
            reason: format!("{:?} overflows the weight count", dims),
        })
}

/// Fails with [`ParseError::ShapeMismatch`] unless `found == expected`.
pub(crate) fn check_channels(layer: &str, expected: usize, found: usize) -> ParseResult<()> {
    if expected != found {
        return Err(ParseError::ShapeMismatch {
            layer: layer.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::ModelWriter;

    #[test]
    fn norm_is_merged_at_parse_time() {
        let mut writer = ModelWriter::new(8);
        writer.norm("bn", &[1.0, 0.0], &[3.0, 0.0], Some(&[2.0, 1.0]), Some(&[0.5, 0.0]), 1.0);
        let bytes = writer.into_bytes();

        let norm = NormLayer::read(&mut ModelReader::new(&bytes)).unwrap();
        assert_eq!(norm.channels, 2);
        assert_eq!(norm.scale, vec![1.0, 1.0]);
        assert_eq!(norm.bias, vec![-0.5, 0.0]);
    }

    #[test]
    fn norm_without_scale_or_bias_uses_defaults() {
        let mut writer = ModelWriter::new(8);
        writer.norm("bn", &[2.0], &[4.0], None, None, 0.0);
        let bytes = writer.into_bytes();

        let norm = NormLayer::read(&mut ModelReader::new(&bytes)).unwrap();
        assert_eq!(norm.scale, vec![0.5]);
        assert_eq!(norm.bias, vec![-1.0]);
    }

    #[test]
    fn conv_weights_follow_their_shape() {
        let mut writer = ModelWriter::new(8);
        let weights: Vec<f32> = (0..3 * 3 * 2 * 4).map(|i| i as f32).collect();
        writer.conv("c", 3, 3, 2, 4, &weights);
        let bytes = writer.into_bytes();

        let conv = ConvLayer::read(&mut ModelReader::new(&bytes)).unwrap();
        assert_eq!((conv.kernel_y, conv.kernel_x), (3, 3));
        assert_eq!((conv.in_channels, conv.out_channels), (2, 4));
        assert_eq!((conv.dilation_y, conv.dilation_x), (1, 1));
        assert_eq!(conv.weights, weights);
    }

    #[test]
    fn zero_sized_kernel_is_rejected() {
        let bytes = b"c 0 3 1 1 1 1 @BIN@".to_vec();
        assert!(matches!(
            ConvLayer::read(&mut ModelReader::new(&bytes)),
            Err(ParseError::InvalidShape { .. })
        ));
    }

    #[test]
    fn oversized_dimensions_are_invalid_shapes() {
        let bytes = b"c 4294967296 4294967296 22 1 1 1 @BIN@".to_vec();
        match ConvLayer::read(&mut ModelReader::new(&bytes)) {
            Err(ParseError::InvalidShape { layer, .. }) => assert_eq!(layer, "c"),
            other => panic!("unexpected {:?}", other.map(|c| c.weights.len())),
        }

        let bytes = format!("m {} 2 @BIN@", usize::MAX).into_bytes();
        assert!(matches!(
            MatMulLayer::read(&mut ModelReader::new(&bytes)),
            Err(ParseError::InvalidShape { .. })
        ));
    }

    #[test]
    fn activation_kind_depends_on_version() {
        let mut reader = ModelReader::new(b"act ACTIVATION_MISH");
        assert_eq!(Activation::read(&mut reader, 8).unwrap(), Activation::Relu);
        // Version 8 consumed only the name.
        assert!(reader.read_token("rest").is_ok());

        let mut reader = ModelReader::new(b"act ACTIVATION_MISH");
        assert_eq!(Activation::read(&mut reader, 11).unwrap(), Activation::Mish);

        let mut reader = ModelReader::new(b"act ACTIVATION_GELU");
        match Activation::read(&mut reader, 14) {
            Err(ParseError::UnknownActivation { token, offset }) => {
                assert_eq!(token, "ACTIVATION_GELU");
                assert_eq!(offset, 4);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
