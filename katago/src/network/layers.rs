use candle_core::{bail, Device, Result, Tensor};
use candle_nn::Module;

use crate::model::{Activation, BiasLayer, ConvLayer, MatMulLayer, NormLayer};

/// Applies an activation function element-wise.
pub fn activate(x: &Tensor, activation: Activation) -> Result<Tensor> {
    match activation {
        Activation::Identity => Ok(x.clone()),
        Activation::Relu => x.relu(),
        Activation::Mish => mish(x),
    }
}

// x * tanh(softplus(x)), with softplus written as relu(x) + ln(1 + e^-|x|)
// so large inputs never overflow.
fn mish(x: &Tensor) -> Result<Tensor> {
    let softplus = (x.relu()? + x.abs()?.neg()?.exp()?.affine(1.0, 1.0)?.log()?)?;
    x * softplus.tanh()?
}

/// 2-D convolution with "same" zero padding and stride 1.
pub struct Conv {
    /// `[out, in, kY, kX]`
    kernel: Tensor,
    dilation: usize,
    pad_y: (usize, usize),
    pad_x: (usize, usize),
}

impl Conv {
    pub fn new(desc: &ConvLayer, device: &Device) -> Result<Self> {
        if desc.dilation_y != desc.dilation_x {
            bail!(
                "conv '{}' has unequal dilation {}x{}",
                desc.name,
                desc.dilation_y,
                desc.dilation_x
            );
        }

        let kernel = Tensor::from_slice(
            &desc.weights,
            (desc.kernel_y, desc.kernel_x, desc.in_channels, desc.out_channels),
            device,
        )?
        .permute((3, 2, 0, 1))?
        .contiguous()?;

        Ok(Self {
            kernel,
            dilation: desc.dilation_y,
            pad_y: same_padding(desc.kernel_y, desc.dilation_y),
            pad_x: same_padding(desc.kernel_x, desc.dilation_x),
        })
    }
}

/// Splits the total padding so the smaller half goes first.
fn same_padding(kernel: usize, dilation: usize) -> (usize, usize) {
    let total = dilation * (kernel - 1);
    let before = total / 2;
    (before, total - before)
}

impl Module for Conv {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let mut x = x.clone();
        if self.pad_y != (0, 0) {
            x = x.pad_with_zeros(2, self.pad_y.0, self.pad_y.1)?;
        }
        if self.pad_x != (0, 0) {
            x = x.pad_with_zeros(3, self.pad_x.0, self.pad_x.1)?;
        }
        x.conv2d(&self.kernel, 0, 1, self.dilation, 1)
    }
}

/// Merged batch norm followed by an activation.
pub struct NormAct {
    scale: Tensor,
    bias: Tensor,
    activation: Activation,
}

impl NormAct {
    pub fn new(norm: &NormLayer, activation: Activation, device: &Device) -> Result<Self> {
        let shape = (1, norm.channels, 1, 1);
        Ok(Self {
            scale: Tensor::from_slice(&norm.scale, shape, device)?,
            bias: Tensor::from_slice(&norm.bias, shape, device)?,
            activation,
        })
    }
}

impl Module for NormAct {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let x = x.broadcast_mul(&self.scale)?.broadcast_add(&self.bias)?;
        activate(&x, self.activation)
    }
}

/// `[N, in] x [in, out]`
pub struct MatMul {
    weights: Tensor,
}

impl MatMul {
    pub fn new(desc: &MatMulLayer, device: &Device) -> Result<Self> {
        Ok(Self {
            weights: Tensor::from_slice(
                &desc.weights,
                (desc.in_channels, desc.out_channels),
                device,
            )?,
        })
    }
}

impl Module for MatMul {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        x.matmul(&self.weights)
    }
}

pub struct MatBias {
    bias: Tensor,
}

impl MatBias {
    pub fn new(desc: &BiasLayer, device: &Device) -> Result<Self> {
        Ok(Self {
            bias: Tensor::from_slice(&desc.weights, (1, desc.channels), device)?,
        })
    }
}

impl Module for MatBias {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        x.broadcast_add(&self.bias)
    }
}
