use candle_core::{Device, Result, Tensor};
use candle_nn::Module;

use crate::model::{GlobalPoolingBlock, OrdinaryBlock, TrunkBlock, TrunkDesc};

use super::layers::{Conv, MatMul, NormAct};
use super::pooling::gpool;

struct OrdinaryResBlock {
    pre: NormAct,
    conv1: Conv,
    mid: NormAct,
    conv2: Conv,
}

impl OrdinaryResBlock {
    fn new(desc: &OrdinaryBlock, device: &Device) -> Result<Self> {
        Ok(Self {
            pre: NormAct::new(&desc.pre_norm, desc.pre_activation, device)?,
            conv1: Conv::new(&desc.conv1, device)?,
            mid: NormAct::new(&desc.mid_norm, desc.mid_activation, device)?,
            conv2: Conv::new(&desc.conv2, device)?,
        })
    }
}

impl Module for OrdinaryResBlock {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let h = x
            .apply(&self.pre)?
            .apply(&self.conv1)?
            .apply(&self.mid)?
            .apply(&self.conv2)?;
        h + x
    }
}

struct GlobalPoolingResBlock {
    pre: NormAct,
    regular_conv: Conv,
    gpool_conv: Conv,
    gpool_norm: NormAct,
    gpool_to_bias: MatMul,
    mid: NormAct,
    conv2: Conv,
}

impl GlobalPoolingResBlock {
    fn new(desc: &GlobalPoolingBlock, device: &Device) -> Result<Self> {
        Ok(Self {
            pre: NormAct::new(&desc.pre_norm, desc.pre_activation, device)?,
            regular_conv: Conv::new(&desc.regular_conv, device)?,
            gpool_conv: Conv::new(&desc.gpool_conv, device)?,
            gpool_norm: NormAct::new(&desc.gpool_norm, desc.gpool_activation, device)?,
            gpool_to_bias: MatMul::new(&desc.gpool_to_bias, device)?,
            mid: NormAct::new(&desc.mid_norm, desc.mid_activation, device)?,
            conv2: Conv::new(&desc.conv2, device)?,
        })
    }
}

impl Module for GlobalPoolingResBlock {
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let a = x.apply(&self.pre)?;
        let regular = a.apply(&self.regular_conv)?;
        let pooled = a.apply(&self.gpool_conv)?.apply(&self.gpool_norm)?;

        let bias = gpool(&pooled)?.apply(&self.gpool_to_bias)?;
        let regular = regular.broadcast_add(&channel_bias(&bias)?)?;

        let h = regular.apply(&self.mid)?.apply(&self.conv2)?;
        h + x
    }
}

enum ResBlock {
    Ordinary(OrdinaryResBlock),
    GlobalPooling(GlobalPoolingResBlock),
}

impl Module for ResBlock {
    #[inline]
    fn forward(&self, x: &Tensor) -> Result<Tensor> {
        match self {
            ResBlock::Ordinary(block) => block.forward(x),
            ResBlock::GlobalPooling(block) => block.forward(x),
        }
    }
}

/// `[N, C] -> [N, C, 1, 1]`, ready to broadcast over the board.
pub(super) fn channel_bias(x: &Tensor) -> Result<Tensor> {
    let (n, c) = x.dims2()?;
    x.reshape((n, c, 1, 1))
}

pub struct Trunk {
    initial_conv: Conv,
    initial_matmul: MatMul,
    blocks: Vec<ResBlock>,
    tip: NormAct,
}

impl Trunk {
    pub fn new(desc: &TrunkDesc, device: &Device) -> Result<Self> {
        let blocks = desc
            .blocks
            .iter()
            .map(|block| match block {
                TrunkBlock::Ordinary(b) => OrdinaryResBlock::new(b, device).map(ResBlock::Ordinary),
                TrunkBlock::GlobalPooling(b) => {
                    GlobalPoolingResBlock::new(b, device).map(ResBlock::GlobalPooling)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            initial_conv: Conv::new(&desc.initial_conv, device)?,
            initial_matmul: MatMul::new(&desc.initial_matmul, device)?,
            blocks,
            tip: NormAct::new(&desc.tip_norm, desc.tip_activation, device)?,
        })
    }

    /// `spatial: [N, C, H, W]`, `global: [N, G]` -> `[N, trunk, H, W]`.
    pub fn forward(&self, spatial: &Tensor, global: &Tensor) -> Result<Tensor> {
        let global = global.apply(&self.initial_matmul)?;
        let mut x = spatial
            .apply(&self.initial_conv)?
            .broadcast_add(&channel_bias(&global)?)?;

        for block in &self.blocks {
            x = x.apply(block)?;
        }

        x.apply(&self.tip)
    }
}
