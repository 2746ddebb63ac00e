use candle_core::{Device, Result, Tensor};
use candle_nn::Module;

use crate::model::{Activation, PolicyHeadDesc, ValueHeadDesc};

use super::layers::{activate, Conv, MatBias, MatMul, NormAct};
use super::pooling::{gpool, value_pool};
use super::trunk::channel_bias;

pub struct PolicyHead {
    p1_conv: Conv,
    g1_conv: Conv,
    g1_norm: NormAct,
    gpool_to_bias: MatMul,
    p1_norm: NormAct,
    p2_conv: Conv,
    pass: MatMul,
}

impl PolicyHead {
    pub fn new(desc: &PolicyHeadDesc, device: &Device) -> Result<Self> {
        Ok(Self {
            p1_conv: Conv::new(&desc.p1_conv, device)?,
            g1_conv: Conv::new(&desc.g1_conv, device)?,
            g1_norm: NormAct::new(&desc.g1_norm, desc.g1_activation, device)?,
            gpool_to_bias: MatMul::new(&desc.gpool_to_bias, device)?,
            p1_norm: NormAct::new(&desc.p1_norm, desc.p1_activation, device)?,
            p2_conv: Conv::new(&desc.p2_conv, device)?,
            pass: MatMul::new(&desc.pass_matmul, device)?,
        })
    }

    /// Returns `(policy [N, Cp, H, W], pass [N, Cp])` logits.
    pub fn forward(&self, trunk: &Tensor) -> Result<(Tensor, Tensor)> {
        let p = trunk.apply(&self.p1_conv)?;
        let g = trunk.apply(&self.g1_conv)?.apply(&self.g1_norm)?;
        let pooled = gpool(&g)?;

        let bias = pooled.apply(&self.gpool_to_bias)?;
        let p = p.broadcast_add(&channel_bias(&bias)?)?;
        let policy = p.apply(&self.p1_norm)?.apply(&self.p2_conv)?;
        let pass = pooled.apply(&self.pass)?;

        Ok((policy, pass))
    }
}

pub struct ValueOutput {
    /// `[N, 3]` win / loss / no-result logits.
    pub value: Tensor,
    /// `[N, S]` raw score statistics.
    pub score_value: Tensor,
}

pub struct ValueHead {
    v1_conv: Conv,
    v1_norm: NormAct,
    v2: MatMul,
    v2_bias: MatBias,
    v2_activation: Activation,
    v3: MatMul,
    v3_bias: MatBias,
    sv3: MatMul,
    sv3_bias: MatBias,
    ownership: Conv,
}

impl ValueHead {
    pub fn new(desc: &ValueHeadDesc, device: &Device) -> Result<Self> {
        Ok(Self {
            v1_conv: Conv::new(&desc.v1_conv, device)?,
            v1_norm: NormAct::new(&desc.v1_norm, desc.v1_activation, device)?,
            v2: MatMul::new(&desc.v2_matmul, device)?,
            v2_bias: MatBias::new(&desc.v2_bias, device)?,
            v2_activation: desc.v2_activation,
            v3: MatMul::new(&desc.v3_matmul, device)?,
            v3_bias: MatBias::new(&desc.v3_bias, device)?,
            sv3: MatMul::new(&desc.sv3_matmul, device)?,
            sv3_bias: MatBias::new(&desc.sv3_bias, device)?,
            ownership: Conv::new(&desc.ownership_conv, device)?,
        })
    }

    fn features(&self, trunk: &Tensor) -> Result<Tensor> {
        trunk.apply(&self.v1_conv)?.apply(&self.v1_norm)
    }

    fn outputs(&self, features: &Tensor) -> Result<ValueOutput> {
        let h = value_pool(features)?
            .apply(&self.v2)?
            .apply(&self.v2_bias)?;
        let h = activate(&h, self.v2_activation)?;

        Ok(ValueOutput {
            value: h.apply(&self.v3)?.apply(&self.v3_bias)?,
            score_value: h.apply(&self.sv3)?.apply(&self.sv3_bias)?,
        })
    }

    /// Returns the value outputs and the `[N, 1, H, W]` ownership logits.
    pub fn forward(&self, trunk: &Tensor) -> Result<(ValueOutput, Tensor)> {
        let features = self.features(trunk)?;
        let ownership = features.apply(&self.ownership)?;
        Ok((self.outputs(&features)?, ownership))
    }

    pub fn forward_value_only(&self, trunk: &Tensor) -> Result<ValueOutput> {
        self.outputs(&self.features(trunk)?)
    }
}
