use super::layers::{Activation, BiasLayer, ConvLayer, MatMulLayer, NormLayer};

/// Multipliers applied to the raw value head outputs. Stored in the file from
/// format version 13, fixed before that.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostProcessParams {
    pub td_score_multiplier: f32,
    pub score_mean_multiplier: f32,
    pub score_stdev_multiplier: f32,
    pub lead_multiplier: f32,
    pub variance_time_multiplier: f32,
    pub short_term_value_error_multiplier: f32,
    pub short_term_score_error_multiplier: f32,
}

impl Default for PostProcessParams {
    fn default() -> Self {
        Self {
            td_score_multiplier: 20.0,
            score_mean_multiplier: 20.0,
            score_stdev_multiplier: 20.0,
            lead_multiplier: 20.0,
            variance_time_multiplier: 40.0,
            short_term_value_error_multiplier: 0.25,
            short_term_score_error_multiplier: 150.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrdinaryBlock {
    pub name: String,
    pub pre_norm: NormLayer,
    pub pre_activation: Activation,
    pub conv1: ConvLayer,
    pub mid_norm: NormLayer,
    pub mid_activation: Activation,
    pub conv2: ConvLayer,
}

#[derive(Debug, Clone)]
pub struct GlobalPoolingBlock {
    pub name: String,
    pub pre_norm: NormLayer,
    pub pre_activation: Activation,
    pub regular_conv: ConvLayer,
    pub gpool_conv: ConvLayer,
    pub gpool_norm: NormLayer,
    pub gpool_activation: Activation,
    /// Pooled features (3 x gpool channels) to a per-channel bias on the
    /// regular path.
    pub gpool_to_bias: MatMulLayer,
    pub mid_norm: NormLayer,
    pub mid_activation: Activation,
    pub conv2: ConvLayer,
}

#[derive(Debug, Clone)]
pub enum TrunkBlock {
    Ordinary(OrdinaryBlock),
    GlobalPooling(GlobalPoolingBlock),
}

impl TrunkBlock {
    pub fn name(&self) -> &str {
        match self {
            TrunkBlock::Ordinary(block) => &block.name,
            TrunkBlock::GlobalPooling(block) => &block.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrunkDesc {
    pub trunk_channels: usize,
    pub mid_channels: usize,
    pub regular_channels: usize,
    pub dilated_channels: usize,
    pub gpool_channels: usize,
    pub initial_conv: ConvLayer,
    pub initial_matmul: MatMulLayer,
    pub blocks: Vec<TrunkBlock>,
    pub tip_norm: NormLayer,
    pub tip_activation: Activation,
}

#[derive(Debug, Clone)]
pub struct PolicyHeadDesc {
    pub p1_conv: ConvLayer,
    pub g1_conv: ConvLayer,
    pub g1_norm: NormLayer,
    pub g1_activation: Activation,
    pub gpool_to_bias: MatMulLayer,
    pub p1_norm: NormLayer,
    pub p1_activation: Activation,
    pub p2_conv: ConvLayer,
    pub pass_matmul: MatMulLayer,
}

#[derive(Debug, Clone)]
pub struct ValueHeadDesc {
    pub v1_conv: ConvLayer,
    pub v1_norm: NormLayer,
    pub v1_activation: Activation,
    pub v2_matmul: MatMulLayer,
    pub v2_bias: BiasLayer,
    pub v2_activation: Activation,
    pub v3_matmul: MatMulLayer,
    pub v3_bias: BiasLayer,
    pub sv3_matmul: MatMulLayer,
    pub sv3_bias: BiasLayer,
    pub ownership_conv: ConvLayer,
}

/// Everything needed to build a network, as read from a weight file.
#[derive(Debug, Clone)]
pub struct ModelDesc {
    pub name: String,
    pub version: i32,
    pub num_input_channels: usize,
    pub num_input_global_channels: usize,
    pub post_process: PostProcessParams,
    pub trunk: TrunkDesc,
    pub policy_head: PolicyHeadDesc,
    pub value_head: ValueHeadDesc,
}

impl ModelDesc {
    pub fn num_blocks(&self) -> usize {
        self.trunk.blocks.len()
    }

    pub fn policy_channels(&self) -> usize {
        self.policy_head.p2_conv.out_channels
    }

    pub fn score_value_channels(&self) -> usize {
        self.value_head.sv3_matmul.out_channels
    }

    /// Total number of stored weights across every layer.
    pub fn parameter_count(&self) -> usize {
        let trunk = &self.trunk;
        let mut count = trunk.initial_conv.weights.len()
            + trunk.initial_matmul.weights.len()
            + norm_params(&trunk.tip_norm);

        for block in &trunk.blocks {
            count += match block {
                TrunkBlock::Ordinary(b) => {
                    norm_params(&b.pre_norm)
                        + b.conv1.weights.len()
                        + norm_params(&b.mid_norm)
                        + b.conv2.weights.len()
                }
                TrunkBlock::GlobalPooling(b) => {
                    norm_params(&b.pre_norm)
                        + b.regular_conv.weights.len()
                        + b.gpool_conv.weights.len()
                        + norm_params(&b.gpool_norm)
                        + b.gpool_to_bias.weights.len()
                        + norm_params(&b.mid_norm)
                        + b.conv2.weights.len()
                }
            };
        }

        let p = &self.policy_head;
        count += p.p1_conv.weights.len()
            + p.g1_conv.weights.len()
            + norm_params(&p.g1_norm)
            + p.gpool_to_bias.weights.len()
            + norm_params(&p.p1_norm)
            + p.p2_conv.weights.len()
            + p.pass_matmul.weights.len();

        let v = &self.value_head;
        count += v.v1_conv.weights.len()
            + norm_params(&v.v1_norm)
            + v.v2_matmul.weights.len()
            + v.v2_bias.weights.len()
            + v.v3_matmul.weights.len()
            + v.v3_bias.weights.len()
            + v.sv3_matmul.weights.len()
            + v.sv3_bias.weights.len()
            + v.ownership_conv.weights.len();

        count
    }
}

fn norm_params(norm: &NormLayer) -> usize {
    norm.scale.len() + norm.bias.len()
}
