pub mod heads;
pub mod layers;
pub mod pooling;
pub mod trunk;

use candle_core::{bail, Device, Result, Tensor};
use goban::{BOARD_AREA, BOARD_SIZE};

use crate::encoding::InputTensors;
use crate::model::ModelDesc;

use heads::{PolicyHead, ValueHead, ValueOutput};
use trunk::Trunk;

pub use pooling::pooling_scales;

/// Raw outputs of one forward pass, all on the network's device.
pub struct NetworkOutput {
    /// `[N, Cp, H, W]` move logits; channel 0 is the policy for the side to move.
    pub policy: Tensor,
    /// `[N, Cp]` pass logits, one per policy channel.
    pub pass: Tensor,
    /// `[N, 3]` win / loss / no-result logits.
    pub value: Tensor,
    /// `[N, S]` score mean, stdev, lead and the rest, before multipliers.
    pub score_value: Tensor,
    /// `[N, 1, H, W]` ownership logits from the side to move's perspective.
    pub ownership: Tensor,
}

/// A parsed model uploaded to a device, ready for repeated forward passes.
///
/// All parameters are owned by this value; dropping it (or calling
/// [`KataGoNetwork::release`]) frees them together.
pub struct KataGoNetwork {
    trunk: Trunk,
    policy_head: PolicyHead,
    value_head: ValueHead,
    num_input_channels: usize,
    num_input_global_channels: usize,
    device: Device,
}

impl KataGoNetwork {
    pub fn new(model: &ModelDesc, device: &Device) -> Result<Self> {
        let network = Self {
            trunk: Trunk::new(&model.trunk, device)?,
            policy_head: PolicyHead::new(&model.policy_head, device)?,
            value_head: ValueHead::new(&model.value_head, device)?,
            num_input_channels: model.num_input_channels,
            num_input_global_channels: model.num_input_global_channels,
            device: device.clone(),
        };

        log::info!(
            "Uploaded {} parameters of '{}' to {:?}",
            model.parameter_count(),
            model.name,
            device
        );

        Ok(network)
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Stacks encoded positions into `([N, C, 19, 19], [N, G])` tensors.
    pub fn input_tensors(&self, inputs: &[InputTensors]) -> Result<(Tensor, Tensor)> {
        if inputs.is_empty() {
            bail!("cannot run a forward pass on an empty batch");
        }

        let channels = self.num_input_channels;
        let globals = self.num_input_global_channels;
        let mut spatial = Vec::with_capacity(inputs.len() * BOARD_AREA * channels);
        let mut global = Vec::with_capacity(inputs.len() * globals);

        for input in inputs {
            if input.spatial.len() != BOARD_AREA * channels || input.global.len() != globals {
                bail!(
                    "input has {} spatial / {} global values, network expects {} / {}",
                    input.spatial.len(),
                    input.global.len(),
                    BOARD_AREA * channels,
                    globals
                );
            }
            spatial.extend_from_slice(&input.spatial);
            global.extend_from_slice(&input.global);
        }

        let n = inputs.len();
        let spatial = Tensor::from_vec(spatial, (n, BOARD_SIZE, BOARD_SIZE, channels), &self.device)?
            .permute((0, 3, 1, 2))?
            .contiguous()?;
        let global = Tensor::from_vec(global, (n, globals), &self.device)?;
        Ok((spatial, global))
    }

    pub fn forward(&self, inputs: &[InputTensors]) -> Result<NetworkOutput> {
        let (spatial, global) = self.input_tensors(inputs)?;
        self.forward_tensors(&spatial, &global)
    }

    /// Runs the full network on already stacked `[N, C, H, W]` and `[N, G]`
    /// tensors.
    pub fn forward_tensors(&self, spatial: &Tensor, global: &Tensor) -> Result<NetworkOutput> {
        let trunk = self.trunk.forward(spatial, global)?;
        let (policy, pass) = self.policy_head.forward(&trunk)?;
        let (ValueOutput { value, score_value }, ownership) = self.value_head.forward(&trunk)?;

        Ok(NetworkOutput {
            policy,
            pass,
            value,
            score_value,
            ownership,
        })
    }

    /// Skips the policy head and the ownership convolution.
    pub fn forward_value_only(&self, inputs: &[InputTensors]) -> Result<ValueOutput> {
        let (spatial, global) = self.input_tensors(inputs)?;
        let trunk = self.trunk.forward(&spatial, &global)?;
        self.value_head.forward_value_only(&trunk)
    }

    /// Frees every device buffer this network owns.
    pub fn release(self) {
        log::debug!("Releasing network on {:?}", self.device);
    }
}
