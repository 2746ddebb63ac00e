use candle_core::Device;
use clap::ValueEnum;
use log::{info, warn};
use std::error::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DeviceKind {
    /// First accelerator compiled in and present, otherwise the CPU.
    Auto,
    Cpu,
    Cuda,
    Metal,
}

/// Opens the requested device. An explicit accelerator that is missing or
/// not compiled in is an error; only `Auto` falls back to the CPU.
pub fn get_device(kind: DeviceKind, ordinal: usize) -> Result<Device, Box<dyn Error>> {
    let device = match kind {
        DeviceKind::Cpu => Device::Cpu,
        DeviceKind::Cuda => cuda(ordinal)?,
        DeviceKind::Metal => metal(ordinal)?,
        DeviceKind::Auto => match cuda(ordinal).or_else(|_| metal(ordinal)) {
            Ok(device) => device,
            Err(e) => {
                if cfg!(any(feature = "cuda", feature = "metal")) {
                    warn!("No accelerator available ({}), using CPU", e);
                }
                Device::Cpu
            }
        },
    };

    info!("Using {:?}", device);
    Ok(device)
}

#[cfg(feature = "cuda")]
fn cuda(ordinal: usize) -> Result<Device, Box<dyn Error>> {
    Ok(Device::new_cuda(ordinal)?)
}

#[cfg(not(feature = "cuda"))]
fn cuda(_ordinal: usize) -> Result<Device, Box<dyn Error>> {
    Err("kataeval was built without the `cuda` feature".into())
}

#[cfg(feature = "metal")]
fn metal(ordinal: usize) -> Result<Device, Box<dyn Error>> {
    Ok(Device::new_metal(ordinal)?)
}

#[cfg(not(feature = "metal"))]
fn metal(_ordinal: usize) -> Result<Device, Box<dyn Error>> {
    Err("kataeval was built without the `metal` feature".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_is_always_available() {
        assert!(get_device(DeviceKind::Cpu, 0).unwrap().is_cpu());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn explicit_cuda_without_feature_fails() {
        assert!(get_device(DeviceKind::Cuda, 0).is_err());
    }

    #[cfg(not(any(feature = "cuda", feature = "metal")))]
    #[test]
    fn auto_falls_back_to_cpu() {
        assert!(get_device(DeviceKind::Auto, 3).unwrap().is_cpu());
    }
}
