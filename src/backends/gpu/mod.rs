//! GPU executor using wgpu (Vulkan/Metal/DX12/WebGPU)
//!
//! Runs the pointwise convolution as a WGSL compute shader, one invocation
//! per grid worker, with the workgroup shape baked into the shader source.
//!
//! # Architecture
//!
//! - Device initialization is lazy (first dispatch)
//! - Packed `Half4` buffers upload as `array<vec2<u32>>` unchanged
//! - Asynchronous execution with pollster for blocking
//! - [`crate::dispatch`] with `Backend::Auto` falls back to CPU if the GPU fails

pub mod shaders;

/// Largest clip the shader accepts
///
/// `pack2x16float` is undefined outside the binary16 range, so the clamp
/// must keep every output at or below the largest finite half.
pub const MAX_CLIP: f32 = 65504.0;

#[cfg(feature = "gpu")]
mod device;

#[cfg(feature = "gpu")]
pub use device::GpuDevice;

#[cfg(feature = "gpu")]
use super::ConvBackend;
#[cfg(feature = "gpu")]
use crate::error::{ConvError, Result};
#[cfg(feature = "gpu")]
use crate::half4::Half4;
#[cfg(feature = "gpu")]
use crate::kernel::ConvBuffers;
#[cfg(feature = "gpu")]
use crate::params::ConvParams;

/// GPU backend for pointwise convolution
#[cfg(feature = "gpu")]
#[derive(Default)]
pub struct GpuBackend {
    device: Option<GpuDevice>,
}

#[cfg(feature = "gpu")]
impl GpuBackend {
    /// Create a new GPU backend
    pub fn new() -> Self {
        Self { device: None }
    }

    /// Initialize GPU device (lazy)
    fn ensure_device(&mut self) -> Result<&GpuDevice> {
        if self.device.is_none() {
            self.device = Some(GpuDevice::new().map_err(ConvError::GpuError)?);
        }
        self.device
            .as_ref()
            .ok_or_else(|| ConvError::GpuError("GPU device not initialized".to_string()))
    }

    /// Check if GPU is available
    pub fn is_available() -> bool {
        GpuDevice::is_available()
    }
}

#[cfg(feature = "gpu")]
impl ConvBackend for GpuBackend {
    fn dispatch(
        &mut self,
        params: &ConvParams,
        buffers: &ConvBuffers<'_>,
        output: &mut [Half4],
    ) -> Result<()> {
        params.validate(buffers, output.len())?;
        if params.clip > MAX_CLIP {
            return Err(ConvError::InvalidParams(format!(
                "GPU clip must not exceed {}, got {}",
                MAX_CLIP, params.clip
            )));
        }

        // nothing to launch, and wgpu rejects zero-sized dispatches of real buffers
        if params.workload.is_empty() {
            return Ok(());
        }

        let device = self.ensure_device()?;
        device
            .pointwise_conv(params, buffers, output)
            .map_err(ConvError::GpuError)
    }
}
