//! Fused pointwise convolution over half-precision feature maps
//!
//! Computes a 1×1 convolution, adds a bias and applies a clipped ReLU
//! (`clamp(x, 0, clip)`, ReLU6 by default) in a single pass over a 3D grid of
//! independent workers. Every tensor is stored as packed binary16
//! ([`Half4`]: four lanes in two 32-bit words); accumulation runs in f32.
//!
//! Three executors run the same worker body:
//!
//! 1. **Scalar** - single thread, the correctness reference
//! 2. **Parallel** - rayon over disjoint output rows (feature `parallel`)
//! 3. **GPU** - WGSL compute shader via `wgpu` (feature `gpu`)
//!
//! # Layout
//!
//! Feature maps are depth-packed: element `(col, row, slice)` holds channels
//! `4*slice..4*slice+4` and lives at `col + width * (row + height * slice)`.
//! Worker `(x, y, z)` produces output columns `2x` and `2x+1` of row `y` for
//! channel-group `z`.
//!
//! # Quick Start
//!
//! ```rust
//! use pointwise_conv::tensor::{pack_bias, pack_feature_map, pack_weights, unpack_feature_map};
//! use pointwise_conv::{dispatch, Backend, ConvBuffers, ConvParams, Half4};
//!
//! // 1x2 image, 4 channels in, 4 channels out
//! let params = ConvParams::for_shape(1, 2, 4, 4);
//! let image = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];
//! let mut w = [0.0f32; 16];
//! w[0] = 2.0; // out 0 <- 2 * in 0
//!
//! let input = pack_feature_map(&image, 1, 2, 4, params.input).unwrap();
//! let weights = pack_weights(&w, 4, 4, &params).unwrap();
//! let bias = pack_bias(&[0.0; 4]);
//! let mut output = vec![Half4::ZERO; params.required_output_len()];
//!
//! let buffers = ConvBuffers { input: &input, weights: &weights, bias: &bias };
//! dispatch(Backend::Auto, &params, &buffers, &mut output).unwrap();
//!
//! let result = unpack_feature_map(&output, 1, 2, 4, params.output).unwrap();
//! assert_eq!(result, vec![2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0]);
//! ```

pub mod backends;
pub mod error;
pub mod grid;
pub mod half4;
pub mod kernel;
pub mod layout;
pub mod params;
pub mod tensor;

pub use backends::{dispatch, ConvBackend};
pub use error::{ConvError, Result};
pub use grid::{GlobalId, WorkgroupSize, WorkloadExtent};
pub use half4::Half4;
pub use kernel::{Binding, ConvBuffers};
pub use layout::Strides;
pub use params::ConvParams;

/// Backend execution target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Single-threaded reference
    Scalar,
    /// rayon thread pool
    Parallel,
    /// GPU compute (wgpu)
    GPU,
    /// Auto-select best available
    Auto,
}

impl Backend {
    /// Select the best available CPU backend
    ///
    /// This is a convenience wrapper around `select_best_available_backend()`
    pub fn select_best() -> Self {
        select_best_available_backend()
    }
}

/// Select the best CPU backend compiled into this build
///
/// The GPU is never chosen here: whether it pays off depends on the workload
/// size, which [`backends::resolve`] takes into account for `Backend::Auto`.
///
/// # Examples
///
/// ```
/// use pointwise_conv::{select_best_available_backend, Backend};
///
/// let backend = select_best_available_backend();
/// assert_ne!(backend, Backend::Auto);
/// ```
pub fn select_best_available_backend() -> Backend {
    #[cfg(feature = "parallel")]
    {
        Backend::Parallel
    }

    #[cfg(not(feature = "parallel"))]
    {
        Backend::Scalar
    }
}
