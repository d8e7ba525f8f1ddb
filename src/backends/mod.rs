//! Executors for the pointwise convolution grid
//!
//! Every executor runs the same worker body from [`crate::kernel`]; they only
//! differ in how the grid is scheduled.
//!
//! # Backends
//!
//! - `scalar`: walks the launched grid one worker at a time
//! - `parallel`: rayon, one task per output row (feature `parallel`)
//! - `gpu`: wgpu compute shader (feature `gpu`)
//!
//! # Safety
//!
//! No executor needs synchronisation: in-extent workers write disjoint output
//! offsets and every other binding is read-only. [`ConvParams::validate`]
//! runs before any worker so buffer indexing cannot go out of range.

pub mod gpu;
pub mod scalar;

#[cfg(feature = "parallel")]
pub mod parallel;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::error::{ConvError, Result};
use crate::half4::Half4;
use crate::kernel::ConvBuffers;
use crate::params::{ConvParams, LANES};
use crate::Backend;

/// Multiply-accumulates above which `Auto` prefers the GPU
#[cfg(feature = "gpu")]
pub const GPU_THRESHOLD: usize = 1 << 22;

/// Backend trait shared by every executor
///
/// Implementations validate `params` against the buffers, then run every
/// in-extent worker exactly once. Output elements no worker owns are left
/// untouched.
pub trait ConvBackend {
    /// Run one dispatch
    fn dispatch(
        &mut self,
        params: &ConvParams,
        buffers: &ConvBuffers<'_>,
        output: &mut [Half4],
    ) -> Result<()>;
}

/// Multiply-accumulate count of a dispatch
pub fn work_size(params: &ConvParams) -> usize {
    params.workload.volume() * 2 * params.src_depth * LANES * LANES
}

/// Pick the concrete backend `Auto` stands for
#[cfg_attr(not(feature = "gpu"), allow(unused_variables))]
pub fn resolve(backend: Backend, params: &ConvParams) -> Backend {
    match backend {
        Backend::Auto => {
            #[cfg(feature = "gpu")]
            {
                if work_size(params) >= GPU_THRESHOLD
                    && params.clip <= gpu::MAX_CLIP
                    && gpu::GpuBackend::is_available()
                {
                    return Backend::GPU;
                }
            }
            crate::select_best_available_backend()
        }
        other => other,
    }
}

fn run_cpu(
    backend: Backend,
    params: &ConvParams,
    buffers: &ConvBuffers<'_>,
    output: &mut [Half4],
) -> Result<()> {
    match backend {
        Backend::Scalar => scalar::ScalarBackend.dispatch(params, buffers, output),
        #[cfg(feature = "parallel")]
        Backend::Parallel => parallel::ParallelBackend.dispatch(params, buffers, output),
        other => Err(ConvError::UnsupportedBackend(other)),
    }
}

/// Validate and run one pointwise convolution dispatch
///
/// Returns the backend that actually executed. `Auto` falls back to the best
/// CPU backend if the GPU path fails; an explicit `GPU` request does not.
///
/// # Example
///
/// ```
/// use pointwise_conv::half4::{decode, encode, Half4};
/// use pointwise_conv::{dispatch, Backend, ConvBuffers, ConvParams};
///
/// let params = ConvParams::for_shape(1, 2, 4, 4);
/// let input = [encode([1.0, 0.0, 0.0, 0.0]); 2];
/// let weights = [encode([2.0, 0.0, 0.0, 0.0]), Half4::ZERO, Half4::ZERO, Half4::ZERO];
/// let bias = [Half4::ZERO];
/// let mut output = [Half4::ZERO; 2];
///
/// let buffers = ConvBuffers { input: &input, weights: &weights, bias: &bias };
/// dispatch(Backend::Scalar, &params, &buffers, &mut output).unwrap();
/// assert_eq!(decode(output[1]), [2.0, 0.0, 0.0, 0.0]);
/// ```
#[cfg_attr(
    feature = "tracing",
    instrument(skip(params, buffers, output), fields(workload = ?params.workload, src_depth = params.src_depth))
)]
pub fn dispatch(
    backend: Backend,
    params: &ConvParams,
    buffers: &ConvBuffers<'_>,
    output: &mut [Half4],
) -> Result<Backend> {
    let resolved = resolve(backend, params);

    #[cfg(feature = "tracing")]
    tracing::debug!(?backend, ?resolved, work = work_size(params), "dispatching pointwise conv");

    match resolved {
        #[cfg(feature = "gpu")]
        Backend::GPU => {
            let result = gpu::GpuBackend::new().dispatch(params, buffers, output);
            match result {
                Ok(()) => Ok(Backend::GPU),
                #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
                Err(ConvError::GpuError(msg)) if backend == Backend::Auto => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(%msg, "GPU dispatch failed, falling back to CPU");
                    let cpu = crate::select_best_available_backend();
                    run_cpu(cpu, params, buffers, output)?;
                    Ok(cpu)
                }
                Err(err) => Err(err),
            }
        }
        cpu => {
            run_cpu(cpu, params, buffers, output)?;
            Ok(cpu)
        }
    }
}
