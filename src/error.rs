//! Error types for pointwise convolution dispatch

use thiserror::Error;

use crate::grid::Axis;
use crate::kernel::Binding;
use crate::Backend;

/// Result type for pointwise convolution operations
pub type Result<T> = std::result::Result<T, ConvError>;

/// Errors raised by the dispatch layer before any worker runs
///
/// The worker function itself never fails; these errors come from the
/// shape check that guards every executor.
#[derive(Debug, Error, PartialEq)]
pub enum ConvError {
    /// Backend not compiled in or not usable on this platform
    #[error("Backend not supported on this platform: {0:?}")]
    UnsupportedBackend(Backend),

    /// A bound buffer is shorter than the highest offset a valid worker touches
    #[error("Buffer {binding:?} too small: need {required} elements, got {actual}")]
    BufferTooSmall {
        /// Which binding is short
        binding: Binding,
        /// Minimum element count
        required: usize,
        /// Actual element count
        actual: usize,
    },

    /// A workload extent reaches past a declared buffer dimension
    #[error("Workload {axis:?} extent {extent} exceeds allocated {allocated}")]
    ExtentExceedsBuffer {
        /// Offending grid axis
        axis: Axis,
        /// Extent in elements along the buffer dimension
        extent: usize,
        /// Declared buffer dimension
        allocated: usize,
    },

    /// Scalar parameter out of range
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// GPU error
    #[error("GPU error: {0}")]
    GpuError(String),
}
