//! Per-dispatch scalar configuration
//!
//! [`ConvParams`] carries every scalar a dispatch needs: the activation bound,
//! each buffer's declared strides, the reduction depth, the workload extent and
//! the workgroup shape. It is immutable for the duration of a dispatch.
//!
//! # Examples
//!
//! ```
//! use pointwise_conv::ConvParams;
//!
//! // 9x18 feature map, 1024 -> 1024 channels, ReLU6
//! let params = ConvParams::for_shape(9, 18, 1024, 1024);
//! assert_eq!(params.src_depth, 256);
//! assert_eq!(params.workload.x, 9);
//! assert_eq!(params.clip, 6.0);
//!
//! // Custom configuration using builder pattern
//! let relu = ConvParams::for_shape(4, 4, 8, 8).with_clip(f32::INFINITY);
//! assert!(relu.clip.is_infinite());
//! ```

use crate::error::{ConvError, Result};
use crate::grid::{Axis, WorkgroupSize, WorkloadExtent};
use crate::kernel::{Binding, ConvBuffers};
use crate::layout::Strides;

/// Conventional bound for the ReLU6 activation
pub const DEFAULT_CLIP: f32 = 6.0;

/// Lanes per packed element (channels per channel-group)
pub const LANES: usize = 4;

/// Scalar parameters for one pointwise convolution dispatch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvParams {
    /// Activation upper bound: outputs are clamped into `[0, clip]`
    pub clip: f32,
    /// Input feature map `(width, height)` in packed elements
    pub input: Strides,
    /// Output feature map `(width, height)` in packed elements
    pub output: Strides,
    /// Number of input depth-slices reduced over
    pub src_depth: usize,
    /// Weight tensor strides: width = output lanes, height = depth-slices
    pub weights: Strides,
    /// Grid extent that does real work
    pub workload: WorkloadExtent,
    /// Workgroup shape (scheduling hint)
    pub workgroup: WorkgroupSize,
}

impl Default for ConvParams {
    fn default() -> Self {
        Self {
            clip: DEFAULT_CLIP,
            input: Strides::default(),
            output: Strides::default(),
            src_depth: 0,
            weights: Strides::new(LANES, 0),
            workload: WorkloadExtent::default(),
            workgroup: WorkgroupSize::default(),
        }
    }
}

impl ConvParams {
    /// Create parameters with default clip and workgroup
    pub fn new(
        input: Strides,
        output: Strides,
        src_depth: usize,
        weights: Strides,
        workload: WorkloadExtent,
    ) -> Self {
        Self {
            input,
            output,
            src_depth,
            weights,
            workload,
            ..Self::default()
        }
    }

    /// Derive every scalar from a logical layer shape
    ///
    /// Channels are aligned up to multiples of 4 and the feature-map width is
    /// padded to an even number of columns, so one worker covers each column
    /// pair. Input and output share the same spatial shape.
    pub fn for_shape(
        height: usize,
        width: usize,
        in_channels: usize,
        out_channels: usize,
    ) -> Self {
        let src_depth = in_channels.div_ceil(LANES);
        let dst_groups = out_channels.div_ceil(LANES);
        let column_pairs = width.div_ceil(2);
        let padded_width = column_pairs * 2;

        Self::new(
            Strides::new(padded_width, height),
            Strides::new(padded_width, height),
            src_depth,
            Strides::new(LANES, src_depth),
            WorkloadExtent::new(column_pairs, height, dst_groups),
        )
    }

    /// Set the activation bound
    pub fn with_clip(mut self, clip: f32) -> Self {
        self.clip = clip;
        self
    }

    /// Set the workgroup shape
    pub fn with_workgroup(mut self, workgroup: WorkgroupSize) -> Self {
        self.workgroup = workgroup;
        self
    }

    /// Set the workload extent
    pub fn with_workload(mut self, workload: WorkloadExtent) -> Self {
        self.workload = workload;
        self
    }

    /// Elements the input binding must hold: the highest offset read, plus one
    pub fn required_input_len(&self) -> usize {
        if self.workload.is_empty() || self.src_depth == 0 {
            return 0;
        }
        self.input
            .offset(self.workload.x * 2 - 1, self.workload.y - 1, self.src_depth - 1)
            + 1
    }

    /// Elements the weights binding must hold
    pub fn required_weights_len(&self) -> usize {
        if self.workload.is_empty() || self.src_depth == 0 {
            return 0;
        }
        self.weights
            .offset(LANES - 1, self.src_depth - 1, self.workload.z - 1)
            + 1
    }

    /// Elements the bias binding must hold
    pub fn required_bias_len(&self) -> usize {
        if self.workload.is_empty() {
            return 0;
        }
        self.workload.z
    }

    /// Elements the output binding must hold: the highest offset written, plus one
    pub fn required_output_len(&self) -> usize {
        if self.workload.is_empty() {
            return 0;
        }
        self.output
            .offset(self.workload.x * 2 - 1, self.workload.y - 1, self.workload.z - 1)
            + 1
    }

    /// Check scalars against each other, ignoring buffer lengths
    ///
    /// Guarantees that every in-extent worker reads and writes inside the
    /// declared dimensions, and that output offsets of distinct workers never
    /// collide.
    pub fn validate_shape(&self) -> Result<()> {
        if self.clip.is_nan() || self.clip < 0.0 {
            return Err(ConvError::InvalidParams(format!(
                "clip must be a non-negative number, got {}",
                self.clip
            )));
        }
        if self.workgroup.x == 0 || self.workgroup.y == 0 || self.workgroup.z == 0 {
            return Err(ConvError::InvalidParams(format!(
                "workgroup size must be non-zero, got {:?}",
                self.workgroup
            )));
        }
        if self.workload.is_empty() {
            return Ok(());
        }

        let columns = self.workload.x * 2;
        check_extent(Axis::X, columns, self.input.width)?;
        check_extent(Axis::X, columns, self.output.width)?;
        check_extent(Axis::Y, self.workload.y, self.input.height)?;
        check_extent(Axis::Y, self.workload.y, self.output.height)?;

        if self.weights.width < LANES {
            return Err(ConvError::InvalidParams(format!(
                "weights width must cover {} output lanes, got {}",
                LANES, self.weights.width
            )));
        }
        if self.src_depth > self.weights.height {
            return Err(ConvError::InvalidParams(format!(
                "src_depth {} exceeds weights height {}",
                self.src_depth, self.weights.height
            )));
        }
        Ok(())
    }

    /// Full caller-side check before dispatch: scalars and buffer lengths
    pub fn validate(&self, buffers: &ConvBuffers<'_>, output_len: usize) -> Result<()> {
        self.validate_shape()?;
        check_len(Binding::Input, self.required_input_len(), buffers.input.len())?;
        check_len(Binding::Weights, self.required_weights_len(), buffers.weights.len())?;
        check_len(Binding::Bias, self.required_bias_len(), buffers.bias.len())?;
        check_len(Binding::Output, self.required_output_len(), output_len)?;
        Ok(())
    }
}

fn check_extent(axis: Axis, extent: usize, allocated: usize) -> Result<()> {
    if extent > allocated {
        return Err(ConvError::ExtentExceedsBuffer {
            axis,
            extent,
            allocated,
        });
    }
    Ok(())
}

fn check_len(binding: Binding, required: usize, actual: usize) -> Result<()> {
    if actual < required {
        return Err(ConvError::BufferTooSmall {
            binding,
            required,
            actual,
        });
    }
    Ok(())
}
