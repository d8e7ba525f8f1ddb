//! Scalar (single-threaded) executor
//!
//! Walks the full launched grid, workgroup padding included, and lets the
//! per-worker bounds check discard the overshoot. This is the correctness
//! reference the other executors are compared against.

use super::ConvBackend;
use crate::error::Result;
use crate::half4::Half4;
use crate::kernel::{invoke_into, ConvBuffers};
use crate::params::ConvParams;

/// Scalar backend (portable, single thread)
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarBackend;

impl ConvBackend for ScalarBackend {
    fn dispatch(
        &mut self,
        params: &ConvParams,
        buffers: &ConvBuffers<'_>,
        output: &mut [Half4],
    ) -> Result<()> {
        params.validate(buffers, output.len())?;

        let grid = params.workgroup.dispatch_grid(params.workload);
        for id in grid.ids() {
            invoke_into(params, buffers, id, output);
        }
        Ok(())
    }
}
