//! Multi-threaded executor (rayon)
//!
//! Partitions the output buffer into rows of `output.width` elements. Row `r`
//! is the `(y, z) = (r % output.height, r / output.height)` slice, which
//! holds every column pair worker `(x, y, z)` writes. Rows are disjoint
//! `&mut` chunks, so workers need no synchronisation.
//!
//! The workgroup `y` extent sets the minimum number of rows per rayon task.

use rayon::prelude::*;

use super::ConvBackend;
use crate::error::Result;
use crate::grid::GlobalId;
use crate::half4::Half4;
use crate::kernel::{compute_tile, ConvBuffers};
use crate::params::ConvParams;

/// Rayon backend, one task per output row (or batch of rows)
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelBackend;

impl ConvBackend for ParallelBackend {
    fn dispatch(
        &mut self,
        params: &ConvParams,
        buffers: &ConvBuffers<'_>,
        output: &mut [Half4],
    ) -> Result<()> {
        params.validate(buffers, output.len())?;
        if params.workload.is_empty() {
            return Ok(());
        }

        let row_len = params.output.width;
        let height = params.output.height;
        let workload = params.workload;
        let end = output.len().min(params.output.len_for_depth(workload.z));

        output[..end]
            .par_chunks_mut(row_len)
            .enumerate()
            .with_min_len(params.workgroup.y as usize)
            .for_each(|(r, row)| {
                let (y, z) = (r % height, r / height);
                if y >= workload.y || z >= workload.z {
                    return;
                }
                for x in 0..workload.x {
                    let id = GlobalId::new(x, y, z);
                    debug_assert_eq!(r * row_len + 2 * x, params.output.offset(2 * x, y, z));
                    let [a, b] = compute_tile(params, buffers, id);
                    row[2 * x] = a;
                    row[2 * x + 1] = b;
                }
            });
        Ok(())
    }
}
