//! Fused pointwise convolution + bias + clipped ReLU, one worker at a time
//!
//! The functions here are what a single grid worker executes. They never
//! fail and never check buffer lengths; [`ConvParams::validate`] is the
//! caller-side guard. Executors in [`crate::backends`] decide how workers are
//! scheduled.
//!
//! # Algorithm
//!
//! For worker `(x, y, z)`:
//!
//! ```text
//! acc[c][k] = sum_l dot(input[2x+c, y, l], weights[k, l, z])   c in {0,1}, k in 0..4
//! out[2x+c, y, z] = encode(clamp(acc[c] + bias[z], 0, clip))
//! ```
//!
//! Accumulation runs in f32; only loads and stores are binary16.

use crate::grid::GlobalId;
use crate::half4::{decode, encode, Half4, Vec4};
use crate::params::{ConvParams, LANES};

/// Buffer binding slots, fixed by convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Input feature map (read-only)
    Input = 0,
    /// Output feature map (write-only)
    Output = 1,
    /// Weight tensor (read-only)
    Weights = 2,
    /// Bias vector (read-only)
    Bias = 3,
}

/// The read-only bindings of one dispatch
#[derive(Debug, Clone, Copy)]
pub struct ConvBuffers<'a> {
    pub input: &'a [Half4],
    pub weights: &'a [Half4],
    pub bias: &'a [Half4],
}

/// The two output elements a worker produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileWrite {
    /// Output offsets of columns `2x` and `2x + 1`
    pub offsets: [usize; 2],
    /// Packed results, same order as `offsets`
    pub values: [Half4; 2],
}

#[inline]
fn dot(a: Vec4, b: Vec4) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

/// Bounded ReLU: `clamp(v, 0, clip)` per lane
#[inline]
pub fn clip_activation(v: Vec4, clip: f32) -> Vec4 {
    v.map(|x| x.max(0.0).min(clip))
}

#[inline]
fn add(a: Vec4, b: Vec4) -> Vec4 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2], a[3] + b[3]]
}

/// Depth reduction for one worker, before bias and activation
///
/// Returns one accumulator per output column (`2x`, `2x + 1`).
pub fn accumulate(params: &ConvParams, buffers: &ConvBuffers<'_>, id: GlobalId) -> [Vec4; 2] {
    let [col0, col1] = id.columns();
    let mut acc0 = [0.0f32; LANES];
    let mut acc1 = [0.0f32; LANES];

    for l in 0..params.src_depth {
        let input0 = decode(buffers.input[params.input.offset(col0, id.y, l)]);
        let input1 = decode(buffers.input[params.input.offset(col1, id.y, l)]);

        for k in 0..LANES {
            let f = decode(buffers.weights[params.weights.offset(k, l, id.z)]);
            acc0[k] += dot(input0, f);
            acc1[k] += dot(input1, f);
        }
    }

    [acc0, acc1]
}

/// Reduction, bias, activation and encode for an in-extent worker
///
/// Does not bounds-check `id`; see [`invoke`].
pub fn compute_tile(params: &ConvParams, buffers: &ConvBuffers<'_>, id: GlobalId) -> [Half4; 2] {
    let [acc0, acc1] = accumulate(params, buffers, id);
    let b = decode(buffers.bias[id.z]);

    [
        encode(clip_activation(add(acc0, b), params.clip)),
        encode(clip_activation(add(acc1, b), params.clip)),
    ]
}

/// Output offsets worker `id` writes to
#[inline]
pub fn output_offsets(params: &ConvParams, id: GlobalId) -> [usize; 2] {
    let [col0, col1] = id.columns();
    [
        params.output.offset(col0, id.y, id.z),
        params.output.offset(col1, id.y, id.z),
    ]
}

/// Full worker body: bounds check, then compute
///
/// Returns `None` for workers outside the workload extent; those perform
/// no reads.
pub fn invoke(params: &ConvParams, buffers: &ConvBuffers<'_>, id: GlobalId) -> Option<TileWrite> {
    if !params.workload.contains(id) {
        return None;
    }
    Some(TileWrite {
        offsets: output_offsets(params, id),
        values: compute_tile(params, buffers, id),
    })
}

/// Run `invoke` for `id` and store the result into `output`
#[inline]
pub fn invoke_into(
    params: &ConvParams,
    buffers: &ConvBuffers<'_>,
    id: GlobalId,
    output: &mut [Half4],
) {
    if let Some(tile) = invoke(params, buffers, id) {
        output[tile.offsets[0]] = tile.values[0];
        output[tile.offsets[1]] = tile.values[1];
    }
}
