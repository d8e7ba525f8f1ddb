//! Host-side packing between plain f32 tensors and the depth-packed layout
//!
//! Feature maps arrive as HWC f32 (`data[(row * width + col) * channels + c]`)
//! and are stored as one [`Half4`] per `(col, row, channel / 4)`. Missing
//! channels in the last group are zero.
//!
//! Weights arrive as `[out_channels][in_channels]` row-major and are stored
//! transposed per output lane: element `(k, l, g)` holds the four input
//! channels `4l..4l+4` feeding output channel `4g + k`.

use crate::error::{ConvError, Result};
use crate::half4::{decode, encode, Half4};
use crate::layout::Strides;
use crate::params::{ConvParams, LANES};

fn check_len(what: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(ConvError::InvalidParams(format!(
            "{} has {} values, expected {}",
            what, actual, expected
        )));
    }
    Ok(())
}

/// Pack an HWC f32 feature map into `strides`
///
/// `strides` may be larger than `height × width` (padding stays zero).
pub fn pack_feature_map(
    data: &[f32],
    height: usize,
    width: usize,
    channels: usize,
    strides: Strides,
) -> Result<Vec<Half4>> {
    check_len("feature map", height * width * channels, data.len())?;
    if width > strides.width || height > strides.height {
        return Err(ConvError::InvalidParams(format!(
            "{}x{} map does not fit strides {:?}",
            height, width, strides
        )));
    }

    let slices = channels.div_ceil(LANES);
    let mut packed = vec![Half4::ZERO; strides.len_for_depth(slices)];
    for row in 0..height {
        for col in 0..width {
            let pixel = &data[(row * width + col) * channels..][..channels];
            for (s, group) in pixel.chunks(LANES).enumerate() {
                let mut lanes = [0.0f32; LANES];
                lanes[..group.len()].copy_from_slice(group);
                packed[strides.offset(col, row, s)] = encode(lanes);
            }
        }
    }
    Ok(packed)
}

/// Unpack a depth-packed feature map back to HWC f32
pub fn unpack_feature_map(
    packed: &[Half4],
    height: usize,
    width: usize,
    channels: usize,
    strides: Strides,
) -> Result<Vec<f32>> {
    let slices = channels.div_ceil(LANES);
    if slices > 0 && height > 0 && width > 0 {
        let last = strides.offset(width - 1, height - 1, slices - 1);
        if last >= packed.len() {
            return Err(ConvError::InvalidParams(format!(
                "packed map has {} elements, need {}",
                packed.len(),
                last + 1
            )));
        }
    }

    let mut data = vec![0.0f32; height * width * channels];
    for row in 0..height {
        for col in 0..width {
            let pixel = &mut data[(row * width + col) * channels..][..channels];
            for (s, group) in pixel.chunks_mut(LANES).enumerate() {
                let lanes = decode(packed[strides.offset(col, row, s)]);
                group.copy_from_slice(&lanes[..group.len()]);
            }
        }
    }
    Ok(data)
}

/// Pack `[out_channels][in_channels]` weights into the lane-major layout
///
/// Uses the weight strides of `params` (`width` = 4 lanes, `height` = depth).
pub fn pack_weights(
    weights: &[f32],
    out_channels: usize,
    in_channels: usize,
    params: &ConvParams,
) -> Result<Vec<Half4>> {
    check_len("weights", out_channels * in_channels, weights.len())?;

    let groups = out_channels.div_ceil(LANES);
    let slices = in_channels.div_ceil(LANES);
    let strides = params.weights;
    if strides.width < LANES || strides.height < slices {
        return Err(ConvError::InvalidParams(format!(
            "weight strides {:?} cannot hold {} slices",
            strides, slices
        )));
    }

    let mut packed = vec![Half4::ZERO; strides.len_for_depth(groups)];
    for o in 0..out_channels {
        let (g, k) = (o / LANES, o % LANES);
        let row = &weights[o * in_channels..][..in_channels];
        for (l, group) in row.chunks(LANES).enumerate() {
            let mut lanes = [0.0f32; LANES];
            lanes[..group.len()].copy_from_slice(group);
            packed[strides.offset(k, l, g)] = encode(lanes);
        }
    }
    Ok(packed)
}

/// Pack a per-output-channel bias, one element per channel-group
pub fn pack_bias(bias: &[f32]) -> Vec<Half4> {
    bias.chunks(LANES)
        .map(|group| {
            let mut lanes = [0.0f32; LANES];
            lanes[..group.len()].copy_from_slice(group);
            encode(lanes)
        })
        .collect()
}
