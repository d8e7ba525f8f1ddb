//! Integration test suite for pointwise-conv
//!
//! Exercises the public API end to end: host-side packing, parameter
//! derivation, validation, and every CPU executor against an f64 reference
//! built straight from the unpacked tensors.
//!
//! Coverage:
//! - Reference match, clamp, linearity and bounds properties
//! - Scalar / Parallel / Auto agreement
//! - Disjoint-write invariant over the whole workload
//! - Error handling and backend selection

use proptest::prelude::*;
use pointwise_conv::half4::{decode, encode};
use pointwise_conv::tensor::{pack_bias, pack_feature_map, pack_weights, unpack_feature_map};
use pointwise_conv::{
    dispatch, Backend, Binding, ConvBuffers, ConvError, ConvParams, Half4, WorkgroupSize,
    WorkloadExtent,
};
use std::collections::HashSet;

// ============================================================================
// PROPERTY TEST CONFIGURATION
// ============================================================================

const PROPTEST_CASES: u32 = 32;

const SENTINEL: Half4 = Half4::from_words([0xcafe_babe, 0x0bad_f00d]);

fn cpu_backends() -> Vec<Backend> {
    let mut backends = vec![Backend::Scalar, Backend::Auto];
    if cfg!(feature = "parallel") {
        backends.push(Backend::Parallel);
    }
    backends
}

/// Round every value through binary16, as packing does
fn quantize(values: &[f32]) -> Vec<f32> {
    values
        .chunks(4)
        .flat_map(|c| {
            let mut lanes = [0.0f32; 4];
            lanes[..c.len()].copy_from_slice(c);
            decode(encode(lanes))[..c.len()].to_vec()
        })
        .collect()
}

/// Dense HWC reference in f64
#[allow(clippy::too_many_arguments)]
fn reference_conv(
    image: &[f32],
    weights: &[f32],
    bias: &[f32],
    height: usize,
    width: usize,
    in_channels: usize,
    out_channels: usize,
    clip: f32,
) -> Vec<f32> {
    let mut out = vec![0.0f32; height * width * out_channels];
    for p in 0..height * width {
        let pixel = &image[p * in_channels..][..in_channels];
        for o in 0..out_channels {
            let row = &weights[o * in_channels..][..in_channels];
            let acc: f64 = pixel
                .iter()
                .zip(row)
                .map(|(&a, &b)| f64::from(a) * f64::from(b))
                .sum::<f64>()
                + f64::from(bias[o]);
            out[p * out_channels + o] = (acc as f32).max(0.0).min(clip);
        }
    }
    out
}

#[derive(Debug)]
struct Layer {
    height: usize,
    width: usize,
    in_channels: usize,
    out_channels: usize,
    image: Vec<f32>,
    weights: Vec<f32>,
    bias: Vec<f32>,
}

impl Layer {
    fn params(&self) -> ConvParams {
        ConvParams::for_shape(self.height, self.width, self.in_channels, self.out_channels)
    }

    fn run(&self, backend: Backend, params: &ConvParams) -> pointwise_conv::Result<Vec<f32>> {
        let input = pack_feature_map(&self.image, self.height, self.width, self.in_channels, params.input)?;
        let weights = pack_weights(&self.weights, self.out_channels, self.in_channels, params)?;
        let bias = pack_bias(&self.bias);
        let mut output = vec![Half4::ZERO; params.output.len_for_depth(params.workload.z)];
        let buffers = ConvBuffers {
            input: &input,
            weights: &weights,
            bias: &bias,
        };
        dispatch(backend, params, &buffers, &mut output)?;
        unpack_feature_map(&output, self.height, self.width, self.out_channels, params.output)
    }

    fn reference(&self, clip: f32) -> Vec<f32> {
        reference_conv(
            &quantize(&self.image),
            &quantize(&self.weights),
            &quantize(&self.bias),
            self.height,
            self.width,
            self.in_channels,
            self.out_channels,
            clip,
        )
    }
}

fn layer_strategy() -> impl Strategy<Value = Layer> {
    (1usize..5, 1usize..7, 1usize..10, 1usize..10).prop_flat_map(|(h, w, ci, co)| {
        (
            prop::collection::vec(-2.0f32..2.0, h * w * ci),
            prop::collection::vec(-1.0f32..1.0, co * ci),
            prop::collection::vec(-1.0f32..1.0, co),
        )
            .prop_map(move |(image, weights, bias)| Layer {
                height: h,
                width: w,
                in_channels: ci,
                out_channels: co,
                image,
                weights,
                bias,
            })
    })
}

fn assert_close(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len());
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        // one binary16 rounding on store plus f32 accumulation
        let tol = e.abs() * 2f32.powi(-10) + 1e-3;
        assert!((a - e).abs() <= tol, "element {}: got {}, expected {}", i, a, e);
    }
}

// ============================================================================
// END-TO-END AGAINST REFERENCE
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

    /// Integration test: every CPU backend matches the f64 reference
    #[test]
    fn integration_backends_match_reference(layer in layer_strategy(), clip in 0.5f32..8.0) {
        let params = layer.params().with_clip(clip);
        let expected = layer.reference(clip);
        for backend in cpu_backends() {
            let actual = layer.run(backend, &params).unwrap();
            assert_close(&actual, &expected);
        }
    }

    /// Integration test: workgroup shape never changes results
    #[test]
    fn integration_workgroup_invariance(
        layer in layer_strategy(),
        wx in 1u32..9, wy in 1u32..5, wz in 1u32..9
    ) {
        let params = layer.params();
        let baseline = layer.run(Backend::Scalar, &params).unwrap();
        let reshaped = params.with_workgroup(WorkgroupSize::new(wx, wy, wz));
        for backend in cpu_backends() {
            prop_assert_eq!(&layer.run(backend, &reshaped).unwrap(), &baseline);
        }
    }

    /// Integration test: workers outside the extent leave the sentinel alone
    #[test]
    fn integration_bounds_sentinel(
        x in 1usize..4, y in 1usize..4, z in 1usize..3,
        px in 0usize..3, py in 0usize..3, pz in 0usize..2
    ) {
        let full = ConvParams::for_shape(y + py, (x + px) * 2, 8, (z + pz) * 4);
        let params = full.with_workload(WorkloadExtent::new(x, y, z));
        let input = vec![Half4::splat(0.5); full.required_input_len()];
        let weights = vec![Half4::splat(0.5); full.required_weights_len()];
        let bias = vec![Half4::splat(0.25); full.required_bias_len()];
        let buffers = ConvBuffers { input: &input, weights: &weights, bias: &bias };

        for backend in cpu_backends() {
            let mut output = vec![SENTINEL; full.required_output_len()];
            dispatch(backend, &params, &buffers, &mut output).unwrap();

            let mut written = HashSet::new();
            for id in params.workload.ids() {
                for col in id.columns() {
                    written.insert(params.output.offset(col, id.y, id.z));
                }
            }
            for (offset, value) in output.iter().enumerate() {
                if written.contains(&offset) {
                    // 2 slices x 4 lanes x 0.25 + 0.25
                    prop_assert_eq!(decode(*value), [2.25; 4]);
                } else {
                    prop_assert_eq!(*value, SENTINEL);
                }
            }
        }
    }
}

// ============================================================================
// NAMED PROPERTIES
// ============================================================================

#[test]
fn integration_reference_match() {
    let params = ConvParams::for_shape(1, 2, 4, 4);
    let input = [encode([1.0, 0.0, 0.0, 0.0]); 2];
    let weights = [encode([2.0, 0.0, 0.0, 0.0]), Half4::ZERO, Half4::ZERO, Half4::ZERO];
    let bias = [Half4::ZERO];
    let buffers = ConvBuffers {
        input: &input,
        weights: &weights,
        bias: &bias,
    };

    for backend in cpu_backends() {
        let mut output = [SENTINEL; 2];
        dispatch(backend, &params, &buffers, &mut output).unwrap();
        assert_eq!(decode(output[0]), [2.0, 0.0, 0.0, 0.0], "{:?}", backend);
        assert_eq!(decode(output[1]), [2.0, 0.0, 0.0, 0.0], "{:?}", backend);
    }
}

#[test]
fn integration_clamp() {
    // identity weights route input straight to pre-clamp accumulators
    let params = ConvParams::for_shape(1, 2, 4, 4);
    let input = [encode([-1.0, 10.0, 0.0, 0.0]); 2];
    let weights = [
        encode([1.0, 0.0, 0.0, 0.0]),
        encode([0.0, 1.0, 0.0, 0.0]),
        encode([0.0, 0.0, 1.0, 0.0]),
        encode([0.0, 0.0, 0.0, 1.0]),
    ];
    let bias = [Half4::ZERO];
    let buffers = ConvBuffers {
        input: &input,
        weights: &weights,
        bias: &bias,
    };

    for backend in cpu_backends() {
        let mut output = [SENTINEL; 2];
        dispatch(backend, &params, &buffers, &mut output).unwrap();
        assert_eq!(decode(output[0])[..2], [0.0, 6.0]);
        assert_eq!(decode(output[1])[..2], [0.0, 6.0]);
    }
}

#[test]
fn integration_disjoint_writes_benchmark_layer() {
    let params = ConvParams::for_shape(9, 18, 1024, 1024);
    let mut seen = HashSet::with_capacity(params.workload.volume() * 2);
    for id in params.workload.ids() {
        for col in id.columns() {
            assert!(seen.insert(params.output.offset(col, id.y, id.z)));
        }
    }
    assert_eq!(seen.len(), 9 * 9 * 256 * 2);
}

#[test]
fn integration_relu_without_upper_bound() {
    let layer = Layer {
        height: 1,
        width: 2,
        in_channels: 4,
        out_channels: 4,
        image: vec![100.0, 0.0, 0.0, 0.0, -100.0, 0.0, 0.0, 0.0],
        weights: {
            let mut w = vec![0.0; 16];
            w[0] = 3.0;
            w
        },
        bias: vec![0.0; 4],
    };
    let params = layer.params().with_clip(f32::INFINITY);
    let out = layer.run(Backend::Scalar, &params).unwrap();
    assert_eq!(out, vec![300.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[test]
fn integration_error_handling() {
    let params = ConvParams::for_shape(2, 4, 8, 8);
    let input = vec![Half4::ZERO; params.required_input_len()];
    let weights = vec![Half4::ZERO; params.required_weights_len()];
    let bias = vec![Half4::ZERO; params.required_bias_len()];
    let buffers = ConvBuffers {
        input: &input,
        weights: &weights,
        bias: &bias,
    };

    // Output too short
    let mut short = vec![SENTINEL; params.required_output_len() - 1];
    let err = dispatch(Backend::Scalar, &params, &buffers, &mut short).unwrap_err();
    assert_eq!(
        err,
        ConvError::BufferTooSmall {
            binding: Binding::Output,
            required: params.required_output_len(),
            actual: params.required_output_len() - 1,
        }
    );
    // Nothing ran
    assert!(short.iter().all(|v| *v == SENTINEL));

    // Extent past the declared width
    let wide = params.with_workload(WorkloadExtent::new(3, 2, 2));
    let mut output = vec![SENTINEL; 64];
    assert!(matches!(
        dispatch(Backend::Scalar, &wide, &buffers, &mut output),
        Err(ConvError::ExtentExceedsBuffer { .. })
    ));

    // NaN clip
    assert!(matches!(
        dispatch(Backend::Scalar, &params.with_clip(f32::NAN), &buffers, &mut output),
        Err(ConvError::InvalidParams(_))
    ));

    // Packing with mismatched shapes
    assert!(pack_weights(&[0.0; 3], 2, 2, &params).is_err());
}

// ============================================================================
// BACKEND SELECTION
// ============================================================================

#[test]
fn integration_backend_selection() {
    use pointwise_conv::select_best_available_backend;

    let backend = select_best_available_backend();
    assert!(matches!(backend, Backend::Scalar | Backend::Parallel));
    assert_eq!(backend, Backend::select_best());
}

// ============================================================================
// PERFORMANCE TEST (must complete under 30 seconds)
// ============================================================================

#[test]
fn integration_performance_gate() {
    use std::time::Instant;

    let start = Instant::now();

    // 9x9 map, 128 -> 128 channels
    let params = ConvParams::for_shape(9, 18, 128, 128);
    let input = vec![Half4::splat(0.1); params.required_input_len()];
    let weights = vec![Half4::splat(0.01); params.required_weights_len()];
    let bias = vec![Half4::ZERO; params.required_bias_len()];
    let buffers = ConvBuffers {
        input: &input,
        weights: &weights,
        bias: &bias,
    };
    let mut output = vec![Half4::ZERO; params.required_output_len()];
    for backend in cpu_backends() {
        dispatch(backend, &params, &buffers, &mut output).unwrap();
    }

    let elapsed = start.elapsed();
    assert!(
        elapsed.as_secs() < 5,
        "Performance gate failed: took {:?}, expected <5s",
        elapsed
    );
}
