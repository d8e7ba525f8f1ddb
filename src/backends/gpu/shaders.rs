//! WGSL compute shader for the fused pointwise convolution

/// Pointwise convolution + bias + clipped ReLU (WGSL template)
///
/// Bindings:
/// - 0: input feature map, `vec2<u32>` per packed element (read)
/// - 1: output feature map (written)
/// - 2: weights (read)
/// - 3: bias (read)
/// - 4: `ConvUniforms`
///
/// `{{WG_X}}`, `{{WG_Y}}` and `{{WG_Z}}` are replaced with the workgroup
/// shape by [`pointwise_conv_shader`].
pub const POINTWISE_CONV_SHADER: &str = r#"
struct ConvUniforms {
    clip: f32,
    input_h: u32,
    input_w: u32,
    output_h: u32,
    output_w: u32,
    src_depth: u32,
    weights_h: u32,
    weights_w: u32,
    workload_x: u32,
    workload_y: u32,
    workload_z: u32,
    _padding: u32,
}

@group(0) @binding(0) var<storage, read> input_data: array<vec2<u32>>;
@group(0) @binding(1) var<storage, read_write> output_data: array<vec2<u32>>;
@group(0) @binding(2) var<storage, read> weights: array<vec2<u32>>;
@group(0) @binding(3) var<storage, read> bias: array<vec2<u32>>;
@group(0) @binding(4) var<uniform> p: ConvUniforms;

fn vec4_from_half(v: vec2<u32>) -> vec4<f32> {
    return vec4<f32>(unpack2x16float(v.x), unpack2x16float(v.y));
}

fn vec4_to_half(v: vec4<f32>) -> vec2<u32> {
    return vec2<u32>(pack2x16float(v.xy), pack2x16float(v.zw));
}

@compute @workgroup_size({{WG_X}}, {{WG_Y}}, {{WG_Z}})
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    if (gid.x >= p.workload_x || gid.y >= p.workload_y || gid.z >= p.workload_z) {
        return;
    }

    let col = gid.x * 2u;
    var acc0 = vec4<f32>(0.0);
    var acc1 = vec4<f32>(0.0);

    for (var l: u32 = 0u; l < p.src_depth; l = l + 1u) {
        let in_base = p.input_w * (gid.y + p.input_h * l);
        let in0 = vec4_from_half(input_data[col + in_base]);
        let in1 = vec4_from_half(input_data[col + 1u + in_base]);

        // lane k of the weights row yields output channel k
        let w_base = p.weights_w * (l + p.weights_h * gid.z);
        let f0 = vec4_from_half(weights[w_base]);
        let f1 = vec4_from_half(weights[w_base + 1u]);
        let f2 = vec4_from_half(weights[w_base + 2u]);
        let f3 = vec4_from_half(weights[w_base + 3u]);

        acc0 = acc0 + vec4<f32>(dot(in0, f0), dot(in0, f1), dot(in0, f2), dot(in0, f3));
        acc1 = acc1 + vec4<f32>(dot(in1, f0), dot(in1, f1), dot(in1, f2), dot(in1, f3));
    }

    let b = vec4_from_half(bias[gid.z]);
    let lo = vec4<f32>(0.0);
    let hi = vec4<f32>(p.clip);
    let r0 = min(max(acc0 + b, lo), hi);
    let r1 = min(max(acc1 + b, lo), hi);

    let out_base = p.output_w * (gid.y + p.output_h * gid.z);
    output_data[col + out_base] = vec4_to_half(r0);
    output_data[col + 1u + out_base] = vec4_to_half(r1);
}
"#;

/// Render [`POINTWISE_CONV_SHADER`] for a workgroup shape
pub fn pointwise_conv_shader(x: u32, y: u32, z: u32) -> String {
    POINTWISE_CONV_SHADER
        .replace("{{WG_X}}", &x.to_string())
        .replace("{{WG_Y}}", &y.to_string())
        .replace("{{WG_Z}}", &z.to_string())
}
