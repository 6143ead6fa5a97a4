// ============================================================================
// WGSL SHADER SOURCE — one compute entry point per pass (`cs_<pass name>`)
// ============================================================================
//
// Bind group 0, shared by every entry point:
//   0..3: input textures (unused slots hold a 1×1 dummy)
//   4:    Rgba16Float storage output
//   5:    PassParams uniform
//
// Inputs are read with `textureLoad` only; wrap and bilinear filtering are
// done by hand so they follow the CPU backend texel for texel.
// ============================================================================

/// Workgroup edge: every entry point is `@workgroup_size(8, 8, 1)`.
pub const WORKGROUP: u32 = 8;

pub const PASS_SHADER: &str = r#"
struct PassParams {
    out_size: vec2<u32>,
    // bit 0: clamp addressing, bit 1: nearest filtering
    flags: u32,
    pad0: u32,
    iv: vec4<i32>,
    p: array<vec4<f32>, 8>,
}

@group(0) @binding(0) var in0: texture_2d<f32>;
@group(0) @binding(1) var in1: texture_2d<f32>;
@group(0) @binding(2) var in2: texture_2d<f32>;
@group(0) @binding(3) var in3: texture_2d<f32>;
@group(0) @binding(4) var out_tex: texture_storage_2d<rgba16float, write>;
@group(0) @binding(5) var<uniform> P: PassParams;

const LUMA: vec3<f32> = vec3<f32>(0.299, 0.587, 0.114);
const MIN_NZ: f32 = 0.05;
const GOLDEN_ANGLE: f32 = 2.399963;
const MASK_TOLERANCE: f32 = 0.0019607844;

// ---- addressing + sampling ------------------------------------------------

fn dims(i: u32) -> vec2<i32> {
    var d: vec2<u32>;
    switch i {
        case 0u: { d = textureDimensions(in0); }
        case 1u: { d = textureDimensions(in1); }
        case 2u: { d = textureDimensions(in2); }
        default: { d = textureDimensions(in3); }
    }
    return vec2<i32>(d);
}

fn wrap_coord(v: i32, size: i32) -> i32 {
    if (P.flags & 1u) != 0u {
        return clamp(v, 0, size - 1);
    }
    // Unsigned remainders only: signed `%` on negative operands is not
    // reliable across drivers.
    if v >= 0 {
        return i32(u32(v) % u32(size));
    }
    let r = i32(u32(-v) % u32(size));
    return select(size - r, 0, r == 0);
}

fn fetch(i: u32, x: i32, y: i32) -> vec4<f32> {
    let d = dims(i);
    let c = vec2<i32>(wrap_coord(x, d.x), wrap_coord(y, d.y));
    var t: vec4<f32>;
    switch i {
        case 0u: { t = textureLoad(in0, c, 0); }
        case 1u: { t = textureLoad(in1, c, 0); }
        case 2u: { t = textureLoad(in2, c, 0); }
        default: { t = textureLoad(in3, c, 0); }
    }
    return t;
}

fn round_away(v: f32) -> f32 {
    return sign(v) * floor(abs(v) + 0.5);
}

fn sample_uv(i: u32, uv: vec2<f32>, nearest: bool) -> vec4<f32> {
    let d = vec2<f32>(dims(i));
    let f = uv * d - 0.5;
    if nearest {
        return fetch(i, i32(round_away(f.x)), i32(round_away(f.y)));
    }
    let f0 = floor(f);
    let t = f - f0;
    let x0 = i32(f0.x);
    let y0 = i32(f0.y);
    let p00 = fetch(i, x0, y0);
    let p10 = fetch(i, x0 + 1, y0);
    let p01 = fetch(i, x0, y0 + 1);
    let p11 = fetch(i, x0 + 1, y0 + 1);
    let top = p00 + (p10 - p00) * t.x;
    let bot = p01 + (p11 - p01) * t.x;
    return top + (bot - top) * t.y;
}

fn sample_tex(i: u32, uv: vec2<f32>) -> vec4<f32> {
    return sample_uv(i, uv, (P.flags & 2u) != 0u);
}

fn out_uv(x: i32, y: i32) -> vec2<f32> {
    return (vec2<f32>(f32(x), f32(y)) + 0.5) / vec2<f32>(P.out_size);
}

fn same_size(i: u32) -> bool {
    let d = dims(i);
    return d.x == i32(P.out_size.x) && d.y == i32(P.out_size.y);
}

fn at(i: u32, x: i32, y: i32) -> vec4<f32> {
    if same_size(i) {
        return fetch(i, x, y);
    }
    return sample_tex(i, out_uv(x, y));
}

fn at_nearest(i: u32, x: i32, y: i32) -> vec4<f32> {
    if same_size(i) {
        return fetch(i, x, y);
    }
    let d = dims(i);
    let uv = out_uv(x, y);
    return fetch(i, min(i32(uv.x * f32(d.x)), d.x - 1), min(i32(uv.y * f32(d.y)), d.y - 1));
}

fn inside(gid: vec3<u32>) -> bool {
    return gid.x < P.out_size.x && gid.y < P.out_size.y;
}

fn put(gid: vec3<u32>, c: vec4<f32>) {
    textureStore(out_tex, vec2<i32>(gid.xy), c);
}

// ---- math -----------------------------------------------------------------

fn luma(c: vec4<f32>) -> f32 {
    return c.r * LUMA.x + c.g * LUMA.y + c.b * LUMA.z;
}

fn lerp3(a: vec3<f32>, b: vec3<f32>, t: f32) -> vec3<f32> {
    return a + (b - a) * t;
}

fn normalize3(v: vec3<f32>) -> vec3<f32> {
    let len = sqrt(dot(v, v));
    if len < 1e-8 {
        return vec3<f32>(0.0, 0.0, 1.0);
    }
    return v / len;
}

fn decode_normal(c: vec4<f32>) -> vec3<f32> {
    return c.xyz * 2.0 - 1.0;
}

fn encode_normal(n: vec3<f32>) -> vec4<f32> {
    return vec4<f32>(n * 0.5 + 0.5, 1.0);
}

fn smooth_edge(e0: f32, e1: f32, x: f32) -> f32 {
    if e1 <= e0 {
        return select(1.0, 0.0, x < e0);
    }
    let t = clamp((x - e0) / (e1 - e0), 0.0, 1.0);
    return t * t * (3.0 - 2.0 * t);
}

fn powf(b: f32, e: f32) -> f32 {
    if e == 0.0 {
        return 1.0;
    }
    if b <= 0.0 {
        return 0.0;
    }
    return pow(b, e);
}

fn hash_u32(v: u32) -> u32 {
    var x = v * 0x9E3779B9u;
    x = x ^ (x >> 16u);
    x = x * 0x85EBCA6Bu;
    x = x ^ (x >> 13u);
    x = x * 0xC2B2AE35u;
    x = x ^ (x >> 16u);
    return x;
}

fn hash_f32(x: u32, y: u32, seed: u32) -> f32 {
    let h = hash_u32(x * 374761393u + y * 668265263u + seed);
    return f32(h & 0x00FFFFFFu) / 16777216.0;
}

fn sobel(i: u32, x: i32, y: i32, use_luma: bool) -> vec2<f32> {
    var v: array<f32, 9>;
    var k = 0;
    for (var dy = -1; dy <= 1; dy++) {
        for (var dx = -1; dx <= 1; dx++) {
            let c = at(i, x + dx, y + dy);
            v[k] = select(c.r, luma(c), use_luma);
            k++;
        }
    }
    // v: tl t tr / l c r / bl b br
    let gx = (v[2] + 2.0 * v[5] + v[8] - v[0] - 2.0 * v[3] - v[6]) / 8.0;
    let gy = (v[6] + 2.0 * v[7] + v[8] - v[0] - 2.0 * v[1] - v[2]) / 8.0;
    return vec2<f32>(gx, gy);
}

fn slope(n: vec3<f32>) -> vec2<f32> {
    let nz = max(n.z, MIN_NZ);
    return vec2<f32>(-n.x / nz, -n.y / nz);
}

fn rgb_to_hsv(c: vec3<f32>) -> vec3<f32> {
    let mx = max(max(c.r, c.g), c.b);
    let mn = min(min(c.r, c.g), c.b);
    let delta = mx - mn;
    var h = 0.0;
    if delta > 1e-6 {
        if mx == c.r {
            let q = (c.g - c.b) / delta;
            h = q - 6.0 * floor(q / 6.0);
        } else if mx == c.g {
            h = (c.b - c.r) / delta + 2.0;
        } else {
            h = (c.r - c.g) / delta + 4.0;
        }
        h = h / 6.0;
    }
    var s = 0.0;
    if mx > 1e-6 {
        s = delta / mx;
    }
    return vec3<f32>(h, s, mx);
}

fn hsv_to_rgb(hsv: vec3<f32>) -> vec3<f32> {
    let h6 = (hsv.x - floor(hsv.x)) * 6.0;
    let i = floor(h6);
    let f = h6 - i;
    let v = hsv.z;
    let p = v * (1.0 - hsv.y);
    let q = v * (1.0 - hsv.y * f);
    let t = v * (1.0 - hsv.y * (1.0 - f));
    var rgb: vec3<f32>;
    switch i32(i) % 6 {
        case 0: { rgb = vec3<f32>(v, t, p); }
        case 1: { rgb = vec3<f32>(q, v, p); }
        case 2: { rgb = vec3<f32>(p, v, t); }
        case 3: { rgb = vec3<f32>(p, q, v); }
        case 4: { rgb = vec3<f32>(t, p, v); }
        default: { rgb = vec3<f32>(v, p, q); }
    }
    return rgb;
}

// ---- seamless profile -----------------------------------------------------

fn profile_radius() -> f32 {
    return f32(max(P.iv.x, 1));
}

fn profile_exponent(m: f32) -> f32 {
    let strength = P.p[0].x;
    let power = P.p[0].y;
    return max(1.0 + strength * (2.0 * powf(clamp(m, 0.0, 1.0), power) - 1.0), 0.05);
}

fn profile_weight(d: f32, e: f32) -> f32 {
    let r = profile_radius();
    if d >= r {
        return 0.0;
    }
    return 0.5 * powf(1.0 - d / r, e);
}

fn edge_distance(v: i32, size: i32) -> f32 {
    return f32(min(v, size - 1 - v));
}

fn mirror_contrast(x: i32, y: i32) -> f32 {
    let w = i32(P.out_size.x);
    let h = i32(P.out_size.y);
    let mx = w - 1 - x;
    let my = h - 1 - y;
    let l0 = luma(at(1u, x, y));
    let l1 = luma(at(1u, mx, y));
    let l2 = luma(at(1u, x, my));
    let l3 = luma(at(1u, mx, my));
    return ((l0 + l1) + (l2 + l3)) * 0.25;
}

fn blend2(a: vec4<f32>, b: vec4<f32>, t: f32) -> vec4<f32> {
    let s = 1.0 - t;
    return a * s + b * t;
}

fn blend4(p0: vec4<f32>, p1: vec4<f32>, p2: vec4<f32>, p3: vec4<f32>, wx: f32, wy: f32) -> vec4<f32> {
    let w0 = (1.0 - wx) * (1.0 - wy);
    let w1 = wx * (1.0 - wy);
    let w2 = (1.0 - wx) * wy;
    let w3 = wx * wy;
    return (p0 * w0 + p1 * w1) + (p2 * w2 + p3 * w3);
}

// ---- entry points ---------------------------------------------------------

@compute @workgroup_size(8, 8, 1)
fn cs_copy(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    put(gid, at(0u, i32(gid.x), i32(gid.y)));
}

@compute @workgroup_size(8, 8, 1)
fn cs_resample(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    if P.iv.x == 1 {
        put(gid, at_nearest(0u, x, y));
    } else if same_size(0u) {
        put(gid, fetch(0u, x, y));
    } else {
        put(gid, sample_uv(0u, out_uv(x, y), false));
    }
}

@compute @workgroup_size(8, 8, 1)
fn cs_fill(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    put(gid, P.p[0]);
}

@compute @workgroup_size(8, 8, 1)
fn cs_gaussian_blur(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let r = P.iv.x;
    let sigma = P.p[0].x;
    if r == 0 || sigma <= 0.0 {
        put(gid, at(0u, x, y));
        return;
    }
    let s2 = 2.0 * sigma * sigma;
    var total = 0.0;
    for (var i = -r; i <= r; i++) {
        total += exp(-f32(i * i) / s2);
    }
    let ax = select(0, 1, P.iv.y == 0);
    let ay = 1 - ax;
    var acc = vec4<f32>(0.0);
    for (var i = -r; i <= r; i++) {
        let k = exp(-f32(i * i) / s2) / total;
        acc += at(0u, x + i * ax, y + i * ay) * k;
    }
    put(gid, acc);
}

@compute @workgroup_size(8, 8, 1)
fn cs_grayscale(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let c = at(0u, i32(gid.x), i32(gid.y));
    let w = P.p[0].xyz;
    let g = c.r * w.x + c.g * w.y + c.b * w.z;
    put(gid, vec4<f32>(g, g, g, c.a));
}

@compute @workgroup_size(8, 8, 1)
fn cs_grayscale_anchored(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let c = at(0u, i32(gid.x), i32(gid.y));
    let mn = P.p[0].xyz;
    let d = P.p[1].xyz - mn;
    let len2 = dot(d, d);
    var g = 0.0;
    if len2 < 1e-8 {
        g = luma(c);
    } else {
        g = clamp(dot(c.rgb - mn, d) / len2, 0.0, 1.0);
    }
    put(gid, vec4<f32>(g, g, g, c.a));
}

@compute @workgroup_size(8, 8, 1)
fn cs_invert_components(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let c = at(0u, i32(gid.x), i32(gid.y));
    let rgb = select(c.rgb, 1.0 - c.rgb, P.p[0].xyz > vec3<f32>(0.5));
    put(gid, vec4<f32>(rgb, c.a));
}

@compute @workgroup_size(8, 8, 1)
fn cs_hue_shift(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let c = at(0u, i32(gid.x), i32(gid.y));
    var hsv = rgb_to_hsv(c.rgb);
    hsv.x += P.p[0].x;
    put(gid, vec4<f32>(hsv_to_rgb(hsv), c.a));
}

@compute @workgroup_size(8, 8, 1)
fn cs_enhance(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let c = at(0u, i32(gid.x), i32(gid.y));
    let k = 1.0 + P.p[0].x;
    let rgb = clamp((c.rgb - 0.5) * k + 0.5 + P.p[0].y, vec3<f32>(0.0), vec3<f32>(1.0));
    put(gid, vec4<f32>(rgb, c.a));
}

@compute @workgroup_size(8, 8, 1)
fn cs_remove_shading(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let c = at(0u, x, y);
    let lb = max(luma(at(1u, x, y)), 1e-3);
    let k = 0.5 / lb;
    let rgb = clamp(c.rgb + (c.rgb * k - c.rgb) * P.p[0].x, vec3<f32>(0.0), vec3<f32>(1.0));
    put(gid, vec4<f32>(rgb, c.a));
}

@compute @workgroup_size(8, 8, 1)
fn cs_detail_boost(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let c = at(0u, x, y);
    let bs = at(1u, x, y);
    let bm = at(2u, x, y);
    let boosted = c.rgb + P.p[0].x * (c.rgb - bs.rgb) + P.p[0].y * (bs.rgb - bm.rgb);
    put(gid, vec4<f32>(clamp(boosted, vec3<f32>(0.0), vec3<f32>(1.0)), c.a));
}

@compute @workgroup_size(8, 8, 1)
fn cs_sharpen(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let c = at(0u, x, y);
    let b = at(1u, x, y);
    let rgb = clamp(c.rgb + P.p[0].x * (c.rgb - b.rgb), vec3<f32>(0.0), vec3<f32>(1.0));
    put(gid, vec4<f32>(rgb, c.a));
}

@compute @workgroup_size(8, 8, 1)
fn cs_levels(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let c = at(0u, i32(gid.x), i32(gid.y));
    let mn = P.p[0].x;
    let range = max(P.p[0].y - mn, 1e-4);
    let rgb = clamp((c.rgb - mn) / range, vec3<f32>(0.0), vec3<f32>(1.0));
    put(gid, vec4<f32>(rgb, c.a));
}

@compute @workgroup_size(8, 8, 1)
fn cs_sobel_to_normal(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let g = sobel(0u, i32(gid.x), i32(gid.y), false);
    let amp = P.p[0].x;
    put(gid, encode_normal(normalize3(vec3<f32>(amp * g.x, amp * g.y, 1.0))));
}

@compute @workgroup_size(8, 8, 1)
fn cs_normal_expansion(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    if P.iv.x == 0 {
        let r = P.iv.y;
        if r == 0 {
            put(gid, at(0u, x, y));
            return;
        }
        var acc = vec3<f32>(0.0);
        for (var dy = -r; dy <= r; dy++) {
            for (var dx = -r; dx <= r; dx++) {
                let n = decode_normal(at(0u, x + dx, y + dy));
                let wgt = n.x * n.x + n.y * n.y + 1e-4;
                acc += n * wgt;
            }
        }
        put(gid, encode_normal(normalize3(acc)));
        return;
    }
    let edge_mix = P.p[0].x;
    let blending = clamp(P.p[0].y, 0.0, 1.0);
    let flatness = P.p[0].z;
    let cur = decode_normal(at(0u, x, y));
    let rn = decode_normal(at(1u, x, y));
    let g = sobel(2u, x, y, true);
    let edge = clamp(edge_mix * sqrt(g.x * g.x + g.y * g.y) * 4.0, 0.0, 1.0);
    var m = lerp3(lerp3(rn, cur, blending), rn, edge);
    m.x *= 1.0 - flatness;
    m.y *= 1.0 - flatness;
    put(gid, encode_normal(normalize3(m)));
}

@compute @workgroup_size(8, 8, 1)
fn cs_downsample(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let d = dims(0u);
    let x = i32(gid.x);
    let y = i32(gid.y);
    let x0 = min(2 * x, d.x - 1);
    let y0 = min(2 * y, d.y - 1);
    let x1 = min(2 * x + 1, d.x - 1);
    let y1 = min(2 * y + 1, d.y - 1);
    let s = fetch(0u, x0, y0) + fetch(0u, x1, y0) + fetch(0u, x0, y1) + fetch(0u, x1, y1);
    put(gid, s * 0.25);
}

@compute @workgroup_size(8, 8, 1)
fn cs_mix_normal_levels(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let w = P.p[0];
    var v = decode_normal(at(0u, x, y)) * w.x;
    v += decode_normal(at(1u, x, y)) * w.y;
    v += decode_normal(at(2u, x, y)) * w.z;
    v += decode_normal(at(3u, x, y)) * w.w;
    if sqrt(dot(v, v)) < 1e-6 {
        put(gid, encode_normal(vec3<f32>(0.0, 0.0, 1.0)));
        return;
    }
    put(gid, encode_normal(normalize3(v)));
}

@compute @workgroup_size(8, 8, 1)
fn cs_angle_correction(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let n = decode_normal(at(0u, i32(gid.x), i32(gid.y)));
    let s = sin(P.p[0].x);
    let c = cos(P.p[0].x);
    let rx = n.x * c - n.y * s;
    let ry = n.x * s + n.y * c;
    let rz = n.z + P.p[0].y * (1.0 - n.z);
    put(gid, encode_normal(normalize3(vec3<f32>(rx, ry, rz))));
}

@compute @workgroup_size(8, 8, 1)
fn cs_height_from_normal_step(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let s = max(P.iv.x, 1);
    let half_s = f32(s) * 0.5;
    let g = slope(decode_normal(at(1u, x, y)));
    var dirs = array<vec2<i32>, 4>(vec2<i32>(1, 0), vec2<i32>(-1, 0), vec2<i32>(0, 1), vec2<i32>(0, -1));
    var acc = 0.0;
    for (var k = 0; k < 4; k++) {
        let e = dirs[k];
        let qx = x + e.x * s;
        let qy = y + e.y * s;
        let hq = at(0u, qx, qy).r;
        let qg = slope(decode_normal(at(1u, qx, qy)));
        acc += hq - half_s * ((g.x + qg.x) * f32(e.x) + (g.y + qg.y) * f32(e.y));
    }
    let v = acc * 0.25;
    put(gid, vec4<f32>(v, v, v, 1.0));
}

@compute @workgroup_size(8, 8, 1)
fn cs_normal_from_height(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let depth = P.p[0].x;
    let dx = (at(0u, x + 1, y).r - at(0u, x - 1, y).r) * 0.5;
    let dy = (at(0u, x, y + 1).r - at(0u, x, y - 1).r) * 0.5;
    put(gid, encode_normal(normalize3(vec3<f32>(-depth * dx, -depth * dy, 1.0))));
}

@compute @workgroup_size(8, 8, 1)
fn cs_occlusion(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let samples = P.iv.x;
    if samples <= 0 {
        put(gid, vec4<f32>(1.0));
        return;
    }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let radius = P.p[0].x;
    let depth = P.p[0].y;
    let bias = max(P.p[0].z, 0.0);
    let intensity = P.p[0].w;
    let h0 = at(0u, x, y).r;
    let n = normalize3(decode_normal(at(1u, x, y)));
    var total = 0.0;
    for (var i = 0; i < samples; i++) {
        let a = f32(i) * GOLDEN_ANGLE;
        let dist = radius * sqrt((f32(i) + 0.5) / f32(samples));
        let dx = round_away(cos(a) * dist);
        let dy = round_away(sin(a) * dist);
        let hq = at(0u, x + i32(dx), y + i32(dy)).r;
        let v = vec3<f32>(dx, dy, (hq - h0) * depth);
        let len = sqrt(dot(v, v));
        if len < 1e-5 {
            continue;
        }
        total += max(dot(n, v / len) - bias, 0.0);
    }
    let ao = clamp(1.0 - intensity * total / f32(samples), 0.0, 1.0);
    put(gid, vec4<f32>(ao, ao, ao, 1.0));
}

@compute @workgroup_size(8, 8, 1)
fn cs_remap(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let c = at(0u, i32(gid.x), i32(gid.y));
    let mn = P.p[0].xyz;
    let mx = P.p[1].xyz;
    put(gid, vec4<f32>((c.rgb - mn) / (mx - mn), c.a));
}

@compute @workgroup_size(8, 8, 1)
fn cs_noise(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let c = at(0u, i32(gid.x), i32(gid.y));
    let n = (hash_f32(gid.x, gid.y, bitcast<u32>(P.iv.x)) - 0.5) * P.p[0].x;
    put(gid, vec4<f32>(c.rgb + n, c.a));
}

@compute @workgroup_size(8, 8, 1)
fn cs_seamless_simple(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let w = i32(P.out_size.x);
    let h = i32(P.out_size.y);
    let e = profile_exponent(mirror_contrast(x, y));
    let c = at(0u, x, y);
    if P.iv.y == 0 {
        let t = profile_weight(edge_distance(x, w), e);
        put(gid, blend2(c, at(0u, w - 1 - x, y), t));
    } else {
        let t = profile_weight(edge_distance(y, h), e);
        put(gid, blend2(c, at(0u, x, h - 1 - y), t));
    }
}

@compute @workgroup_size(8, 8, 1)
fn cs_seamless_mirror(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let w = i32(P.out_size.x);
    let h = i32(P.out_size.y);
    let mx = w - 1 - x;
    let my = h - 1 - y;
    let e = profile_exponent(mirror_contrast(x, y));
    var wx = 0.0;
    if P.iv.y != 0 {
        wx = profile_weight(edge_distance(x, w), e);
    }
    var wy = 0.0;
    if P.iv.z != 0 {
        wy = profile_weight(edge_distance(y, h), e);
    }
    put(gid, blend4(at(0u, x, y), at(0u, mx, y), at(0u, x, my), at(0u, mx, my), wx, wy));
}

fn rotated_tap(tx: i32, ty: i32, angle: f32) -> vec4<f32> {
    if abs(angle) < 1e-6 {
        return at(0u, tx, ty);
    }
    let w = f32(P.out_size.x);
    let h = f32(P.out_size.y);
    let cx = (w - 1.0) * 0.5;
    let cy = (h - 1.0) * 0.5;
    let s = sin(angle);
    let c = cos(angle);
    let dx = f32(tx) - cx;
    let dy = f32(ty) - cy;
    let rx = cx + dx * c - dy * s;
    let ry = cy + dx * s + dy * c;
    return sample_tex(0u, vec2<f32>((rx + 0.5) / w, (ry + 0.5) / h));
}

@compute @workgroup_size(8, 8, 1)
fn cs_seamless_random(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let w = i32(P.out_size.x);
    let h = i32(P.out_size.y);
    let mx = w - 1 - x;
    let my = h - 1 - y;
    let e = profile_exponent(mirror_contrast(x, y));
    let wx = profile_weight(edge_distance(x, w), e);
    let wy = profile_weight(edge_distance(y, h), e);

    let angles = P.p[1].xyz;
    let phase = P.p[1].w;
    let outer = min(P.p[2].y, 1.0);
    let inner = min(P.p[2].x, outer);
    var u = 0.5;
    if w > 1 {
        u = f32(x) / f32(w - 1);
    }
    var v = 0.5;
    if h > 1 {
        v = f32(y) / f32(h - 1);
    }
    let r = max(abs(2.0 * u - 1.0), abs(2.0 * v - 1.0));
    let fade = 1.0 - smooth_edge(inner, outer, r);

    let p0 = at(0u, x, y);
    let p1 = rotated_tap(mx, y, (angles.x + phase) * fade);
    let p2 = rotated_tap(x, my, (angles.y + phase) * fade);
    let p3 = rotated_tap(mx, my, (angles.z + phase) * fade);
    put(gid, blend4(p0, p1, p2, p3, wx, wy));
}

@compute @workgroup_size(8, 8, 1)
fn cs_perspective(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let uv = out_uv(i32(gid.x), i32(gid.y));
    let u = uv.x;
    let v = uv.y;
    let b = vec4<f32>((1.0 - u) * (1.0 - v), u * (1.0 - v), (1.0 - u) * v, u * v) * P.p[2];
    let du = b.x * P.p[0].x + b.y * P.p[0].z + b.z * P.p[1].x + b.w * P.p[1].z;
    let dv = b.x * P.p[0].y + b.y * P.p[0].w + b.z * P.p[1].y + b.w * P.p[1].w;
    put(gid, sample_tex(0u, vec2<f32>(u + du, v + dv)));
}

fn overlay(base: f32, top: f32) -> f32 {
    if base < 0.5 {
        return 2.0 * base * top;
    }
    return 1.0 - 2.0 * (1.0 - base) * (1.0 - top);
}

@compute @workgroup_size(8, 8, 1)
fn cs_overlay_blend(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let b = at(0u, x, y);
    let g = at(1u, x, y);
    let k = P.p[0].x;
    let o = vec3<f32>(
        b.r + (overlay(b.r, g.r) - b.r) * k,
        b.g + (overlay(b.g, g.g) - b.g) * k,
        b.b + (overlay(b.b, g.b) - b.b) * k,
    );
    put(gid, vec4<f32>(o, b.a));
}

@compute @workgroup_size(8, 8, 1)
fn cs_grunge_normal_warp(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let n = decode_normal(at(0u, x, y));
    let k = P.p[0].x * P.p[0].y;
    let gx = (luma(at(1u, x + 1, y)) - luma(at(1u, x - 1, y))) * 0.5;
    let gy = (luma(at(1u, x, y + 1)) - luma(at(1u, x, y - 1))) * 0.5;
    put(gid, encode_normal(normalize3(vec3<f32>(n.x - k * gx, n.y - k * gy, n.z))));
}

@compute @workgroup_size(8, 8, 1)
fn cs_normal_step(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let n = decode_normal(at(0u, i32(gid.x), i32(gid.y)));
    let s = P.p[0].x;
    put(gid, encode_normal(normalize3(vec3<f32>(n.x * s, n.y * s, n.z))));
}

@compute @workgroup_size(8, 8, 1)
fn cs_normal_mixer(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let n = decode_normal(at(0u, x, y));
    let weight = P.p[0].x;
    let s = sin(P.p[0].y);
    let c = cos(P.p[0].y);
    let scale = P.p[0].z;
    let uv = out_uv(x, y) - 0.5;
    let mu = (uv.x * c - uv.y * s) * scale + 0.5;
    let mv = (uv.x * s + uv.y * c) * scale + 0.5;
    let m = decode_normal(sample_tex(1u, vec2<f32>(mu, mv)));
    put(gid, encode_normal(normalize3(vec3<f32>(n.x + weight * m.x, n.y + weight * m.y, n.z))));
}

@compute @workgroup_size(8, 8, 1)
fn cs_roughness_noise(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let c = at(0u, x, y);
    let b = at(1u, x, y);
    let d = abs(c.rgb - b.rgb);
    let dev = (d.r * 0.299 + d.g * 0.587 + d.b * 0.114) * P.p[0].x;
    let v = clamp(dev - P.p[0].y, 0.0, 1.0);
    put(gid, vec4<f32>(c.rgb + (vec3<f32>(v) - c.rgb) * P.p[0].z, c.a));
}

@compute @workgroup_size(8, 8, 1)
fn cs_color_remap(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let c = at(0u, i32(gid.x), i32(gid.y));
    let diff = c.rgb - P.p[0].xyz;
    let d = sqrt(dot(diff, diff)) / sqrt(3.0);
    let soft = max(P.p[0].w, 1e-4);
    var t = 1.0 - smooth_edge(0.0, soft, d);
    if P.iv.x != 0 {
        t = 1.0 - t;
    }
    put(gid, vec4<f32>(t, t, t, c.a));
}

@compute @workgroup_size(8, 8, 1)
fn cs_mask_select(@builtin(global_invocation_id) gid: vec3<u32>) {
    if !inside(gid) { return; }
    let x = i32(gid.x);
    let y = i32(gid.y);
    let m = at_nearest(2u, x, y);
    let d = abs(m.rgb - P.p[0].xyz);
    if all(d <= vec3<f32>(MASK_TOLERANCE)) {
        put(gid, at(0u, x, y));
    } else {
        put(gid, at(1u, x, y));
    }
}
"#;
