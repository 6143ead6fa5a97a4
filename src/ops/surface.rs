// ============================================================================
// SURFACE PASSES — gradients, normal maps, height relaxation, occlusion
// ============================================================================
//
// Normals are decoded with `decode_normal` (`c * 2 - 1`).  Heights are read
// from the red channel and written to R, G and B.
// ============================================================================

use std::f32::consts::PI;

use super::sampling::{
    Sampler, decode_normal, dot3, encode_normal, luma, mix, normalize3, par_fill,
};
use crate::buffer::PixelBuffer;

/// Golden angle, spreads occlusion taps on a spiral.
const GOLDEN_ANGLE: f32 = 2.399_963;

/// Smallest |nz| used when turning a normal into a slope.
const MIN_NZ: f32 = 0.05;

/// 3×3 Sobel on `value`, normalized so a unit ramp per pixel gives 1.
#[inline]
fn sobel<F: Fn(i32, i32) -> f32>(x: i32, y: i32, value: F) -> (f32, f32) {
    let tl = value(x - 1, y - 1);
    let t = value(x, y - 1);
    let tr = value(x + 1, y - 1);
    let l = value(x - 1, y);
    let r = value(x + 1, y);
    let bl = value(x - 1, y + 1);
    let b = value(x, y + 1);
    let br = value(x + 1, y + 1);
    let gx = (tr + 2.0 * r + br - tl - 2.0 * l - bl) / 8.0;
    let gy = (bl + 2.0 * b + br - tl - 2.0 * t - tr) / 8.0;
    (gx, gy)
}

/// Raw gradient estimate.  The result points along the luminance gradient;
/// base-map decomposition flips X/Y afterwards to get the height convention.
pub fn sobel_to_normal(src: Sampler, out: &mut PixelBuffer, amplitude: f32) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let (gx, gy) = sobel(x, y, |sx, sy| src.at(sx, sy, w, h)[0]);
        encode_normal(normalize3([amplitude * gx, amplitude * gy, 1.0]))
    });
}

/// Strength-weighted neighbourhood average: strong slopes spread into their
/// flat surroundings.
pub fn normal_expand_replace(src: Sampler, out: &mut PixelBuffer, radius: u32) {
    let (w, h) = out.dimensions();
    let r = radius as i32;
    par_fill(out, |x, y| {
        if r == 0 {
            return src.at(x, y, w, h);
        }
        let mut acc = [0.0f32; 3];
        for dy in -r..=r {
            for dx in -r..=r {
                let n = decode_normal(src.at(x + dx, y + dy, w, h));
                let wgt = n[0] * n[0] + n[1] * n[1] + 1e-4;
                acc[0] += n[0] * wgt;
                acc[1] += n[1] * wgt;
                acc[2] += n[2] * wgt;
            }
        }
        encode_normal(normalize3(acc))
    });
}

pub fn normal_expand_mix(
    expanded: Sampler,
    raw: Sampler,
    color: Sampler,
    out: &mut PixelBuffer,
    edge_mix: f32,
    blending: f32,
    flatness: f32,
) {
    let (w, h) = out.dimensions();
    let blending = blending.clamp(0.0, 1.0);
    par_fill(out, |x, y| {
        let cur = decode_normal(expanded.at(x, y, w, h));
        let rn = decode_normal(raw.at(x, y, w, h));
        let (gx, gy) = sobel(x, y, |sx, sy| luma(color.at(sx, sy, w, h)));
        let edge = (edge_mix * (gx * gx + gy * gy).sqrt() * 4.0).clamp(0.0, 1.0);
        let mut m = [0.0f32; 3];
        for c in 0..3 {
            m[c] = mix(mix(rn[c], cur[c], blending), rn[c], edge);
        }
        m[0] *= 1.0 - flatness;
        m[1] *= 1.0 - flatness;
        encode_normal(normalize3(m))
    });
}

/// Weighted octave blend.  All-zero weights give the flat normal.
pub fn mix_normal_levels(levels: [Sampler; 4], out: &mut PixelBuffer, weights: [f32; 4]) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let mut v = [0.0f32; 3];
        for (lvl, wt) in levels.iter().zip(weights) {
            let n = decode_normal(lvl.at(x, y, w, h));
            v[0] += n[0] * wt;
            v[1] += n[1] * wt;
            v[2] += n[2] * wt;
        }
        if dot3(v, v).sqrt() < 1e-6 {
            return encode_normal([0.0, 0.0, 1.0]);
        }
        encode_normal(normalize3(v))
    });
}

pub fn angle_correction(src: Sampler, out: &mut PixelBuffer, angle: f32, correction: f32) {
    let (w, h) = out.dimensions();
    let (s, c) = angle.sin_cos();
    par_fill(out, |x, y| {
        let n = decode_normal(src.at(x, y, w, h));
        let rx = n[0] * c - n[1] * s;
        let ry = n[0] * s + n[1] * c;
        let rz = n[2] + correction * (1.0 - n[2]);
        encode_normal(normalize3([rx, ry, rz]))
    });
}

#[inline]
fn slope(n: [f32; 3]) -> (f32, f32) {
    let nz = n[2].max(MIN_NZ);
    (-n[0] / nz, -n[1] / nz)
}

/// One Jacobi-style relaxation step of height against the normal's slopes at
/// pixel offset `scale`.  Output is unclamped.
pub fn height_from_normal_step(height: Sampler, normal: Sampler, out: &mut PixelBuffer, scale: u32) {
    let (w, h) = out.dimensions();
    let s = scale.max(1) as i32;
    let half = s as f32 * 0.5;
    par_fill(out, |x, y| {
        let (gx, gy) = slope(decode_normal(normal.at(x, y, w, h)));
        let mut acc = 0.0;
        for (ex, ey) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let qx = x + ex * s;
            let qy = y + ey * s;
            let hq = height.at(qx, qy, w, h)[0];
            let (qgx, qgy) = slope(decode_normal(normal.at(qx, qy, w, h)));
            acc += hq - half * ((gx + qgx) * ex as f32 + (gy + qgy) * ey as f32);
        }
        let v = acc * 0.25;
        [v, v, v, 1.0]
    });
}

pub fn normal_from_height(height: Sampler, out: &mut PixelBuffer, depth: f32) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let dx = (height.at(x + 1, y, w, h)[0] - height.at(x - 1, y, w, h)[0]) * 0.5;
        let dy = (height.at(x, y + 1, w, h)[0] - height.at(x, y - 1, w, h)[0]) * 0.5;
        encode_normal(normalize3([-depth * dx, -depth * dy, 1.0]))
    });
}

/// Horizon-style occlusion: taps on a golden-angle spiral, each compared with
/// the surface normal.  Flat regions stay fully lit.
#[allow(clippy::too_many_arguments)]
pub fn occlusion(
    height: Sampler,
    normal: Sampler,
    out: &mut PixelBuffer,
    samples: u32,
    radius: f32,
    depth: f32,
    bias: f32,
    intensity: f32,
) {
    let (w, h) = out.dimensions();
    let bias = bias.max(0.0);
    par_fill(out, |x, y| {
        if samples == 0 {
            return [1.0, 1.0, 1.0, 1.0];
        }
        let h0 = height.at(x, y, w, h)[0];
        let n = normalize3(decode_normal(normal.at(x, y, w, h)));
        let mut total = 0.0;
        for i in 0..samples {
            let a = i as f32 * GOLDEN_ANGLE;
            let dist = radius * ((i as f32 + 0.5) / samples as f32).sqrt();
            let dx = (a.cos() * dist).round();
            let dy = (a.sin() * dist).round();
            let hq = height.at(x + dx as i32, y + dy as i32, w, h)[0];
            let v = [dx, dy, (hq - h0) * depth];
            let len = dot3(v, v).sqrt();
            if len < 1e-5 {
                continue;
            }
            let d = dot3(n, [v[0] / len, v[1] / len, v[2] / len]);
            total += (d - bias).max(0.0);
        }
        let ao = (1.0 - intensity * total / samples as f32).clamp(0.0, 1.0);
        [ao, ao, ao, 1.0]
    });
}

pub fn normal_step(src: Sampler, out: &mut PixelBuffer, step: f32) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let n = decode_normal(src.at(x, y, w, h));
        encode_normal(normalize3([n[0] * step, n[1] * step, n[2]]))
    });
}

/// Add a secondary normal image, rotated by `angle` and tiled `scale` times.
pub fn normal_mixer(normal: Sampler, mixer: Sampler, out: &mut PixelBuffer, weight: f32, angle: f32, scale: f32) {
    let (w, h) = out.dimensions();
    let (s, c) = angle.sin_cos();
    par_fill(out, |x, y| {
        let n = decode_normal(normal.at(x, y, w, h));
        let u = (x as f32 + 0.5) / w as f32 - 0.5;
        let v = (y as f32 + 0.5) / h as f32 - 0.5;
        let mu = (u * c - v * s) * scale + 0.5;
        let mv = (u * s + v * c) * scale + 0.5;
        let m = decode_normal(mixer.sample(mu, mv));
        encode_normal(normalize3([n[0] + weight * m[0], n[1] + weight * m[1], n[2]]))
    });
}

/// Tilt normals along the grunge luminance gradient.
pub fn grunge_normal_warp(normal: Sampler, grunge: Sampler, out: &mut PixelBuffer, weight: f32, depth: f32) {
    let (w, h) = out.dimensions();
    let k = weight * depth;
    par_fill(out, |x, y| {
        let n = decode_normal(normal.at(x, y, w, h));
        let gx = (luma(grunge.at(x + 1, y, w, h)) - luma(grunge.at(x - 1, y, w, h))) * 0.5;
        let gy = (luma(grunge.at(x, y + 1, w, h)) - luma(grunge.at(x, y - 1, w, h))) * 0.5;
        encode_normal(normalize3([n[0] - k * gx, n[1] - k * gy, n[2]]))
    });
}

/// Radians helper for parameters stored in degrees.
#[inline]
pub fn deg(v: f32) -> f32 {
    v * PI / 180.0
}
