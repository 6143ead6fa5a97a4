// ============================================================================
// SEAMLESS TILING — edge blends that make opposite borders match
// ============================================================================
//
// Every variant blends a pixel with its mirrored counterpart(s) using the
// profile `w(d) = 0.5 * (1 - d / r)^e`, which is exactly 0.5 on the border
// row/column.  Taps are summed pairwise in mirror order so that a pixel and its
// mirror produce bit-identical results.
// ============================================================================

use super::sampling::{Sampler, luma, par_fill, smoothstep};
use crate::buffer::PixelBuffer;
use crate::passes::{Axis, RandomTilingPass};

/// Contrast-driven profile exponent.
#[derive(Clone, Copy)]
struct Profile {
    radius: f32,
    strength: f32,
    power: f32,
}

impl Profile {
    fn new(radius: u32, strength: f32, power: f32) -> Self {
        Self {
            radius: radius.max(1) as f32,
            strength,
            power,
        }
    }

    #[inline]
    fn exponent(&self, m: f32) -> f32 {
        (1.0 + self.strength * (2.0 * m.clamp(0.0, 1.0).powf(self.power) - 1.0)).max(0.05)
    }

    #[inline]
    fn weight(&self, d: f32, e: f32) -> f32 {
        if d >= self.radius {
            0.0
        } else {
            0.5 * (1.0 - d / self.radius).powf(e)
        }
    }
}

/// The four mirror images of `(x, y)`: self, X-mirror, Y-mirror, both.
#[inline]
fn mirrored(x: i32, y: i32, w: i32, h: i32) -> [(i32, i32); 4] {
    let mx = w - 1 - x;
    let my = h - 1 - y;
    [(x, y), (mx, y), (x, my), (mx, my)]
}

#[inline]
fn contrast_at(contrast: &Sampler, taps: &[(i32, i32); 4], w: u32, h: u32) -> f32 {
    let l = |i: usize| luma(contrast.at(taps[i].0, taps[i].1, w, h));
    ((l(0) + l(1)) + (l(2) + l(3))) * 0.25
}

#[inline]
fn edge_distance(v: i32, size: i32) -> f32 {
    v.min(size - 1 - v) as f32
}

#[inline]
fn blend2(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let s = 1.0 - t;
    [
        a[0] * s + b[0] * t,
        a[1] * s + b[1] * t,
        a[2] * s + b[2] * t,
        a[3] * s + b[3] * t,
    ]
}

#[inline]
fn blend4(p: [[f32; 4]; 4], wx: f32, wy: f32) -> [f32; 4] {
    let w = [
        (1.0 - wx) * (1.0 - wy),
        wx * (1.0 - wy),
        (1.0 - wx) * wy,
        wx * wy,
    ];
    let mut o = [0.0f32; 4];
    for c in 0..4 {
        o[c] = (p[0][c] * w[0] + p[1][c] * w[1]) + (p[2][c] * w[2] + p[3][c] * w[3]);
    }
    o
}

pub fn seamless_simple(
    src: Sampler,
    contrast: Sampler,
    out: &mut PixelBuffer,
    radius: u32,
    axis: Axis,
    strength: f32,
    power: f32,
) {
    let (w, h) = out.dimensions();
    let (wi, hi) = (w as i32, h as i32);
    let profile = Profile::new(radius, strength, power);
    par_fill(out, |x, y| {
        let taps = mirrored(x, y, wi, hi);
        let e = profile.exponent(contrast_at(&contrast, &taps, w, h));
        let c = src.at(x, y, w, h);
        match axis {
            Axis::Horizontal => {
                let t = profile.weight(edge_distance(x, wi), e);
                blend2(c, src.at(taps[1].0, y, w, h), t)
            }
            Axis::Vertical => {
                let t = profile.weight(edge_distance(y, hi), e);
                blend2(c, src.at(x, taps[2].1, w, h), t)
            }
        }
    });
}

#[allow(clippy::too_many_arguments)]
pub fn seamless_mirror(
    src: Sampler,
    contrast: Sampler,
    out: &mut PixelBuffer,
    radius: u32,
    mirror_x: bool,
    mirror_y: bool,
    strength: f32,
    power: f32,
) {
    let (w, h) = out.dimensions();
    let (wi, hi) = (w as i32, h as i32);
    let profile = Profile::new(radius, strength, power);
    par_fill(out, |x, y| {
        let taps = mirrored(x, y, wi, hi);
        let e = profile.exponent(contrast_at(&contrast, &taps, w, h));
        let wx = if mirror_x { profile.weight(edge_distance(x, wi), e) } else { 0.0 };
        let wy = if mirror_y { profile.weight(edge_distance(y, hi), e) } else { 0.0 };
        let p = taps.map(|(tx, ty)| src.at(tx, ty, w, h));
        blend4(p, wx, wy)
    });
}

/// Like the mirror blend, but the three counterpart taps read the image
/// rotated about its center.  Rotation fades out towards the border so edge
/// pixels read unrotated mirrors.
pub fn seamless_random(
    src: Sampler,
    contrast: Sampler,
    out: &mut PixelBuffer,
    radius: u32,
    strength: f32,
    power: f32,
    random: RandomTilingPass,
) {
    let (w, h) = out.dimensions();
    let (wi, hi) = (w as i32, h as i32);
    let profile = Profile::new(radius, strength, power);
    let outer = random.outer_radius.min(1.0);
    let inner = random.inner_radius.min(outer);
    let cx = (w as f32 - 1.0) * 0.5;
    let cy = (h as f32 - 1.0) * 0.5;
    par_fill(out, |x, y| {
        let taps = mirrored(x, y, wi, hi);
        let e = profile.exponent(contrast_at(&contrast, &taps, w, h));
        let wx = profile.weight(edge_distance(x, wi), e);
        let wy = profile.weight(edge_distance(y, hi), e);

        let u = if wi > 1 { x as f32 / (wi - 1) as f32 } else { 0.5 };
        let v = if hi > 1 { y as f32 / (hi - 1) as f32 } else { 0.5 };
        let r = (2.0 * u - 1.0).abs().max((2.0 * v - 1.0).abs());
        let fade = 1.0 - smoothstep(inner, outer, r);

        let mut p = [src.at(x, y, w, h); 4];
        for k in 1..4 {
            let (tx, ty) = taps[k];
            let angle = (random.angles[k - 1] + random.phase) * fade;
            p[k] = if angle.abs() < 1e-6 {
                src.at(tx, ty, w, h)
            } else {
                let (s, c) = angle.sin_cos();
                let dx = tx as f32 - cx;
                let dy = ty as f32 - cy;
                let rx = cx + dx * c - dy * s;
                let ry = cy + dx * s + dy * c;
                src.sample((rx + 0.5) / w as f32, (ry + 0.5) / h as f32)
            };
        }
        blend4(p, wx, wy)
    });
}

/// Bilinear corner warp.  `corners` are UV offsets for top-left, top-right,
/// bottom-left and bottom-right.
pub fn perspective(src: Sampler, out: &mut PixelBuffer, corners: [[f32; 2]; 4], weights: [f32; 4]) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let u = (x as f32 + 0.5) / w as f32;
        let v = (y as f32 + 0.5) / h as f32;
        let b = [(1.0 - u) * (1.0 - v), u * (1.0 - v), (1.0 - u) * v, u * v];
        let mut du = 0.0;
        let mut dv = 0.0;
        for k in 0..4 {
            du += b[k] * weights[k] * corners[k][0];
            dv += b[k] * weights[k] * corners[k][1];
        }
        src.sample(u + du, v + dv)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::SamplerSettings;

    fn noisy(w: u32, h: u32) -> PixelBuffer {
        let mut b = PixelBuffer::new(w, h).unwrap();
        for y in 0..h {
            for x in 0..w {
                let v = super::super::sampling::hash_f32(x, y, 7);
                b.set(x, y, [v, 1.0 - v, v * 0.5, 1.0]);
            }
        }
        b.quantize_in_place();
        b
    }

    fn assert_edges_match(out: &PixelBuffer) {
        let (w, h) = out.dimensions();
        for y in 0..h {
            assert_eq!(out.get(0, y), out.get(w - 1, y), "row {}", y);
        }
        for x in 0..w {
            assert_eq!(out.get(x, 0), out.get(x, h - 1), "column {}", x);
        }
    }

    #[test]
    fn mirror_blend_matches_edges() {
        let src = noisy(13, 9);
        let mut out = PixelBuffer::new(13, 9).unwrap();
        let s = Sampler::new(&src, SamplerSettings::default());
        seamless_mirror(s, s, &mut out, 4, true, true, 0.5, 1.0);
        assert_edges_match(&out);
    }

    #[test]
    fn interior_outside_band_is_untouched() {
        let src = noisy(16, 16);
        let mut out = PixelBuffer::new(16, 16).unwrap();
        let s = Sampler::new(&src, SamplerSettings::default());
        seamless_mirror(s, s, &mut out, 3, true, true, 0.0, 1.0);
        assert_eq!(out.get(7, 8), src.get(7, 8));
    }

    #[test]
    fn zero_offsets_leave_perspective_identity() {
        let src = noisy(8, 8);
        let mut out = PixelBuffer::new(8, 8).unwrap();
        perspective(
            Sampler::new(&src, SamplerSettings::default()),
            &mut out,
            [[0.0; 2]; 4],
            [1.0; 4],
        );
        assert!(out.max_abs_diff(&src).unwrap() < 1e-3);
    }
}
