// ============================================================================
// PIXEL ADJUSTMENTS — per-pixel color operations (no neighbourhood reads)
// ============================================================================
//
// Every function reads its input through a `Sampler` so that a source of a
// different resolution is resampled onto the output grid.  Alpha is carried
// through unchanged unless stated otherwise.
// ============================================================================

use super::sampling::{Sampler, hash_f32, luma, par_fill, smoothstep};
use crate::buffer::PixelBuffer;
use crate::passes::FilterMode;

pub fn copy(src: Sampler, out: &mut PixelBuffer) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| src.at(x, y, w, h));
}

pub fn resample(src: Sampler, out: &mut PixelBuffer, filter: FilterMode) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        if filter == FilterMode::Nearest {
            src.at_nearest(x, y, w, h)
        } else if w == src.width() && h == src.height() {
            src.fetch(x, y)
        } else {
            src.sample_uv((x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32, filter)
        }
    });
}

pub fn fill(out: &mut PixelBuffer, color: [f32; 4]) {
    par_fill(out, |_, _| color);
}

pub fn grayscale(src: Sampler, out: &mut PixelBuffer, weights: [f32; 3]) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let c = src.at(x, y, w, h);
        let g = c[0] * weights[0] + c[1] * weights[1] + c[2] * weights[2];
        [g, g, g, c[3]]
    });
}

/// Project each color onto the segment `min_color → max_color`, so that the
/// picked shadow color maps to 0 and the picked highlight color maps to 1.
pub fn grayscale_anchored(src: Sampler, out: &mut PixelBuffer, min_color: [f32; 3], max_color: [f32; 3]) {
    let (w, h) = out.dimensions();
    let d = [
        max_color[0] - min_color[0],
        max_color[1] - min_color[1],
        max_color[2] - min_color[2],
    ];
    let len2 = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
    par_fill(out, |x, y| {
        let c = src.at(x, y, w, h);
        let g = if len2 < 1e-8 {
            luma(c)
        } else {
            (((c[0] - min_color[0]) * d[0] + (c[1] - min_color[1]) * d[1] + (c[2] - min_color[2]) * d[2])
                / len2)
                .clamp(0.0, 1.0)
        };
        [g, g, g, c[3]]
    });
}

pub fn invert_components(src: Sampler, out: &mut PixelBuffer, components: [bool; 3]) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let mut c = src.at(x, y, w, h);
        for i in 0..3 {
            if components[i] {
                c[i] = 1.0 - c[i];
            }
        }
        c
    });
}

pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let mut h = 0.0;
    if delta > 1e-6 {
        h = if max == r {
            ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };
        h /= 6.0;
    }
    let s = if max > 1e-6 { delta / max } else { 0.0 };
    (h, s, max)
}

pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let h6 = h.rem_euclid(1.0) * 6.0;
    let i = h6.floor();
    let f = h6 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match i as i32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

pub fn hue_shift(src: Sampler, out: &mut PixelBuffer, shift: f32) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let c = src.at(x, y, w, h);
        let (hh, s, v) = rgb_to_hsv(c[0], c[1], c[2]);
        let (r, g, b) = hsv_to_rgb(hh + shift, s, v);
        [r, g, b, c[3]]
    });
}

pub fn enhance(src: Sampler, out: &mut PixelBuffer, contrast: f32, brightness: f32) {
    let (w, h) = out.dimensions();
    let k = 1.0 + contrast;
    par_fill(out, |x, y| {
        let c = src.at(x, y, w, h);
        let f = |v: f32| ((v - 0.5) * k + 0.5 + brightness).clamp(0.0, 1.0);
        [f(c[0]), f(c[1]), f(c[2]), c[3]]
    });
}

pub fn levels(src: Sampler, out: &mut PixelBuffer, min: f32, max: f32) {
    let (w, h) = out.dimensions();
    let range = (max - min).max(1e-4);
    par_fill(out, |x, y| {
        let c = src.at(x, y, w, h);
        let f = |v: f32| ((v - min) / range).clamp(0.0, 1.0);
        [f(c[0]), f(c[1]), f(c[2]), c[3]]
    });
}

/// Normalization remap.  The caller guarantees a non-degenerate range.
pub fn remap(src: Sampler, out: &mut PixelBuffer, min: [f32; 3], max: [f32; 3]) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let c = src.at(x, y, w, h);
        let mut o = c;
        for i in 0..3 {
            o[i] = (c[i] - min[i]) / (max[i] - min[i]);
        }
        o
    });
}

/// Grey noise: the same offset is added to R, G and B.
pub fn noise(src: Sampler, out: &mut PixelBuffer, level: f32, seed: u32) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let c = src.at(x, y, w, h);
        let n = (hash_f32(x as u32, y as u32, seed) - 0.5) * level;
        [c[0] + n, c[1] + n, c[2] + n, c[3]]
    });
}

pub fn color_remap(src: Sampler, out: &mut PixelBuffer, color: [f32; 3], softness: f32, invert: bool) {
    let (w, h) = out.dimensions();
    let soft = softness.max(1e-4);
    par_fill(out, |x, y| {
        let c = src.at(x, y, w, h);
        let d = ((c[0] - color[0]).powi(2) + (c[1] - color[1]).powi(2) + (c[2] - color[2]).powi(2)).sqrt()
            / 3f32.sqrt();
        let mut t = 1.0 - smoothstep(0.0, soft, d);
        if invert {
            t = 1.0 - t;
        }
        [t, t, t, c[3]]
    });
}
