// ============================================================================
// IMAGE FILTERS — Gaussian blur, detail/shading filters, downsampling
// ============================================================================

use super::sampling::{Sampler, luma, par_fill};
use crate::buffer::PixelBuffer;
use crate::passes::Axis;

/// Build a 1-D Gaussian kernel over `[-radius, radius]`, normalized to 1.
pub fn build_gaussian_kernel(radius: u32, sigma: f32) -> Vec<f32> {
    if radius == 0 || sigma <= 0.0 {
        return vec![1.0];
    }
    let r = radius as i32;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (-r..=r).map(|i| (-((i * i) as f32) / s2).exp()).collect();
    let sum: f32 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// One axis of the separable blur.  Radius 0 is an identity copy.
pub fn gaussian_blur(src: Sampler, out: &mut PixelBuffer, radius: u32, sigma: f32, axis: Axis) {
    let (w, h) = out.dimensions();
    let kernel = build_gaussian_kernel(radius, sigma);
    let r = (kernel.len() / 2) as i32;
    let (ax, ay) = match axis {
        Axis::Horizontal => (1, 0),
        Axis::Vertical => (0, 1),
    };
    par_fill(out, |x, y| {
        if r == 0 {
            return src.at(x, y, w, h);
        }
        let mut acc = [0.0f32; 4];
        for (i, k) in kernel.iter().enumerate() {
            let o = i as i32 - r;
            let p = src.at(x + o * ax, y + o * ay, w, h);
            for c in 0..4 {
                acc[c] += p[c] * k;
            }
        }
        acc
    });
}

/// Flatten baked lighting: scale each pixel so its blurred luminance sits at
/// mid-grey, blended by `strength`.
pub fn remove_shading(src: Sampler, blurred: Sampler, out: &mut PixelBuffer, strength: f32) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let c = src.at(x, y, w, h);
        let lb = luma(blurred.at(x, y, w, h)).max(1e-3);
        let k = 0.5 / lb;
        let mut o = c;
        for i in 0..3 {
            o[i] = (c[i] + (c[i] * k - c[i]) * strength).clamp(0.0, 1.0);
        }
        o
    });
}

/// Band-pass boost: fine detail is `c - blur_small`, medium detail is
/// `blur_small - blur_medium`.
pub fn detail_boost(src: Sampler, small_blur: Sampler, medium_blur: Sampler, out: &mut PixelBuffer, small: f32, medium: f32) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let c = src.at(x, y, w, h);
        let bs = small_blur.at(x, y, w, h);
        let bm = medium_blur.at(x, y, w, h);
        let mut o = c;
        for i in 0..3 {
            o[i] = (c[i] + small * (c[i] - bs[i]) + medium * (bs[i] - bm[i])).clamp(0.0, 1.0);
        }
        o
    });
}

pub fn sharpen(src: Sampler, blurred: Sampler, out: &mut PixelBuffer, amount: f32) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let c = src.at(x, y, w, h);
        let b = blurred.at(x, y, w, h);
        let mut o = c;
        for i in 0..3 {
            o[i] = (c[i] + amount * (c[i] - b[i])).clamp(0.0, 1.0);
        }
        o
    });
}

/// Average 2×2 blocks.  The output is expected to be `max(1, size / 2)`;
/// reads past the last row/column clamp to it.
pub fn downsample(src: Sampler, out: &mut PixelBuffer) {
    let sw = src.width() as i32;
    let sh = src.height() as i32;
    par_fill(out, |x, y| {
        let x0 = (2 * x).min(sw - 1);
        let y0 = (2 * y).min(sh - 1);
        let x1 = (2 * x + 1).min(sw - 1);
        let y1 = (2 * y + 1).min(sh - 1);
        let p = [src.fetch(x0, y0), src.fetch(x1, y0), src.fetch(x0, y1), src.fetch(x1, y1)];
        let mut o = [0.0f32; 4];
        for c in 0..4 {
            o[c] = (p[0][c] + p[1][c] + p[2][c] + p[3][c]) * 0.25;
        }
        o
    });
}

/// Roughness from local deviation against a blurred copy: flat areas go
/// smooth, busy areas go rough.
pub fn roughness_noise(src: Sampler, blurred: Sampler, out: &mut PixelBuffer, depth: f32, threshold: f32, amount: f32) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let c = src.at(x, y, w, h);
        let b = blurred.at(x, y, w, h);
        let dev = ((c[0] - b[0]).abs() * 0.299 + (c[1] - b[1]).abs() * 0.587 + (c[2] - b[2]).abs() * 0.114) * depth;
        let v = (dev - threshold).clamp(0.0, 1.0);
        [
            c[0] + (v - c[0]) * amount,
            c[1] + (v - c[1]) * amount,
            c[2] + (v - c[2]) * amount,
            c[3],
        ]
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::SamplerSettings;

    #[test]
    fn kernel_is_normalized() {
        let k = build_gaussian_kernel(5, 2.0);
        assert_eq!(k.len(), 11);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(k[5] > k[4] && k[4] > k[3]);
    }

    #[test]
    fn zero_radius_blur_is_identity() {
        let mut src = PixelBuffer::new(5, 3).unwrap();
        for y in 0..3 {
            for x in 0..5 {
                src.set(x, y, [x as f32 * 0.1, y as f32 * 0.2, 0.5, 1.0]);
            }
        }
        src.quantize_in_place();
        let mut out = PixelBuffer::new(5, 3).unwrap();
        gaussian_blur(Sampler::new(&src, SamplerSettings::default()), &mut out, 0, 1.0, Axis::Vertical);
        assert_eq!(out, src);
    }

    #[test]
    fn blur_preserves_constant_image() {
        let src = PixelBuffer::filled(8, 8, [0.25, 0.5, 0.75, 1.0]).unwrap();
        let mut out = PixelBuffer::new(8, 8).unwrap();
        gaussian_blur(Sampler::new(&src, SamplerSettings::default()), &mut out, 3, 1.5, Axis::Horizontal);
        assert!(out.max_abs_diff(&src).unwrap() < 1e-3);
    }

    #[test]
    fn downsample_averages_blocks() {
        let mut src = PixelBuffer::new(4, 2).unwrap();
        src.set(0, 0, [1.0, 0.0, 0.0, 1.0]);
        let mut out = PixelBuffer::new(2, 1).unwrap();
        downsample(Sampler::new(&src, SamplerSettings::default()), &mut out);
        assert_eq!(out.get(0, 0)[0], 0.25);
        assert_eq!(out.get(1, 0)[0], 0.0);
    }
}
