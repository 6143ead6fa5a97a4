// ============================================================================
// SAMPLING + SMALL VECTOR MATH shared by the CPU passes
// ============================================================================

use rayon::prelude::*;

use crate::buffer::{PixelBuffer, quantize};
use crate::passes::{FilterMode, SamplerSettings, WrapMode};

pub const LUMA: [f32; 3] = [0.299, 0.587, 0.114];

/// Read-only view of a pass input with the process-wide sampler applied.
#[derive(Clone, Copy)]
pub struct Sampler<'a> {
    buf: &'a PixelBuffer,
    settings: SamplerSettings,
    w: i32,
    h: i32,
}

impl<'a> Sampler<'a> {
    pub fn new(buf: &'a PixelBuffer, settings: SamplerSettings) -> Self {
        Self {
            buf,
            settings,
            w: buf.width() as i32,
            h: buf.height() as i32,
        }
    }

    pub fn width(&self) -> u32 {
        self.w as u32
    }

    pub fn height(&self) -> u32 {
        self.h as u32
    }

    #[inline]
    fn wrap(&self, v: i32, size: i32) -> i32 {
        match self.settings.wrap {
            WrapMode::Repeat => v.rem_euclid(size),
            WrapMode::Clamp => v.clamp(0, size - 1),
        }
    }

    /// Texel fetch with wrap addressing.
    #[inline]
    pub fn fetch(&self, x: i32, y: i32) -> [f32; 4] {
        let x = self.wrap(x, self.w);
        let y = self.wrap(y, self.h);
        self.buf.get(x as u32, y as u32)
    }

    /// Sample at normalized UV (texel centers at `(i + 0.5) / size`).
    pub fn sample_uv(&self, u: f32, v: f32, filter: FilterMode) -> [f32; 4] {
        let fx = u * self.w as f32 - 0.5;
        let fy = v * self.h as f32 - 0.5;
        match filter {
            FilterMode::Nearest => self.fetch(fx.round() as i32, fy.round() as i32),
            FilterMode::Linear => {
                let x0 = fx.floor();
                let y0 = fy.floor();
                let tx = fx - x0;
                let ty = fy - y0;
                let (x0, y0) = (x0 as i32, y0 as i32);
                let p00 = self.fetch(x0, y0);
                let p10 = self.fetch(x0 + 1, y0);
                let p01 = self.fetch(x0, y0 + 1);
                let p11 = self.fetch(x0 + 1, y0 + 1);
                let mut out = [0.0; 4];
                for c in 0..4 {
                    let top = p00[c] + (p10[c] - p00[c]) * tx;
                    let bot = p01[c] + (p11[c] - p01[c]) * tx;
                    out[c] = top + (bot - top) * ty;
                }
                out
            }
        }
    }

    #[inline]
    pub fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        self.sample_uv(u, v, self.settings.filter)
    }

    /// Read the input at output pixel `(x, y)` of an `out_w × out_h` target:
    /// a direct fetch when sizes agree, a UV resample otherwise.
    #[inline]
    pub fn at(&self, x: i32, y: i32, out_w: u32, out_h: u32) -> [f32; 4] {
        if out_w == self.w as u32 && out_h == self.h as u32 {
            self.fetch(x, y)
        } else {
            self.sample((x as f32 + 0.5) / out_w as f32, (y as f32 + 0.5) / out_h as f32)
        }
    }

    /// Same as [`Sampler::at`] but never interpolates (index images).
    #[inline]
    pub fn at_nearest(&self, x: i32, y: i32, out_w: u32, out_h: u32) -> [f32; 4] {
        if out_w == self.w as u32 && out_h == self.h as u32 {
            self.fetch(x, y)
        } else {
            let u = (x as f32 + 0.5) / out_w as f32;
            let v = (y as f32 + 0.5) / out_h as f32;
            self.fetch(
                ((u * self.w as f32) as i32).min(self.w - 1),
                ((v * self.h as f32) as i32).min(self.h - 1),
            )
        }
    }
}

/// Fill `out` in parallel rows from a per-pixel closure, then round to half
/// precision.
pub fn par_fill<F>(out: &mut PixelBuffer, f: F)
where
    F: Fn(i32, i32) -> [f32; 4] + Sync,
{
    let w = out.width() as usize;
    out.pixels_mut()
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.iter_mut().enumerate() {
                *px = f(x as i32, y as i32).map(quantize);
            }
        });
}

#[inline]
pub fn luma(c: [f32; 4]) -> f32 {
    c[0] * LUMA[0] + c[1] * LUMA[1] + c[2] * LUMA[2]
}

#[inline]
pub fn dot3(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn normalize3(v: [f32; 3]) -> [f32; 3] {
    let len = dot3(v, v).sqrt();
    if len < 1e-8 {
        return [0.0, 0.0, 1.0];
    }
    [v[0] / len, v[1] / len, v[2] / len]
}

#[inline]
pub fn decode_normal(c: [f32; 4]) -> [f32; 3] {
    [c[0] * 2.0 - 1.0, c[1] * 2.0 - 1.0, c[2] * 2.0 - 1.0]
}

#[inline]
pub fn encode_normal(n: [f32; 3]) -> [f32; 4] {
    [n[0] * 0.5 + 0.5, n[1] * 0.5 + 0.5, n[2] * 0.5 + 0.5, 1.0]
}

#[inline]
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn mix4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    [mix(a[0], b[0], t), mix(a[1], b[1], t), mix(a[2], b[2], t), mix(a[3], b[3], t)]
}

#[inline]
pub fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    if e1 <= e0 {
        return if x < e0 { 0.0 } else { 1.0 };
    }
    let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Integer hash (same constants as the GPU noise).
#[inline]
pub fn hash_u32(mut x: u32) -> u32 {
    x = x.wrapping_mul(0x9E3779B9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85EBCA6B);
    x ^= x >> 13;
    x = x.wrapping_mul(0xC2B2AE35);
    x ^= x >> 16;
    x
}

/// Hash to f32 in [0, 1).
#[inline]
pub fn hash_f32(x: u32, y: u32, seed: u32) -> f32 {
    let h = hash_u32(
        x.wrapping_mul(374761393)
            .wrapping_add(y.wrapping_mul(668265263))
            .wrapping_add(seed),
    );
    (h & 0x00FF_FFFF) as f32 / 16_777_216.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(w: u32, h: u32) -> PixelBuffer {
        let mut b = PixelBuffer::new(w, h).unwrap();
        for y in 0..h {
            for x in 0..w {
                b.set(x, y, [x as f32, y as f32, 0.0, 1.0]);
            }
        }
        b
    }

    #[test]
    fn fetch_wraps_and_clamps() {
        let b = ramp(4, 3);
        let rep = Sampler::new(&b, SamplerSettings::default());
        assert_eq!(rep.fetch(-1, 3)[0..2], [3.0, 0.0]);
        let clamp = Sampler::new(
            &b,
            SamplerSettings {
                wrap: WrapMode::Clamp,
                ..Default::default()
            },
        );
        assert_eq!(clamp.fetch(-1, 3)[0..2], [0.0, 2.0]);
    }

    #[test]
    fn linear_sample_at_texel_center_is_exact() {
        let b = ramp(8, 8);
        let s = Sampler::new(&b, SamplerSettings::default());
        assert_eq!(s.sample(2.5 / 8.0, 5.5 / 8.0), b.get(2, 5));
    }

    #[test]
    fn normals_encode_and_decode() {
        let n = normalize3([0.3, -0.2, 0.9]);
        let back = decode_normal(encode_normal(n));
        for c in 0..3 {
            assert!((back[c] - n[c]).abs() < 1e-6);
        }
    }
}
