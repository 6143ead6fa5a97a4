// ============================================================================
// PIXEL BUFFER — CPU-side RGBA float image with half-float storage semantics
// ============================================================================

use half::f16;
use image::RgbaImage;

use crate::error::{PipelineError, Result};

/// Round a value through 16-bit float, the storage precision of every render
/// target.
#[inline]
pub fn quantize(v: f32) -> f32 {
    f16::from_f32(v).to_f32()
}

/// Row-major RGBA image with `f32` components.
///
/// Values are not clamped: heights produced by the relaxation passes can leave
/// the unit range until they are normalized.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<[f32; 4]>,
}

impl PixelBuffer {
    /// Allocate a zeroed buffer.  Fails instead of aborting when the allocation
    /// cannot be satisfied.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        Self::filled(width, height, [0.0; 4])
    }

    pub fn filled(width: u32, height: u32, color: [f32; 4]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::Allocation {
                width,
                height,
                reason: "zero-sized buffer".to_string(),
            });
        }
        let len = width as usize * height as usize;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| PipelineError::Allocation {
            width,
            height,
            reason: e.to_string(),
        })?;
        let color = color.map(quantize);
        data.resize(len, color);
        Ok(Self { width, height, data })
    }

    /// Decode 8-bit RGBA into unit-range floats.
    pub fn from_rgba8(img: &RgbaImage) -> Result<Self> {
        let mut buf = Self::new(img.width(), img.height())?;
        for (dst, src) in buf.data.iter_mut().zip(img.pixels()) {
            *dst = src.0.map(|c| quantize(c as f32 / 255.0));
        }
        Ok(buf)
    }

    /// Encode back to 8-bit RGBA (clamped, rounded).
    pub fn to_rgba8(&self) -> RgbaImage {
        let mut raw = Vec::with_capacity(self.data.len() * 4);
        for px in &self.data {
            for c in px {
                raw.push((c.clamp(0.0, 1.0) * 255.0).round() as u8);
            }
        }
        // Length is width * height * 4 by construction.
        RgbaImage::from_raw(self.width, self.height, raw)
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [[f32; 4]] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, px: [f32; 4]) {
        let w = self.width as usize;
        self.data[y as usize * w + x as usize] = px;
    }

    /// Round every component to half precision in place.
    pub fn quantize_in_place(&mut self) {
        for px in &mut self.data {
            *px = px.map(quantize);
        }
    }

    /// Largest absolute per-component difference against another buffer of the
    /// same size.  `None` when the sizes differ.
    pub fn max_abs_diff(&self, other: &PixelBuffer) -> Option<f32> {
        if self.dimensions() != other.dimensions() {
            return None;
        }
        let mut worst = 0.0f32;
        for (a, b) in self.data.iter().zip(&other.data) {
            for c in 0..4 {
                worst = worst.max((a[c] - b[c]).abs());
            }
        }
        Some(worst)
    }

    /// Half-float texel bytes in the layout `Rgba16Float` expects.
    pub fn to_f16_texels(&self) -> Vec<f16> {
        self.data
            .iter()
            .flat_map(|px| px.map(f16::from_f32))
            .collect()
    }

    pub fn from_f16_texels(width: u32, height: u32, texels: &[f16]) -> Result<Self> {
        let mut buf = Self::new(width, height)?;
        if texels.len() < buf.data.len() * 4 {
            return Err(PipelineError::Readback(format!(
                "expected {} texels, got {}",
                buf.data.len() * 4,
                texels.len() / 4
            )));
        }
        for (dst, src) in buf.data.iter_mut().zip(texels.chunks_exact(4)) {
            *dst = [src[0].to_f32(), src[1].to_f32(), src[2].to_f32(), src[3].to_f32()];
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn rgba8_survives_half_storage() {
        let mut img = RgbaImage::new(16, 16);
        for (i, px) in img.pixels_mut().enumerate() {
            let v = (i % 256) as u8;
            *px = Rgba([v, 255 - v, v / 2, 255]);
        }
        let buf = PixelBuffer::from_rgba8(&img).unwrap();
        assert_eq!(buf.to_rgba8(), img);
    }

    #[test]
    fn zero_sized_allocation_is_rejected() {
        assert!(matches!(
            PixelBuffer::new(0, 4),
            Err(PipelineError::Allocation { .. })
        ));
    }

    #[test]
    fn out_of_range_values_are_kept() {
        let buf = PixelBuffer::filled(2, 2, [3.5, -1.25, 0.5, 1.0]).unwrap();
        assert_eq!(buf.get(1, 1), [3.5, -1.25, 0.5, 1.0]);
    }
}
