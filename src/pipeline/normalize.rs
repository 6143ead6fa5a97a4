// ============================================================================
// NORMALIZE — CPU-side min/max statistics feeding the Remap pass
// ============================================================================

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::material::{MaterialIndex, MaterialMask};
use crate::buffer::PixelBuffer;

/// Below this a component range is treated as degenerate.
pub const MIN_RANGE: f32 = 1e-4;

/// Per-component range handed to `Pass::Remap`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeRange {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Default for NormalizeRange {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl NormalizeRange {
    pub const IDENTITY: NormalizeRange = NormalizeRange {
        min: [0.0; 3],
        max: [1.0; 3],
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Min/max of R, G, B, restricted to `region` of `mask` when both are given.
///
/// A component whose range is degenerate (or that saw no pixels) gets the unit
/// range, so the remap leaves it unchanged.
pub fn compute_range(buf: &PixelBuffer, region: Option<(&MaterialMask, MaterialIndex)>) -> NormalizeRange {
    let (w, h) = buf.dimensions();
    let region = region.filter(|(_, idx)| idx.is_enabled());
    let empty = ([f32::INFINITY; 3], [f32::NEG_INFINITY; 3]);
    let (lo, hi) = buf
        .pixels()
        .par_chunks(w as usize)
        .enumerate()
        .map(|(y, row)| {
            let mut acc = empty;
            for (x, px) in row.iter().enumerate() {
                if let Some((mask, idx)) = region
                    && !mask.contains(idx, x as u32, y as u32, w, h)
                {
                    continue;
                }
                for c in 0..3 {
                    acc.0[c] = acc.0[c].min(px[c]);
                    acc.1[c] = acc.1[c].max(px[c]);
                }
            }
            acc
        })
        .reduce(
            || empty,
            |a, b| {
                let mut out = a;
                for c in 0..3 {
                    out.0[c] = a.0[c].min(b.0[c]);
                    out.1[c] = a.1[c].max(b.1[c]);
                }
                out
            },
        );

    let mut range = NormalizeRange::IDENTITY;
    for c in 0..3 {
        if hi[c] - lo[c] >= MIN_RANGE {
            range.min[c] = lo[c];
            range.max[c] = hi[c];
        }
    }
    range
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn uniform_buffer_gets_identity() {
        let buf = PixelBuffer::filled(5, 5, [0.3, 0.3, 0.7, 1.0]).unwrap();
        assert!(compute_range(&buf, None).is_identity());
    }

    #[test]
    fn components_are_independent() {
        let mut buf = PixelBuffer::new(2, 1).unwrap();
        buf.set(0, 0, [0.5, 0.2, 0.0, 1.0]);
        buf.set(1, 0, [0.5, 0.8, 0.0, 1.0]);
        let r = compute_range(&buf, None);
        assert_eq!((r.min[0], r.max[0]), (0.0, 1.0));
        assert_eq!((r.min[1], r.max[1]), (0.2, 0.8));
    }

    #[test]
    fn region_restricts_statistics() {
        let mut buf = PixelBuffer::filled(2, 1, [0.1, 0.1, 0.1, 1.0]).unwrap();
        buf.set(1, 0, [0.9, 0.9, 0.9, 1.0]);
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        let mask = MaterialMask::from_image(&img).unwrap();
        // Only one pixel in region 1: degenerate, identity.
        assert!(compute_range(&buf, Some((&mask, MaterialIndex(1)))).is_identity());
        let all = compute_range(&buf, Some((&mask, MaterialIndex::DISABLED)));
        assert_eq!(all.max[0], 0.9);
    }
}
