// ============================================================================
// MATERIAL MASK — palette + index image partitioning the canvas into regions
// ============================================================================

use std::collections::HashMap;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Most distinct colors a mask may contain.
pub const MATERIAL_LIMIT: usize = 32;

/// Palette index of a material region.  `DISABLED` (-1) means no region is
/// selected; the value is also the per-pixel comparison key of `MaskSelect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialIndex(pub i32);

impl MaterialIndex {
    pub const DISABLED: MaterialIndex = MaterialIndex(-1);

    pub fn is_enabled(self) -> bool {
        self.0 >= 0
    }

    pub fn slot(self) -> Option<usize> {
        usize::try_from(self.0).ok()
    }
}

impl Default for MaterialIndex {
    fn default() -> Self {
        Self::DISABLED
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialMask {
    width: u32,
    height: u32,
    /// Distinct RGB colors in first-seen (row-major) order.
    palette: Vec<[u8; 3]>,
    /// One palette index per pixel.
    indices: Vec<u8>,
}

impl MaterialMask {
    /// Count the distinct colors of `img` and build the index image.  Alpha is
    /// ignored.
    pub fn from_image(img: &RgbaImage) -> Result<Self> {
        let mut lookup: HashMap<[u8; 3], u8> = HashMap::new();
        let mut palette = Vec::new();
        let mut indices = Vec::with_capacity(img.width() as usize * img.height() as usize);
        for px in img.pixels() {
            let rgb = [px.0[0], px.0[1], px.0[2]];
            let idx = match lookup.get(&rgb) {
                Some(&i) => i,
                None => {
                    if palette.len() == MATERIAL_LIMIT {
                        return Err(PipelineError::TooManyMaterials {
                            found: count_colors(img),
                            limit: MATERIAL_LIMIT,
                        });
                    }
                    let i = palette.len() as u8;
                    palette.push(rgb);
                    lookup.insert(rgb, i);
                    i
                }
            };
            indices.push(idx);
        }
        Ok(Self {
            width: img.width(),
            height: img.height(),
            palette,
            indices,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn palette(&self) -> &[[u8; 3]] {
        &self.palette
    }

    pub fn len(&self) -> usize {
        self.palette.len()
    }

    pub fn is_empty(&self) -> bool {
        self.palette.is_empty()
    }

    /// Unit-range color of a region, as `MaskSelect` compares it.
    pub fn color(&self, index: MaterialIndex) -> Option<[f32; 3]> {
        let rgb = self.palette.get(index.slot()?)?;
        Some(rgb.map(|c| c as f32 / 255.0))
    }

    /// Whether output pixel `(x, y)` of a `w × h` buffer lies in region
    /// `index`.  Sizes that differ from the mask map with nearest lookup.
    #[inline]
    pub fn contains(&self, index: MaterialIndex, x: u32, y: u32, w: u32, h: u32) -> bool {
        let Some(slot) = index.slot() else {
            return false;
        };
        let mx = ((x as u64 * self.width as u64) / w.max(1) as u64).min(self.width as u64 - 1);
        let my = ((y as u64 * self.height as u64) / h.max(1) as u64).min(self.height as u64 - 1);
        self.indices[(my * self.width as u64 + mx) as usize] as usize == slot
    }

    /// Nearest-resampled copy; the palette is kept as is.
    pub fn resized(&self, width: u32, height: u32) -> Self {
        let mut indices = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let mx = ((x as u64 * self.width as u64) / width as u64).min(self.width as u64 - 1);
                let my = ((y as u64 * self.height as u64) / height as u64).min(self.height as u64 - 1);
                indices.push(self.indices[(my * self.width as u64 + mx) as usize]);
            }
        }
        Self {
            width,
            height,
            palette: self.palette.clone(),
            indices,
        }
    }

    /// Index image rendered back as palette colors.
    pub fn to_image(&self) -> RgbaImage {
        let mut img = RgbaImage::new(self.width, self.height);
        for (px, &i) in img.pixels_mut().zip(&self.indices) {
            let c = self.palette[i as usize];
            *px = image::Rgba([c[0], c[1], c[2], 255]);
        }
        img
    }
}

fn count_colors(img: &RgbaImage) -> usize {
    let mut seen = std::collections::HashSet::new();
    for px in img.pixels() {
        seen.insert([px.0[0], px.0[1], px.0[2]]);
    }
    seen.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn striped(colors: u32) -> RgbaImage {
        RgbaImage::from_fn(colors, 2, |x, _| Rgba([x as u8 * 7, 255 - x as u8, 3, 255]))
    }

    #[test]
    fn palette_is_first_seen_order() {
        let mut img = RgbaImage::new(3, 1);
        img.put_pixel(0, 0, Rgba([9, 9, 9, 255]));
        img.put_pixel(1, 0, Rgba([1, 2, 3, 255]));
        img.put_pixel(2, 0, Rgba([9, 9, 9, 0]));
        let mask = MaterialMask::from_image(&img).unwrap();
        assert_eq!(mask.palette(), &[[9, 9, 9], [1, 2, 3]]);
        assert!(mask.contains(MaterialIndex(0), 2, 0, 3, 1));
        assert!(!mask.contains(MaterialIndex::DISABLED, 0, 0, 3, 1));
    }

    #[test]
    fn limit_is_inclusive() {
        assert_eq!(MaterialMask::from_image(&striped(32)).unwrap().len(), 32);
        match MaterialMask::from_image(&striped(33)) {
            Err(PipelineError::TooManyMaterials { found, limit }) => {
                assert_eq!((found, limit), (33, 32));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn resize_uses_nearest_indices() {
        let mask = MaterialMask::from_image(&striped(2)).unwrap();
        let big = mask.resized(4, 4);
        assert!(big.contains(MaterialIndex(0), 1, 3, 4, 4));
        assert!(big.contains(MaterialIndex(1), 2, 0, 4, 4));
        assert_eq!(big.palette(), mask.palette());
    }
}
