// ============================================================================
// COMPOSITING — grunge overlay and material-region selection
// ============================================================================

use super::sampling::{Sampler, par_fill};
use crate::buffer::PixelBuffer;

#[inline]
fn overlay(base: f32, top: f32) -> f32 {
    if base < 0.5 {
        2.0 * base * top
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - top)
    }
}

pub fn overlay_blend(base: Sampler, grunge: Sampler, out: &mut PixelBuffer, weight: f32) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let b = base.at(x, y, w, h);
        let g = grunge.at(x, y, w, h);
        let mut o = b;
        for c in 0..3 {
            o[c] = b[c] + (overlay(b[c], g[c]) - b[c]) * weight;
        }
        o
    });
}

/// Half an 8-bit step: mask colors arrive as 8-bit values.
const MASK_TOLERANCE: f32 = 0.5 / 255.0;

/// Keep `processed` where the mask pixel equals `color`, `original`
/// elsewhere.  The mask is always read without interpolation.
pub fn mask_select(processed: Sampler, original: Sampler, mask: Sampler, out: &mut PixelBuffer, color: [f32; 3]) {
    let (w, h) = out.dimensions();
    par_fill(out, |x, y| {
        let m = mask.at_nearest(x, y, w, h);
        let inside = (0..3).all(|c| (m[c] - color[c]).abs() <= MASK_TOLERANCE);
        if inside {
            processed.at(x, y, w, h)
        } else {
            original.at(x, y, w, h)
        }
    });
}
