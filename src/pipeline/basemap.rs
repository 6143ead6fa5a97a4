// ============================================================================
// BASE-MAP DECOMPOSITION — color image → normal map over four octaves
// ============================================================================

use super::frame::Frame;
use crate::config::{BaseMapConfig, BaseMapLevel};
use crate::error::Result;
use crate::ops::sampling::LUMA;
use crate::ops::surface::deg;
use crate::passes::{NormalCombine, Pass, PassBackend};

fn grey_pass(cfg: &BaseMapConfig) -> Pass {
    match (cfg.min_color, cfg.max_color) {
        (Some(min_color), Some(max_color)) => Pass::GrayscaleAnchored { min_color, max_color },
        _ => Pass::Grayscale { weights: LUMA },
    }
}

/// Normal estimate of one octave, at the resolution of `color`.
pub fn octave<B: PassBackend>(
    frame: &mut Frame<'_, B>,
    color: &B::Target,
    level: &BaseMapLevel,
    grey: &Pass,
) -> Result<B::Target> {
    let (w, h) = frame.size(color);
    let mut raw = frame.run_new(grey, &[color], w, h)?;
    frame.apply(&mut raw, &Pass::SobelToNormal { amplitude: level.amplitude }, &[])?;
    frame.apply(&mut raw, &Pass::InvertComponents { components: [true, true, false] }, &[])?;

    let mut cur = frame.copy_of(&raw)?;
    let expanded = expand(frame, &mut cur, &raw, color, level);
    frame.release(raw);
    match expanded {
        Ok(()) => Ok(cur),
        Err(e) => {
            frame.release(cur);
            Err(e)
        }
    }
}

fn expand<B: PassBackend>(
    frame: &mut Frame<'_, B>,
    cur: &mut B::Target,
    raw: &B::Target,
    color: &B::Target,
    level: &BaseMapLevel,
) -> Result<()> {
    frame.blur(cur, level.pre_smooth_radius)?;
    let replace = Pass::NormalExpansion {
        combine: NormalCombine::Replace { radius: level.filter_radius },
    };
    for _ in 0..level.iterations {
        frame.apply(cur, &replace, &[])?;
    }
    let mix = Pass::NormalExpansion {
        combine: NormalCombine::WeightedMix {
            edge_mix: level.edge_mix,
            blending: level.blending,
            flatness: level.flatness,
        },
    };
    frame.apply(cur, &mix, &[raw, color])
}

/// Full decomposition: four octaves (each on a color image halved once more),
/// upsampled, combined by weight, then angle-corrected.
pub fn decompose<B: PassBackend>(
    frame: &mut Frame<'_, B>,
    color: &B::Target,
    cfg: &BaseMapConfig,
) -> Result<B::Target> {
    let (w, h) = frame.size(color);
    let grey = grey_pass(cfg);
    let mut colors: Vec<B::Target> = Vec::with_capacity(3);
    let mut octaves: Vec<B::Target> = Vec::with_capacity(4);

    let result = (|| -> Result<B::Target> {
        for (i, level) in cfg.levels.iter().enumerate() {
            if i > 0 {
                let prev = colors.last().unwrap_or(color);
                let (pw, ph) = frame.size(prev);
                let half = frame.run_new(&Pass::Downsample, &[prev], (pw / 2).max(1), (ph / 2).max(1))?;
                colors.push(half);
            }
            let src = colors.last().unwrap_or(color);
            let est = octave(frame, src, level, &grey)?;
            let (ew, eh) = frame.size(&est);
            if (ew, eh) == (w, h) {
                octaves.push(est);
            } else {
                let up = frame.run_new(&Pass::Copy, &[&est], w, h);
                frame.release(est);
                octaves.push(up?);
            }
        }
        let refs: Vec<&B::Target> = octaves.iter().collect();
        let mut mixed = frame.run_new(&Pass::MixNormalLevels { weights: cfg.weights() }, &refs, w, h)?;
        if cfg.corrects_angle() {
            let pass = Pass::AngleCorrection {
                angle: deg(cfg.angle),
                correction: cfg.angle_correction,
            };
            if let Err(e) = frame.apply(&mut mixed, &pass, &[]) {
                frame.release(mixed);
                return Err(e);
            }
        }
        Ok(mixed)
    })();

    frame.release_all(octaves);
    frame.release_all(colors);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelBuffer;
    use crate::ops::CpuBackend;
    use crate::ops::sampling::hash_f32;
    use crate::pipeline::pool::ScratchPool;

    fn textured(w: u32, h: u32) -> PixelBuffer {
        let mut b = PixelBuffer::new(w, h).unwrap();
        for y in 0..h {
            for x in 0..w {
                let v = 0.3 + 0.4 * hash_f32(x / 2, y / 2, 11);
                b.set(x, y, [v, v * 0.8, v * 0.6, 1.0]);
            }
        }
        b.quantize_in_place();
        b
    }

    #[test]
    fn single_weight_selects_one_octave() {
        let mut backend = CpuBackend::new();
        let mut pool = ScratchPool::new();
        let mut frame = Frame::new(&mut backend, &mut pool);
        let color = textured(16, 16);
        let mut cfg = BaseMapConfig::default();
        for l in cfg.levels.iter_mut() {
            l.weight = 0.0;
        }
        cfg.levels[0].weight = 1.0;

        let combined = decompose(&mut frame, &color, &cfg).unwrap();
        let alone = octave(&mut frame, &color, &cfg.levels[0], &grey_pass(&cfg)).unwrap();
        assert!(combined.max_abs_diff(&alone).unwrap() < 2e-3);
    }

    #[test]
    fn flat_color_gives_flat_normal() {
        let mut backend = CpuBackend::new();
        let mut pool = ScratchPool::new();
        let mut frame = Frame::new(&mut backend, &mut pool);
        let color = PixelBuffer::filled(8, 8, [0.5, 0.5, 0.5, 1.0]).unwrap();
        let out = decompose(&mut frame, &color, &BaseMapConfig::default()).unwrap();
        for px in out.pixels() {
            assert_eq!(*px, [0.5, 0.5, 1.0, 1.0]);
        }
    }

    #[test]
    fn all_zero_weights_are_flat() {
        let mut backend = CpuBackend::new();
        let mut pool = ScratchPool::new();
        let mut frame = Frame::new(&mut backend, &mut pool);
        let mut cfg = BaseMapConfig::default();
        for l in cfg.levels.iter_mut() {
            l.weight = 0.0;
        }
        let out = decompose(&mut frame, &textured(8, 8), &cfg).unwrap();
        assert_eq!(out.get(3, 5), [0.5, 0.5, 1.0, 1.0]);
    }
}
