// ============================================================================
// HEIGHT ↔ NORMAL — multi-scale relaxation, differencing, occlusion
// ============================================================================

use super::frame::Frame;
use super::material::{MaterialIndex, MaterialMask};
use super::normalize::{NormalizeRange, compute_range};
use crate::config::{HeightConversion, NormalConversion, OcclusionConfig};
use crate::error::Result;
use crate::passes::{Pass, PassBackend};

/// Coarsest relaxation scale is `2^(SCALES - 1)`.
pub const SCALES: usize = 6;

/// Reconstruct a height field from `normal`.
///
/// Seeds with a grey reduction of the normal map, relaxes from the coarsest
/// scale down to single pixels, normalizes (restricted to `region` when
/// given), then adds grey noise.  Returns the height buffer and the range the
/// normalization used.
pub fn normal_to_height<B: PassBackend>(
    frame: &mut Frame<'_, B>,
    normal: &B::Target,
    cfg: &HeightConversion,
    region: Option<(&MaterialMask, MaterialIndex)>,
) -> Result<(B::Target, NormalizeRange)> {
    let (w, h) = frame.size(normal);
    let mut height = frame.run_new(&Pass::Grayscale { weights: [0.5, 0.5, 0.0] }, &[normal], w, h)?;
    match relax_and_normalize(frame, &mut height, normal, cfg, region) {
        Ok(range) => Ok((height, range)),
        Err(e) => {
            frame.release(height);
            Err(e)
        }
    }
}

fn relax_and_normalize<B: PassBackend>(
    frame: &mut Frame<'_, B>,
    height: &mut B::Target,
    normal: &B::Target,
    cfg: &HeightConversion,
    region: Option<(&MaterialMask, MaterialIndex)>,
) -> Result<NormalizeRange> {
    for k in (0..SCALES).rev() {
        let step = Pass::HeightFromNormalStep { scale: 1 << k };
        for _ in 0..cfg.iterations[k] {
            frame.apply(height, &step, &[normal])?;
        }
    }

    let range = normalize(frame, height, region)?;

    if cfg.noise_level != 0.0 {
        let noise = Pass::Noise {
            level: cfg.noise_level,
            seed: cfg.noise_seed,
        };
        frame.apply(height, &noise, &[])?;
    }
    Ok(range)
}

/// Read the buffer back, find its range and remap it onto [0, 1].  The only
/// blocking step of the pipeline.
pub fn normalize<B: PassBackend>(
    frame: &mut Frame<'_, B>,
    work: &mut B::Target,
    region: Option<(&MaterialMask, MaterialIndex)>,
) -> Result<NormalizeRange> {
    let pending = frame.backend.begin_readback(work)?;
    let pixels = frame.backend.finish_readback(pending)?;
    let range = compute_range(&pixels, region);
    if !range.is_identity() {
        frame.apply(
            work,
            &Pass::Remap {
                min: range.min,
                max: range.max,
            },
            &[],
        )?;
    }
    crate::log_debug!("Normalize range min={:?} max={:?}", range.min, range.max);
    Ok(range)
}

pub fn height_to_normal<B: PassBackend>(
    frame: &mut Frame<'_, B>,
    height: &B::Target,
    cfg: &NormalConversion,
) -> Result<B::Target> {
    let (w, h) = frame.size(height);
    frame.run_new(&Pass::NormalFromHeight { depth: cfg.depth }, &[height], w, h)
}

pub fn occlusion_pass(cfg: &OcclusionConfig) -> Pass {
    Pass::Occlusion {
        samples: cfg.samples,
        radius: cfg.radius,
        depth: cfg.depth,
        bias: cfg.bias,
        intensity: cfg.intensity,
    }
}

/// Occlusion at the height buffer's resolution.
pub fn occlusion<B: PassBackend>(
    frame: &mut Frame<'_, B>,
    height: &B::Target,
    normal: &B::Target,
    cfg: &OcclusionConfig,
) -> Result<B::Target> {
    let (w, h) = frame.size(height);
    frame.run_new(&occlusion_pass(cfg), &[height, normal], w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelBuffer;
    use crate::ops::CpuBackend;
    use crate::pipeline::pool::ScratchPool;

    #[test]
    fn flat_normal_reconstructs_flat_height() {
        let mut backend = CpuBackend::new();
        let mut pool = ScratchPool::new();
        let mut frame = Frame::new(&mut backend, &mut pool);
        let normal = PixelBuffer::filled(16, 8, [0.5, 0.5, 1.0, 1.0]).unwrap();
        for iterations in [[0; 6], [3; 6], [1, 0, 7, 0, 2, 9]] {
            let cfg = HeightConversion {
                iterations,
                noise_level: 0.0,
                ..Default::default()
            };
            let (height, range) = normal_to_height(&mut frame, &normal, &cfg, None).unwrap();
            assert!(range.is_identity());
            let first = height.get(0, 0);
            assert!(height.pixels().iter().all(|p| *p == first));
            assert_eq!(first[0], 0.5);
        }
    }

    #[test]
    fn normalize_spreads_to_unit_range() {
        let mut backend = CpuBackend::new();
        let mut pool = ScratchPool::new();
        let mut frame = Frame::new(&mut backend, &mut pool);
        let mut work = PixelBuffer::new(4, 1).unwrap();
        for x in 0..4 {
            let v = 0.25 + 0.125 * x as f32;
            work.set(x, 0, [v, v, v, 1.0]);
        }
        let range = normalize(&mut frame, &mut work, None).unwrap();
        assert_eq!(range.min[0], 0.25);
        assert_eq!(work.get(0, 0)[0], 0.0);
        assert_eq!(work.get(3, 0)[0], 1.0);
    }
}
