// ============================================================================
// STANDARD CHAIN — per-channel enhancement passes and channel tails
// ============================================================================

use super::frame::Frame;
use crate::channel::TextureChannel;
use crate::config::{BasicAdjustments, NormalMixerConfig, SurfaceFilter};
use crate::error::Result;
use crate::ops::sampling::LUMA;
use crate::ops::surface::deg;
use crate::passes::{Pass, PassBackend};

/// Radii of the small/medium detail bands.
const SMALL_DETAIL_RADIUS: u32 = 1;
const MEDIUM_DETAIL_RADIUS: u32 = 4;
const SHARPEN_RADIUS: u32 = 1;

/// invert → hue → grayscale → enhance → shading removal → detail boost →
/// sharpen/blur → levels.  Neutral values skip their pass; levels never run
/// on normal channels.
pub fn standard_chain<B: PassBackend>(
    frame: &mut Frame<'_, B>,
    work: &mut B::Target,
    adj: &BasicAdjustments,
    ch: TextureChannel,
) -> Result<()> {
    if adj.invert.iter().any(|&b| b) {
        frame.apply(work, &Pass::InvertComponents { components: adj.invert }, &[])?;
    }
    if adj.hue_shift != 0.0 {
        frame.apply(work, &Pass::HueShift { shift: adj.hue_shift }, &[])?;
    }
    if adj.grayscale {
        frame.apply(work, &Pass::Grayscale { weights: LUMA }, &[])?;
    }
    if adj.enhances() {
        let pass = Pass::Enhance {
            contrast: adj.contrast,
            brightness: adj.brightness,
        };
        frame.apply(work, &pass, &[])?;
    }
    if adj.shading_removal != 0.0 {
        let blurred = frame.blurred_copy(work, adj.shading_radius)?;
        let r = frame.apply(work, &Pass::RemoveShading { strength: adj.shading_removal }, &[&blurred]);
        frame.release(blurred);
        r?;
    }
    if adj.small_detail != 0.0 || adj.medium_detail != 0.0 {
        detail_boost(frame, work, adj.small_detail, adj.medium_detail)?;
    }
    match adj.sharpen_blur {
        0 => {}
        v if v > 0 => {
            let blurred = frame.blurred_copy(work, SHARPEN_RADIUS)?;
            let r = frame.apply(work, &Pass::Sharpen { amount: v as f32 * 0.5 }, &[&blurred]);
            frame.release(blurred);
            r?;
        }
        v => frame.blur(work, v.unsigned_abs())?,
    }
    if !ch.is_normal_typed() && adj.has_levels() {
        let pass = Pass::Levels {
            min: adj.levels_min,
            max: adj.levels_max,
        };
        frame.apply(work, &pass, &[])?;
    }
    Ok(())
}

fn detail_boost<B: PassBackend>(frame: &mut Frame<'_, B>, work: &mut B::Target, small: f32, medium: f32) -> Result<()> {
    let small_blur = frame.blurred_copy(work, SMALL_DETAIL_RADIUS)?;
    let medium_blur = match frame.blurred_copy(work, MEDIUM_DETAIL_RADIUS) {
        Ok(b) => b,
        Err(e) => {
            frame.release(small_blur);
            return Err(e);
        }
    };
    let r = frame.apply(work, &Pass::DetailBoost { small, medium }, &[&small_blur, &medium_blur]);
    frame.release_all([small_blur, medium_blur]);
    r
}

/// Roughness/Metallic tail.
pub fn surface_filter<B: PassBackend>(
    frame: &mut Frame<'_, B>,
    work: &mut B::Target,
    filter: &SurfaceFilter,
) -> Result<()> {
    match *filter {
        SurfaceFilter::None => Ok(()),
        SurfaceFilter::Noise {
            radius,
            depth,
            threshold,
            amount,
        } => {
            let blurred = frame.blurred_copy(work, radius.max(1))?;
            let pass = Pass::RoughnessNoise {
                depth,
                threshold,
                amount,
            };
            let r = frame.apply(work, &pass, &[&blurred]);
            frame.release(blurred);
            r
        }
        SurfaceFilter::ColorRemap {
            color,
            softness,
            invert,
        } => frame.apply(
            work,
            &Pass::ColorRemap {
                color,
                softness,
                invert,
            },
            &[],
        ),
    }
}

/// Normal tail: step, then the optional secondary normal image.
pub fn normal_tail<B: PassBackend>(
    frame: &mut Frame<'_, B>,
    work: &mut B::Target,
    step: f32,
    mixer_cfg: &NormalMixerConfig,
    mixer: Option<&B::Target>,
) -> Result<()> {
    frame.apply(work, &Pass::NormalStep { step }, &[])?;
    if mixer_cfg.enabled
        && let Some(m) = mixer
    {
        let pass = Pass::NormalMixer {
            weight: mixer_cfg.weight,
            angle: deg(mixer_cfg.angle),
            scale: mixer_cfg.scale,
        };
        frame.apply(work, &pass, &[m])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelBuffer;
    use crate::ops::CpuBackend;
    use crate::pipeline::pool::ScratchPool;

    #[test]
    fn neutral_adjustments_run_nothing() {
        let mut backend = CpuBackend::new();
        let mut pool = ScratchPool::new();
        let mut frame = Frame::new(&mut backend, &mut pool);
        let mut work = PixelBuffer::filled(4, 4, [0.1, 0.6, 0.3, 1.0]).unwrap();
        let before = work.clone();
        standard_chain(&mut frame, &mut work, &BasicAdjustments::default(), TextureChannel::Diffuse).unwrap();
        assert_eq!(work, before);
        drop(frame);
        assert_eq!(pool.pooled_count(), 0);
    }

    #[test]
    fn levels_skip_normal_channels() {
        let mut backend = CpuBackend::new();
        let mut pool = ScratchPool::new();
        let mut frame = Frame::new(&mut backend, &mut pool);
        let adj = BasicAdjustments {
            levels_min: 0.25,
            levels_max: 0.75,
            ..Default::default()
        };
        let mut normal = PixelBuffer::filled(2, 2, [0.5, 0.5, 1.0, 1.0]).unwrap();
        standard_chain(&mut frame, &mut normal, &adj, TextureChannel::Normal).unwrap();
        assert_eq!(normal.get(0, 0), [0.5, 0.5, 1.0, 1.0]);
        let mut rough = PixelBuffer::filled(2, 2, [0.75, 0.5, 0.25, 1.0]).unwrap();
        standard_chain(&mut frame, &mut rough, &adj, TextureChannel::Roughness).unwrap();
        assert_eq!(rough.get(1, 1), [1.0, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn unit_step_keeps_flat_normals() {
        let mut backend = CpuBackend::new();
        let mut pool = ScratchPool::new();
        let mut frame = Frame::new(&mut backend, &mut pool);
        let mut work = PixelBuffer::filled(3, 3, [0.5, 0.5, 1.0, 1.0]).unwrap();
        normal_tail(&mut frame, &mut work, 1.0, &NormalMixerConfig::default(), None).unwrap();
        assert_eq!(work.get(1, 1), [0.5, 0.5, 1.0, 1.0]);
    }
}
