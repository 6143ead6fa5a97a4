// ============================================================================
// UV TRANSFORMS — seamless tiling and the perspective corner warp
// ============================================================================

use super::frame::Frame;
use crate::config::{MirrorAxis, PerspectiveConfig, SeamlessConfig, SeamlessMode, SimpleDirection};
use crate::error::Result;
use crate::passes::{Axis, Pass, PassBackend, RandomTilingPass};

/// The seamless passes to run for `cfg`, in order.  Empty for `None`.
pub fn seamless_passes(cfg: &SeamlessConfig, has_contrast: bool) -> Vec<Pass> {
    // Without a contrast image the profile stays linear.
    let strength = if has_contrast { cfg.strength } else { 0.0 };
    let power = cfg.power;
    let radius = cfg.radius;
    match cfg.mode {
        SeamlessMode::None => Vec::new(),
        SeamlessMode::Simple => {
            let axes: &[Axis] = match cfg.simple_direction {
                SimpleDirection::Both => &[Axis::Horizontal, Axis::Vertical],
                SimpleDirection::Horizontal => &[Axis::Horizontal],
                SimpleDirection::Vertical => &[Axis::Vertical],
            };
            axes.iter()
                .map(|&axis| Pass::SeamlessSimple {
                    radius,
                    axis,
                    strength,
                    power,
                })
                .collect()
        }
        SeamlessMode::Mirror => {
            let (mirror_x, mirror_y) = match cfg.mirror_axis {
                MirrorAxis::Both => (true, true),
                MirrorAxis::X => (true, false),
                MirrorAxis::Y => (false, true),
            };
            vec![Pass::SeamlessMirror {
                radius,
                mirror_x,
                mirror_y,
                strength,
                power,
            }]
        }
        SeamlessMode::Random => vec![Pass::SeamlessRandom {
            radius,
            strength,
            power,
            random: RandomTilingPass {
                angles: cfg.random.angles,
                phase: cfg.random.phase,
                inner_radius: cfg.random.inner_radius,
                outer_radius: cfg.random.outer_radius,
            },
        }],
    }
}

pub fn seamless<B: PassBackend>(
    frame: &mut Frame<'_, B>,
    work: &mut B::Target,
    cfg: &SeamlessConfig,
    contrast: Option<&B::Target>,
) -> Result<()> {
    for pass in seamless_passes(cfg, contrast.is_some()) {
        match contrast {
            Some(c) => frame.apply(work, &pass, &[c])?,
            None => frame.apply_self_paired(work, &pass)?,
        }
    }
    Ok(())
}

pub fn perspective<B: PassBackend>(
    frame: &mut Frame<'_, B>,
    work: &mut B::Target,
    cfg: &PerspectiveConfig,
) -> Result<()> {
    if cfg.is_identity() {
        return Ok(());
    }
    let pass = Pass::Perspective {
        corners: cfg.corners,
        weights: cfg.weights,
    };
    frame.apply(work, &pass, &[])
}

/// Seamless then perspective, or the reverse with `translations_first`.
pub fn uv_transforms<B: PassBackend>(
    frame: &mut Frame<'_, B>,
    work: &mut B::Target,
    seamless_cfg: &SeamlessConfig,
    perspective_cfg: &PerspectiveConfig,
    contrast: Option<&B::Target>,
) -> Result<()> {
    if seamless_cfg.translations_first {
        perspective(frame, work, perspective_cfg)?;
        seamless(frame, work, seamless_cfg, contrast)
    } else {
        seamless(frame, work, seamless_cfg, contrast)?;
        perspective(frame, work, perspective_cfg)
    }
}
