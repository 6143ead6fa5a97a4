// ============================================================================
// FILTER PASS LIBRARY — the catalog of full-screen operations and the backend
// seam every implementation (CPU rayon, GPU compute) plugs into
// ============================================================================
//
// A pass reads up to four input buffers, writes exactly one output buffer of
// its own size, and keeps no state between invocations.  Inputs whose size
// differs from the output are resampled at pixel-center UVs.
//
// Normals are encoded as `n * 0.5 + 0.5`.  Heights live in the red channel
// (grey images carry the same value in R, G and B).
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;
use crate::error::{PipelineError, Result};

/// Texel filtering used whenever a pass samples between texel centers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Addressing for reads outside the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WrapMode {
    /// The image is a tile, reads wrap to the opposite side.
    #[default]
    Repeat,
    Clamp,
}

/// Process-wide sampler configuration shared by every pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSettings {
    pub filter: FilterMode,
    pub wrap: WrapMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// How `NormalExpansion` combines its inputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NormalCombine {
    /// Replace each normal with a strength-weighted average of its
    /// neighbourhood; grows detail outwards.
    Replace { radius: u32 },
    /// Mix the expanded estimate (input 0) with the raw Sobel estimate
    /// (input 1), pulling towards the raw estimate on edges of the color image
    /// (input 2), then flatten and renormalize.
    WeightedMix {
        edge_mix: f32,
        blending: f32,
        flatness: f32,
    },
}

/// Rotation/phase set driving `SeamlessRandom`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RandomTilingPass {
    pub angles: [f32; 3],
    pub phase: f32,
    pub inner_radius: f32,
    pub outer_radius: f32,
}

/// Per-pass parameters.  See each variant for its input layout.
#[derive(Clone, Debug, PartialEq)]
pub enum Pass {
    /// `[src]`: identity (or resample with the global filter).
    Copy,
    /// `[src]`: resample with an explicit filter.
    Resample { filter: FilterMode },
    /// `[]`: constant color.
    Fill { color: [f32; 4] },
    /// `[src]`: one axis of a separable Gaussian.
    GaussianBlur { radius: u32, sigma: f32, axis: Axis },
    /// `[src]`: weighted grey.
    Grayscale { weights: [f32; 3] },
    /// `[src]`: grey by projection onto the `min_color → max_color` segment.
    GrayscaleAnchored { min_color: [f32; 3], max_color: [f32; 3] },
    /// `[src]`: `1 - c` for the flagged RGB components.
    InvertComponents { components: [bool; 3] },
    /// `[src]`: rotate hue by `shift` turns.
    HueShift { shift: f32 },
    /// `[src]`: contrast around mid-grey plus brightness offset.
    Enhance { contrast: f32, brightness: f32 },
    /// `[src, blurred]`: divide out low-frequency lighting.
    RemoveShading { strength: f32 },
    /// `[src, blur_small, blur_medium]`
    DetailBoost { small: f32, medium: f32 },
    /// `[src, blurred]`: unsharp mask.
    Sharpen { amount: f32 },
    /// `[src]`: remap `[min, max]` onto `[0, 1]`.
    Levels { min: f32, max: f32 },
    /// `[grey]`: 3×3 Sobel gradient scaled by `amplitude`, encoded as normal.
    SobelToNormal { amplitude: f32 },
    /// See [`NormalCombine`].
    NormalExpansion { combine: NormalCombine },
    /// `[src]`: 2×2 box reduction.
    Downsample,
    /// `[small, medium, big, huge]`: weighted sum, renormalized.
    MixNormalLevels { weights: [f32; 4] },
    /// `[normal]`: rotate around Z by `angle` radians, lift Z by `correction`.
    AngleCorrection { angle: f32, correction: f32 },
    /// `[height, normal]`: one relaxation step at offset `scale`.
    HeightFromNormalStep { scale: u32 },
    /// `[height]`: central differences scaled by `depth`.
    NormalFromHeight { depth: f32 },
    /// `[height, normal]`
    Occlusion {
        samples: u32,
        radius: f32,
        depth: f32,
        bias: f32,
        intensity: f32,
    },
    /// `[src]`: per-component `(c - min) / (max - min)`.
    Remap { min: [f32; 3], max: [f32; 3] },
    /// `[src]`: add grey noise of amplitude `level`.
    Noise { level: f32, seed: u32 },
    /// `[src, contrast]`: one axis of the linear edge blend.
    SeamlessSimple {
        radius: u32,
        axis: Axis,
        strength: f32,
        power: f32,
    },
    /// `[src, contrast]`: 4-tap mirrored edge blend.
    SeamlessMirror {
        radius: u32,
        mirror_x: bool,
        mirror_y: bool,
        strength: f32,
        power: f32,
    },
    /// `[src, contrast]`: mirrored blend over rotated counterparts.
    SeamlessRandom {
        radius: u32,
        strength: f32,
        power: f32,
        random: RandomTilingPass,
    },
    /// `[src]`: bilinear corner warp of the UVs.
    Perspective {
        corners: [[f32; 2]; 4],
        weights: [f32; 4],
    },
    /// `[base, grunge]`
    OverlayBlend { weight: f32 },
    /// `[normal, grunge]`: perturb normals by the grunge gradient.
    GrungeNormalWarp { weight: f32, depth: f32 },
    /// `[normal]`: scale XY, renormalize.
    NormalStep { step: f32 },
    /// `[normal, mixer]`
    NormalMixer { weight: f32, angle: f32, scale: f32 },
    /// `[src, blurred]`: roughness from local deviation.
    RoughnessNoise { depth: f32, threshold: f32, amount: f32 },
    /// `[src]`: grey from distance to a picked color.
    ColorRemap {
        color: [f32; 3],
        softness: f32,
        invert: bool,
    },
    /// `[processed, original, mask]`: keep `processed` where the mask equals
    /// `color`, `original` elsewhere.
    MaskSelect { color: [f32; 3] },
}

impl Pass {
    /// Short stable name, used for GPU entry points and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Pass::Copy => "copy",
            Pass::Resample { .. } => "resample",
            Pass::Fill { .. } => "fill",
            Pass::GaussianBlur { .. } => "gaussian_blur",
            Pass::Grayscale { .. } => "grayscale",
            Pass::GrayscaleAnchored { .. } => "grayscale_anchored",
            Pass::InvertComponents { .. } => "invert_components",
            Pass::HueShift { .. } => "hue_shift",
            Pass::Enhance { .. } => "enhance",
            Pass::RemoveShading { .. } => "remove_shading",
            Pass::DetailBoost { .. } => "detail_boost",
            Pass::Sharpen { .. } => "sharpen",
            Pass::Levels { .. } => "levels",
            Pass::SobelToNormal { .. } => "sobel_to_normal",
            Pass::NormalExpansion { .. } => "normal_expansion",
            Pass::Downsample => "downsample",
            Pass::MixNormalLevels { .. } => "mix_normal_levels",
            Pass::AngleCorrection { .. } => "angle_correction",
            Pass::HeightFromNormalStep { .. } => "height_from_normal_step",
            Pass::NormalFromHeight { .. } => "normal_from_height",
            Pass::Occlusion { .. } => "occlusion",
            Pass::Remap { .. } => "remap",
            Pass::Noise { .. } => "noise",
            Pass::SeamlessSimple { .. } => "seamless_simple",
            Pass::SeamlessMirror { .. } => "seamless_mirror",
            Pass::SeamlessRandom { .. } => "seamless_random",
            Pass::Perspective { .. } => "perspective",
            Pass::OverlayBlend { .. } => "overlay_blend",
            Pass::GrungeNormalWarp { .. } => "grunge_normal_warp",
            Pass::NormalStep { .. } => "normal_step",
            Pass::NormalMixer { .. } => "normal_mixer",
            Pass::RoughnessNoise { .. } => "roughness_noise",
            Pass::ColorRemap { .. } => "color_remap",
            Pass::MaskSelect { .. } => "mask_select",
        }
    }

    /// Number of input buffers the pass reads.
    pub fn arity(&self) -> usize {
        match self {
            Pass::Fill { .. } => 0,
            Pass::RemoveShading { .. }
            | Pass::Sharpen { .. }
            | Pass::HeightFromNormalStep { .. }
            | Pass::Occlusion { .. }
            | Pass::SeamlessSimple { .. }
            | Pass::SeamlessMirror { .. }
            | Pass::SeamlessRandom { .. }
            | Pass::OverlayBlend { .. }
            | Pass::GrungeNormalWarp { .. }
            | Pass::NormalMixer { .. }
            | Pass::RoughnessNoise { .. } => 2,
            Pass::DetailBoost { .. } | Pass::MaskSelect { .. } => 3,
            Pass::NormalExpansion {
                combine: NormalCombine::WeightedMix { .. },
            } => 3,
            Pass::MixNormalLevels { .. } => 4,
            _ => 1,
        }
    }

    pub fn check_inputs(&self, got: usize) -> Result<()> {
        let expected = self.arity();
        if got < expected {
            return Err(PipelineError::PassInputs {
                pass: self.name(),
                expected,
                got,
            });
        }
        Ok(())
    }
}

/// An executor for [`Pass`]es over its own kind of buffer.
///
/// Inputs are shared borrows and the output is an exclusive borrow, so a pass
/// can never read the buffer it writes.
pub trait PassBackend {
    /// Backend-resident image buffer.
    type Target;
    /// Readback in flight; resolved by [`PassBackend::finish_readback`].
    type Pending;

    fn name(&self) -> &str;

    fn sampler(&self) -> SamplerSettings;

    fn set_sampler(&mut self, settings: SamplerSettings);

    fn create_target(&mut self, width: u32, height: u32) -> Result<Self::Target>;

    fn target_size(&self, target: &Self::Target) -> (u32, u32);

    /// Replace the contents of `target` with `pixels` (same size).
    fn upload(&mut self, target: &mut Self::Target, pixels: &PixelBuffer) -> Result<()>;

    fn run(&mut self, pass: &Pass, inputs: &[&Self::Target], output: &mut Self::Target) -> Result<()>;

    /// Start copying `target` back to the CPU.  Work issued afterwards may
    /// overlap with the transfer.
    fn begin_readback(&mut self, target: &Self::Target) -> Result<Self::Pending>;

    /// Block until the readback completes.
    fn finish_readback(&mut self, pending: Self::Pending) -> Result<PixelBuffer>;

    fn read_back(&mut self, target: &Self::Target) -> Result<PixelBuffer> {
        let pending = self.begin_readback(target)?;
        self.finish_readback(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_is_checked() {
        let pass = Pass::MixNormalLevels { weights: [1.0; 4] };
        assert!(pass.check_inputs(4).is_ok());
        match pass.check_inputs(2) {
            Err(PipelineError::PassInputs { expected, got, .. }) => {
                assert_eq!((expected, got), (4, 2));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Pass::Fill { color: [0.0; 4] }.check_inputs(0).is_ok());
    }

    #[test]
    fn expansion_arity_depends_on_mode() {
        let replace = Pass::NormalExpansion {
            combine: NormalCombine::Replace { radius: 1 },
        };
        let mix = Pass::NormalExpansion {
            combine: NormalCombine::WeightedMix {
                edge_mix: 0.5,
                blending: 0.5,
                flatness: 0.0,
            },
        };
        assert_eq!(replace.arity(), 1);
        assert_eq!(mix.arity(), 3);
    }
}
