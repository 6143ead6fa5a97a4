// ============================================================================
// CPU PASS BACKEND — rayon implementations of every `Pass`
// ============================================================================
//
//   sampling.rs    — Sampler (wrap/filter), par_fill, vector + hash helpers
//   adjustments.rs — per-pixel color operations
//   filters.rs     — blur, shading/detail filters, downsampling
//   surface.rs     — gradients, normals, height relaxation, occlusion
//   tiling.rs      — seamless edge blends and the corner warp
//   composite.rs   — grunge overlay, material-region selection
// ============================================================================

pub mod adjustments;
pub mod composite;
pub mod filters;
pub mod sampling;
pub mod surface;
pub mod tiling;

use crate::buffer::PixelBuffer;
use crate::error::{PipelineError, Result};
use crate::passes::{NormalCombine, Pass, PassBackend, SamplerSettings};
use sampling::Sampler;

/// Reference backend: every target is a [`PixelBuffer`] in main memory, every
/// pass fans rows out over the rayon pool.
#[derive(Debug, Default)]
pub struct CpuBackend {
    settings: SamplerSettings,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PassBackend for CpuBackend {
    type Target = PixelBuffer;
    type Pending = PixelBuffer;

    fn name(&self) -> &str {
        "cpu"
    }

    fn sampler(&self) -> SamplerSettings {
        self.settings
    }

    fn set_sampler(&mut self, settings: SamplerSettings) {
        self.settings = settings;
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<PixelBuffer> {
        PixelBuffer::new(width, height)
    }

    fn target_size(&self, target: &PixelBuffer) -> (u32, u32) {
        target.dimensions()
    }

    fn upload(&mut self, target: &mut PixelBuffer, pixels: &PixelBuffer) -> Result<()> {
        if target.dimensions() != pixels.dimensions() {
            return Err(PipelineError::InvalidInput(format!(
                "upload of {:?} into a {:?} target",
                pixels.dimensions(),
                target.dimensions()
            )));
        }
        target.pixels_mut().copy_from_slice(pixels.pixels());
        target.quantize_in_place();
        Ok(())
    }

    fn run(&mut self, pass: &Pass, inputs: &[&PixelBuffer], output: &mut PixelBuffer) -> Result<()> {
        pass.check_inputs(inputs.len())?;
        let s = |i: usize| Sampler::new(inputs[i], self.settings);
        match *pass {
            Pass::Copy => adjustments::copy(s(0), output),
            Pass::Resample { filter } => adjustments::resample(s(0), output, filter),
            Pass::Fill { color } => adjustments::fill(output, color),
            Pass::GaussianBlur { radius, sigma, axis } => {
                filters::gaussian_blur(s(0), output, radius, sigma, axis)
            }
            Pass::Grayscale { weights } => adjustments::grayscale(s(0), output, weights),
            Pass::GrayscaleAnchored { min_color, max_color } => {
                adjustments::grayscale_anchored(s(0), output, min_color, max_color)
            }
            Pass::InvertComponents { components } => {
                adjustments::invert_components(s(0), output, components)
            }
            Pass::HueShift { shift } => adjustments::hue_shift(s(0), output, shift),
            Pass::Enhance { contrast, brightness } => {
                adjustments::enhance(s(0), output, contrast, brightness)
            }
            Pass::RemoveShading { strength } => filters::remove_shading(s(0), s(1), output, strength),
            Pass::DetailBoost { small, medium } => {
                filters::detail_boost(s(0), s(1), s(2), output, small, medium)
            }
            Pass::Sharpen { amount } => filters::sharpen(s(0), s(1), output, amount),
            Pass::Levels { min, max } => adjustments::levels(s(0), output, min, max),
            Pass::SobelToNormal { amplitude } => surface::sobel_to_normal(s(0), output, amplitude),
            Pass::NormalExpansion { combine } => match combine {
                NormalCombine::Replace { radius } => surface::normal_expand_replace(s(0), output, radius),
                NormalCombine::WeightedMix {
                    edge_mix,
                    blending,
                    flatness,
                } => surface::normal_expand_mix(s(0), s(1), s(2), output, edge_mix, blending, flatness),
            },
            Pass::Downsample => filters::downsample(s(0), output),
            Pass::MixNormalLevels { weights } => {
                surface::mix_normal_levels([s(0), s(1), s(2), s(3)], output, weights)
            }
            Pass::AngleCorrection { angle, correction } => {
                surface::angle_correction(s(0), output, angle, correction)
            }
            Pass::HeightFromNormalStep { scale } => {
                surface::height_from_normal_step(s(0), s(1), output, scale)
            }
            Pass::NormalFromHeight { depth } => surface::normal_from_height(s(0), output, depth),
            Pass::Occlusion {
                samples,
                radius,
                depth,
                bias,
                intensity,
            } => surface::occlusion(s(0), s(1), output, samples, radius, depth, bias, intensity),
            Pass::Remap { min, max } => adjustments::remap(s(0), output, min, max),
            Pass::Noise { level, seed } => adjustments::noise(s(0), output, level, seed),
            Pass::SeamlessSimple {
                radius,
                axis,
                strength,
                power,
            } => tiling::seamless_simple(s(0), s(1), output, radius, axis, strength, power),
            Pass::SeamlessMirror {
                radius,
                mirror_x,
                mirror_y,
                strength,
                power,
            } => tiling::seamless_mirror(s(0), s(1), output, radius, mirror_x, mirror_y, strength, power),
            Pass::SeamlessRandom {
                radius,
                strength,
                power,
                random,
            } => tiling::seamless_random(s(0), s(1), output, radius, strength, power, random),
            Pass::Perspective { corners, weights } => tiling::perspective(s(0), output, corners, weights),
            Pass::OverlayBlend { weight } => composite::overlay_blend(s(0), s(1), output, weight),
            Pass::GrungeNormalWarp { weight, depth } => {
                surface::grunge_normal_warp(s(0), s(1), output, weight, depth)
            }
            Pass::NormalStep { step } => surface::normal_step(s(0), output, step),
            Pass::NormalMixer { weight, angle, scale } => {
                surface::normal_mixer(s(0), s(1), output, weight, angle, scale)
            }
            Pass::RoughnessNoise {
                depth,
                threshold,
                amount,
            } => filters::roughness_noise(s(0), s(1), output, depth, threshold, amount),
            Pass::ColorRemap {
                color,
                softness,
                invert,
            } => adjustments::color_remap(s(0), output, color, softness, invert),
            Pass::MaskSelect { color } => composite::mask_select(s(0), s(1), s(2), output, color),
        }
        Ok(())
    }

    fn begin_readback(&mut self, target: &PixelBuffer) -> Result<PixelBuffer> {
        Ok(target.clone())
    }

    fn finish_readback(&mut self, pending: PixelBuffer) -> Result<PixelBuffer> {
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_copy_is_exact() {
        let mut backend = CpuBackend::new();
        for (w, h) in [(1, 1), (7, 3), (64, 17)] {
            let mut src = backend.create_target(w, h).unwrap();
            for (i, px) in src.pixels_mut().iter_mut().enumerate() {
                let v = (i % 97) as f32 / 96.0;
                *px = [v, 1.0 - v, v * v, 1.0];
            }
            src.quantize_in_place();
            let mut out = backend.create_target(w, h).unwrap();
            backend.run(&Pass::Copy, &[&src], &mut out).unwrap();
            assert_eq!(out, src);
        }
    }

    #[test]
    fn missing_inputs_are_reported() {
        let mut backend = CpuBackend::new();
        let src = backend.create_target(2, 2).unwrap();
        let mut out = backend.create_target(2, 2).unwrap();
        let err = backend
            .run(&Pass::Sharpen { amount: 1.0 }, &[&src], &mut out)
            .unwrap_err();
        assert!(matches!(err, PipelineError::PassInputs { expected: 2, got: 1, .. }));
    }
}
