// ============================================================================
// PIPELINE CONFIGURATION — every parameter the orchestrator reads per render
// ============================================================================
//
// Owned by the caller and passed as `&mut` into each render.  The pipeline
// writes back only three fields: `base_map.conversion_enabled`,
// `base_map.show_height_preview` and `height_conversion.last_range`.
//
// All structs are `#[serde(default)]` so partial JSON presets load.
// ============================================================================

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::channel::{InputSource, TextureChannel};
use crate::ops::sampling::hash_f32;
use crate::passes::SamplerSettings;
use crate::pipeline::material::MaterialIndex;
use crate::pipeline::normalize::NormalizeRange;

// ============================================================================
// PER-CHANNEL PARAMETERS
// ============================================================================

/// Standard enhancement chain parameters.  Every field has a neutral value
/// that skips its pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicAdjustments {
    /// Invert R, G, B individually
    pub invert: [bool; 3],
    /// Hue rotation in turns (0 = off)
    pub hue_shift: f32,
    /// Reduce to luminance before enhancing
    pub grayscale: bool,
    /// Contrast around mid-grey (0 = off)
    pub contrast: f32,
    /// Brightness offset (0 = off)
    pub brightness: f32,
    /// Shading removal strength (0 = off)
    pub shading_removal: f32,
    /// Blur radius used to estimate baked lighting
    pub shading_radius: u32,
    pub small_detail: f32,
    pub medium_detail: f32,
    /// Positive: sharpen amount; negative: blur radius; 0 = off
    pub sharpen_blur: i32,
    /// Height range mapped onto [0, 1] (0..1 = off)
    pub levels_min: f32,
    pub levels_max: f32,
}

impl Default for BasicAdjustments {
    fn default() -> Self {
        Self {
            invert: [false; 3],
            hue_shift: 0.0,
            grayscale: false,
            contrast: 0.0,
            brightness: 0.0,
            shading_removal: 0.0,
            shading_radius: 16,
            small_detail: 0.0,
            medium_detail: 0.0,
            sharpen_blur: 0,
            levels_min: 0.0,
            levels_max: 1.0,
        }
    }
}

impl BasicAdjustments {
    pub fn enhances(&self) -> bool {
        self.contrast != 0.0 || self.brightness != 0.0
    }

    pub fn has_levels(&self) -> bool {
        self.levels_min != 0.0 || self.levels_max != 1.0
    }
}

/// Extra filter appended to the Roughness/Metallic chain.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub enum SurfaceFilter {
    #[default]
    None,
    /// Roughness from local deviation against a blurred copy.
    Noise {
        radius: u32,
        depth: f32,
        threshold: f32,
        amount: f32,
    },
    /// Grey mask from distance to a picked color.
    ColorRemap {
        color: [f32; 3],
        softness: f32,
        invert: bool,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelParams {
    pub input: InputSource,
    pub adjustments: BasicAdjustments,
    pub surface: SurfaceFilter,
    /// Weight of the grunge overlay (0 = off)
    pub grunge_weight: f32,
    /// XY scale applied to normal channels at the end of the chain
    pub normal_step: f32,
    /// Replacement adjustments while a given material is active, keyed by
    /// palette index
    pub material_overrides: BTreeMap<u32, BasicAdjustments>,
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self {
            input: InputSource::Own,
            adjustments: BasicAdjustments::default(),
            surface: SurfaceFilter::None,
            grunge_weight: 0.0,
            normal_step: 1.0,
            material_overrides: BTreeMap::new(),
        }
    }
}

// ============================================================================
// BASE MAP DECOMPOSITION
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseMapLevel {
    /// Sobel gradient scale
    pub amplitude: f32,
    /// 0 keeps the slopes, 1 flattens the octave completely
    pub flatness: f32,
    /// Number of Replace expansion passes
    pub iterations: u32,
    /// Neighbourhood radius of each expansion pass
    pub filter_radius: u32,
    /// Pull towards the raw estimate on color edges
    pub edge_mix: f32,
    /// Gaussian radius applied after the Sobel step
    pub pre_smooth_radius: u32,
    /// 0 = raw estimate, 1 = expanded estimate
    pub blending: f32,
    /// Weight in the octave combine
    pub weight: f32,
}

impl Default for BaseMapLevel {
    fn default() -> Self {
        Self {
            amplitude: 8.0,
            flatness: 0.0,
            iterations: 2,
            filter_radius: 1,
            edge_mix: 0.5,
            pre_smooth_radius: 1,
            blending: 0.5,
            weight: 0.25,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseMapConfig {
    /// Small, Medium, Big, Huge
    pub levels: [BaseMapLevel; 4],
    /// Picked shadow color mapped to 0
    pub min_color: Option<[f32; 3]>,
    /// Picked highlight color mapped to 1
    pub max_color: Option<[f32; 3]>,
    /// Reference rotation in degrees
    pub angle: f32,
    /// Z lift towards the reference axis
    pub angle_correction: f32,
    /// Show the decomposition preview on the Diffuse channel
    pub conversion_enabled: bool,
    /// Extend the preview with the reconstructed height
    pub show_height_preview: bool,
}

impl Default for BaseMapConfig {
    fn default() -> Self {
        let mut levels = [BaseMapLevel::default(); 4];
        for (i, level) in levels.iter_mut().enumerate() {
            level.iterations = 2 + i as u32;
        }
        Self {
            levels,
            min_color: None,
            max_color: None,
            angle: 0.0,
            angle_correction: 0.0,
            conversion_enabled: false,
            show_height_preview: false,
        }
    }
}

impl BaseMapConfig {
    pub fn weights(&self) -> [f32; 4] {
        self.levels.map(|l| l.weight)
    }

    pub fn corrects_angle(&self) -> bool {
        self.angle != 0.0 || self.angle_correction != 0.0
    }
}

// ============================================================================
// HEIGHT / NORMAL / OCCLUSION CONVERSIONS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightConversion {
    /// Relaxation passes per scale 2^k, VerySmall (k = 0) to Huge (k = 5)
    pub iterations: [u32; 6],
    pub noise_level: f32,
    pub noise_seed: u32,
    /// Range found by the last normalization (written by the pipeline)
    pub last_range: Option<NormalizeRange>,
}

impl Default for HeightConversion {
    fn default() -> Self {
        Self {
            iterations: [10; 6],
            noise_level: 0.005,
            noise_seed: 0,
            last_range: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalConversion {
    pub depth: f32,
}

impl Default for NormalConversion {
    fn default() -> Self {
        Self { depth: 2.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcclusionConfig {
    pub samples: u32,
    /// Tap radius in pixels
    pub radius: f32,
    pub depth: f32,
    pub bias: f32,
    pub intensity: f32,
}

impl Default for OcclusionConfig {
    fn default() -> Self {
        Self {
            samples: 16,
            radius: 4.0,
            depth: 1.0,
            bias: 0.05,
            intensity: 1.0,
        }
    }
}

// ============================================================================
// SEAMLESS TILING + PERSPECTIVE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SeamlessMode {
    #[default]
    None,
    Simple,
    Mirror,
    Random,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContrastInput {
    #[default]
    None,
    Height,
    Diffuse,
}

impl ContrastInput {
    pub fn channel(self) -> Option<TextureChannel> {
        match self {
            ContrastInput::None => None,
            ContrastInput::Height => Some(TextureChannel::Height),
            ContrastInput::Diffuse => Some(TextureChannel::Diffuse),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SimpleDirection {
    #[default]
    Both,
    Horizontal,
    Vertical,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MirrorAxis {
    #[default]
    Both,
    X,
    Y,
}

/// Parameters of the Random variant.  They change only through
/// [`RandomTiling::randomize`] and [`RandomTiling::reset`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomTiling {
    /// Rotation (radians) of the X, Y and XY counterparts
    pub angles: [f32; 3],
    pub phase: f32,
    /// Chebyshev radius (0 = center, 1 = border) where fading starts
    pub inner_radius: f32,
    /// Radius where rotation has faded out
    pub outer_radius: f32,
    pub seed: u32,
}

impl Default for RandomTiling {
    fn default() -> Self {
        Self {
            angles: [0.0; 3],
            phase: 0.0,
            inner_radius: 0.5,
            outer_radius: 0.9,
            seed: 0,
        }
    }
}

impl RandomTiling {
    /// Draw new angles and phase from `seed`.  Deterministic per seed.
    pub fn randomize(&mut self, seed: u32) {
        use std::f32::consts::PI;
        self.seed = seed;
        for (k, a) in self.angles.iter_mut().enumerate() {
            *a = (hash_f32(k as u32, 1, seed) * 2.0 - 1.0) * PI;
        }
        self.phase = (hash_f32(3, 1, seed) * 2.0 - 1.0) * PI * 0.25;
    }

    /// Back to no rotation; radii are kept.
    pub fn reset(&mut self) {
        self.angles = [0.0; 3];
        self.phase = 0.0;
        self.seed = 0;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeamlessConfig {
    pub mode: SeamlessMode,
    /// Blend band width in pixels
    pub radius: u32,
    /// Contrast influence on the blend profile (0 = linear profile)
    pub strength: f32,
    pub power: f32,
    pub contrast_input: ContrastInput,
    /// Run the perspective warp before the seamless blend
    pub translations_first: bool,
    pub simple_direction: SimpleDirection,
    pub mirror_axis: MirrorAxis,
    pub random: RandomTiling,
}

impl Default for SeamlessConfig {
    fn default() -> Self {
        Self {
            mode: SeamlessMode::None,
            radius: 16,
            strength: 0.0,
            power: 1.0,
            contrast_input: ContrastInput::None,
            translations_first: false,
            simple_direction: SimpleDirection::Both,
            mirror_axis: MirrorAxis::Both,
            random: RandomTiling::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerspectiveConfig {
    /// UV offsets of top-left, top-right, bottom-left, bottom-right
    pub corners: [[f32; 2]; 4],
    pub weights: [f32; 4],
}

impl Default for PerspectiveConfig {
    fn default() -> Self {
        Self {
            corners: [[0.0; 2]; 4],
            weights: [1.0; 4],
        }
    }
}

impl PerspectiveConfig {
    pub fn is_identity(&self) -> bool {
        self.corners
            .iter()
            .zip(self.weights)
            .all(|(c, w)| w == 0.0 || (c[0] == 0.0 && c[1] == 0.0))
    }
}

// ============================================================================
// MATERIAL / GRUNGE / MIXER
// ============================================================================

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Region currently being edited; `MaterialIndex::DISABLED` turns masking off
    pub active: MaterialIndex,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrungeConfig {
    /// Gradient scale of the normal-channel warp
    pub normal_depth: f32,
}

impl Default for GrungeConfig {
    fn default() -> Self {
        Self { normal_depth: 1.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalMixerConfig {
    pub enabled: bool,
    pub weight: f32,
    /// Degrees
    pub angle: f32,
    /// Tiling factor of the secondary image
    pub scale: f32,
}

impl Default for NormalMixerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            weight: 0.5,
            angle: 0.0,
            scale: 1.0,
        }
    }
}

// ============================================================================
// TOP LEVEL
// ============================================================================

#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-channel parameters; missing channels use `ChannelParams::default()`
    pub channels: BTreeMap<TextureChannel, ChannelParams>,
    pub base_map: BaseMapConfig,
    pub height_conversion: HeightConversion,
    pub normal_conversion: NormalConversion,
    pub occlusion: OcclusionConfig,
    pub seamless: SeamlessConfig,
    pub perspective: PerspectiveConfig,
    pub material: MaterialConfig,
    pub grunge: GrungeConfig,
    pub normal_mixer: NormalMixerConfig,
    pub sampler: SamplerSettings,
}

impl PipelineConfig {
    pub fn channel(&self, ch: TextureChannel) -> ChannelParams {
        self.channels.get(&ch).cloned().unwrap_or_default()
    }

    pub fn channel_mut(&mut self, ch: TextureChannel) -> &mut ChannelParams {
        self.channels.entry(ch).or_default()
    }

    pub fn from_json(text: &str) -> Result<Self, String> {
        serde_json::from_str(text).map_err(|e| format!("Invalid preset: {}", e))
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| format!("Failed to serialize preset: {}", e))
    }
}
