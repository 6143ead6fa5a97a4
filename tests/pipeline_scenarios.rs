// ============================================================================
// PIPELINE SCENARIOS — end-to-end renders on the CPU backend
// ============================================================================

use image::{Rgba, RgbaImage};

use mapforge::buffer::PixelBuffer;
use mapforge::channel::{InputSource, TextureChannel};
use mapforge::config::{PipelineConfig, SeamlessMode};
use mapforge::error::{PipelineError, Result};
use mapforge::ops::CpuBackend;
use mapforge::ops::sampling::hash_f32;
use mapforge::passes::{Pass, PassBackend, SamplerSettings};
use mapforge::pipeline::frame::Frame;
use mapforge::pipeline::height::{height_to_normal, normal_to_height};
use mapforge::pipeline::pool::ScratchPool;
use mapforge::pipeline::{ConversionCommand, ConversionKind, ConversionMode, MaterialIndex, Pipeline, ResizeTarget};

fn cpu_pipeline() -> Pipeline<CpuBackend> {
    Pipeline::with_placeholder_size(CpuBackend::new(), 8, 8).unwrap()
}

fn quiet_config() -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.height_conversion.iterations = [0; 6];
    cfg.height_conversion.noise_level = 0.0;
    for level in cfg.base_map.levels.iter_mut() {
        level.iterations = 0;
    }
    cfg
}

fn textured_image(w: u32, h: u32) -> RgbaImage {
    seeded_image(w, h, 3)
}

fn seeded_image(w: u32, h: u32, seed: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        let v = (hash_f32(x, y, seed) * 255.0) as u8;
        Rgba([v, 255 - v, v / 2, 255])
    })
}

fn assert_inverted(out: &PixelBuffer, src: &PixelBuffer, x: u32, y: u32) {
    let (o, s) = (out.get(x, y), src.get(x, y));
    for c in 0..3 {
        assert!((o[c] - (1.0 - s[c])).abs() < 2e-3, "({}, {}): {:?} vs {:?}", x, y, o, s);
    }
}

/// CPU backend that fails every pass with a given name.
struct FailingOn {
    inner: CpuBackend,
    pass: &'static str,
}

impl PassBackend for FailingOn {
    type Target = PixelBuffer;
    type Pending = PixelBuffer;

    fn name(&self) -> &str {
        "failing"
    }

    fn sampler(&self) -> SamplerSettings {
        self.inner.sampler()
    }

    fn set_sampler(&mut self, settings: SamplerSettings) {
        self.inner.set_sampler(settings);
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<PixelBuffer> {
        self.inner.create_target(width, height)
    }

    fn target_size(&self, target: &PixelBuffer) -> (u32, u32) {
        self.inner.target_size(target)
    }

    fn upload(&mut self, target: &mut PixelBuffer, pixels: &PixelBuffer) -> Result<()> {
        self.inner.upload(target, pixels)
    }

    fn run(&mut self, pass: &Pass, inputs: &[&PixelBuffer], output: &mut PixelBuffer) -> Result<()> {
        if pass.name() == self.pass {
            return Err(PipelineError::Gpu(format!("{} unavailable", self.pass)));
        }
        self.inner.run(pass, inputs, output)
    }

    fn begin_readback(&mut self, target: &PixelBuffer) -> Result<PixelBuffer> {
        self.inner.begin_readback(target)
    }

    fn finish_readback(&mut self, pending: PixelBuffer) -> Result<PixelBuffer> {
        self.inner.finish_readback(pending)
    }
}

/// Diffuse and grunge loaded, grunge overlaid on the diffuse.
fn grunged_diffuse() -> (Pipeline<CpuBackend>, PipelineConfig) {
    let mut pipeline = cpu_pipeline();
    pipeline.load_image(TextureChannel::Diffuse, &textured_image(8, 8)).unwrap();
    pipeline.load_image(TextureChannel::Grunge, &seeded_image(8, 8, 11)).unwrap();
    let mut cfg = quiet_config();
    cfg.channel_mut(TextureChannel::Diffuse).grunge_weight = 0.5;
    cfg.seamless.mode = SeamlessMode::Mirror;
    cfg.seamless.radius = 2;
    (pipeline, cfg)
}

#[test]
fn flat_diffuse_propagates_to_every_derived_channel() {
    let mut pipeline = cpu_pipeline();
    let mut cfg = quiet_config();
    cfg.base_map.conversion_enabled = true;
    let diffuse = RgbaImage::from_pixel(4, 4, Rgba([128, 128, 128, 255]));
    pipeline.load_image(TextureChannel::Diffuse, &diffuse).unwrap();

    pipeline.submit(ConversionCommand::new(ConversionKind::DiffuseToOthers));
    let report = pipeline.render_channel(TextureChannel::Diffuse, &mut cfg).unwrap();
    assert_eq!(report.mode, ConversionMode::DiffuseToOthers);
    assert!(!cfg.base_map.conversion_enabled);
    for ch in [TextureChannel::Normal, TextureChannel::Height, TextureChannel::Occlusion] {
        assert!(report.stale.contains(&ch), "{} not reported stale", ch);
    }

    let normal = pipeline.read_channel_pixels(TextureChannel::Normal).unwrap();
    assert_eq!(normal.dimensions(), (4, 4));
    for px in normal.pixels() {
        assert!((px[0] - 0.5).abs() < 0.02 && (px[1] - 0.5).abs() < 0.02, "{:?}", px);
        assert!(px[2] > 0.98, "{:?}", px);
    }

    let height = pipeline.read_channel_pixels(TextureChannel::Height).unwrap();
    assert!(height.pixels().iter().all(|px| (px[0] - 0.5).abs() < 0.02));

    let occlusion = pipeline.read_channel(TextureChannel::Occlusion).unwrap();
    assert!(occlusion.pixels().all(|px| px.0[0] == 255));

    for ch in [TextureChannel::Specular, TextureChannel::Roughness, TextureChannel::Metallic] {
        assert_eq!(pipeline.read_channel(ch).unwrap(), diffuse, "{}", ch);
    }
}

#[test]
fn conversion_results_become_the_new_sources() {
    let mut pipeline = cpu_pipeline();
    let mut cfg = quiet_config();
    pipeline.load_image(TextureChannel::Height, &textured_image(6, 6)).unwrap();
    pipeline.render_channel(TextureChannel::Height, &mut cfg).unwrap();

    pipeline.submit(ConversionCommand::new(ConversionKind::HeightToNormal));
    pipeline.render_channel(TextureChannel::Normal, &mut cfg).unwrap();
    let converted = pipeline.read_channel_pixels(TextureChannel::Normal).unwrap();
    assert_eq!(converted.dimensions(), (6, 6));

    // A plain re-render starts from the stored result, and a unit normal step
    // keeps it as is.
    let report = pipeline.render_channel(TextureChannel::Normal, &mut cfg).unwrap();
    assert_eq!(report.mode, ConversionMode::None);
    let again = pipeline.read_channel_pixels(TextureChannel::Normal).unwrap();
    assert!(again.max_abs_diff(&converted).unwrap() < 2e-3);
}

#[test]
fn normal_to_height_records_its_range() {
    let mut pipeline = cpu_pipeline();
    let mut cfg = quiet_config();
    pipeline.load_image(TextureChannel::Normal, &textured_image(8, 8)).unwrap();
    pipeline.render_channel(TextureChannel::Normal, &mut cfg).unwrap();
    assert!(cfg.height_conversion.last_range.is_none());

    pipeline.submit(ConversionCommand::new(ConversionKind::NormalToHeight));
    pipeline.render_channel(TextureChannel::Height, &mut cfg).unwrap();
    assert!(cfg.height_conversion.last_range.is_some());

    let height = pipeline.read_channel_pixels(TextureChannel::Height).unwrap();
    for px in height.pixels() {
        assert!(px[0] >= -1e-3 && px[0] <= 1.0 + 1e-3);
    }
}

#[test]
fn too_many_material_colors_change_nothing() {
    let mut pipeline = cpu_pipeline();
    let mask = RgbaImage::from_fn(33, 1, |x, _| Rgba([x as u8 * 7, 0, 0, 255]));
    let before = pipeline.read_channel(TextureChannel::Material).unwrap();

    match pipeline.set_material_mask(&mask) {
        Err(PipelineError::TooManyMaterials { found, limit }) => {
            assert_eq!((found, limit), (33, 32));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(pipeline.material_mask().is_none());
    assert_eq!(pipeline.read_channel(TextureChannel::Material).unwrap(), before);
    assert!(!pipeline.take_first_draw(TextureChannel::Material));

    let ok = RgbaImage::from_fn(32, 1, |x, _| Rgba([x as u8 * 7, 0, 0, 255]));
    assert_eq!(pipeline.set_material_mask(&ok).unwrap(), 32);
    assert_eq!(pipeline.channel_size(TextureChannel::Material).unwrap(), (32, 1));
}

#[test]
fn queued_conversions_run_in_order() {
    let mut pipeline = cpu_pipeline();
    let mut cfg = quiet_config();
    pipeline.submit(ConversionCommand::new(ConversionKind::NormalToHeight));
    pipeline.submit(ConversionCommand::new(ConversionKind::HeightToNormal));

    // The front command belongs to Height and blocks the Normal one.
    let report = pipeline.render_channel(TextureChannel::Normal, &mut cfg).unwrap();
    assert_eq!(report.mode, ConversionMode::None);
    assert_eq!(pipeline.pending_commands(), 2);

    let report = pipeline.render_channel(TextureChannel::Height, &mut cfg).unwrap();
    assert_eq!(report.mode, ConversionMode::NormalToHeight);
    assert_eq!(pipeline.pending_commands(), 1);

    let report = pipeline.render_channel(TextureChannel::Normal, &mut cfg).unwrap();
    assert_eq!(report.mode, ConversionMode::HeightToNormal);
    assert_eq!(pipeline.pending_commands(), 0);
}

#[test]
fn render_while_busy_is_coalesced() {
    let mut pipeline = cpu_pipeline();
    let mut cfg = quiet_config();
    pipeline.submit(ConversionCommand::new(ConversionKind::DiffuseToOthers));
    let gate = pipeline.gate();
    {
        let _held = gate.try_enter().unwrap();
        let report = pipeline.render(&mut cfg).unwrap();
        assert!(report.coalesced);
        assert_eq!(report.mode, ConversionMode::None);
        assert_eq!(pipeline.pending_commands(), 1);
    }
    assert!(!gate.is_busy());
    let report = pipeline.render(&mut cfg).unwrap();
    assert!(!report.coalesced);
    assert_eq!(report.mode, ConversionMode::DiffuseToOthers);
}

#[test]
fn output_inputs_skip_repeated_uv_transforms() {
    // Placeholders match the diffuse so dependent channels copy it unresampled.
    let mut pipeline = Pipeline::with_placeholder_size(CpuBackend::new(), 12, 10).unwrap();
    let mut cfg = quiet_config();
    cfg.seamless.mode = SeamlessMode::Mirror;
    cfg.seamless.radius = 3;
    cfg.channel_mut(TextureChannel::Height).input = InputSource::OutputOf(TextureChannel::Diffuse);
    cfg.channel_mut(TextureChannel::Specular).input = InputSource::SourceOf(TextureChannel::Diffuse);
    pipeline.load_image(TextureChannel::Diffuse, &textured_image(12, 10)).unwrap();

    let report = pipeline.render_channel(TextureChannel::Diffuse, &mut cfg).unwrap();
    assert_eq!(report.stale, vec![TextureChannel::Specular, TextureChannel::Height]);
    pipeline.render_channel(TextureChannel::Height, &mut cfg).unwrap();
    pipeline.render_channel(TextureChannel::Specular, &mut cfg).unwrap();

    let diffuse = pipeline.read_channel_pixels(TextureChannel::Diffuse).unwrap();
    let source = pipeline.read_source_pixels(TextureChannel::Diffuse).unwrap();
    assert_ne!(diffuse, source);
    // Height copies the tiled output; Specular tiles the raw source itself.
    assert_eq!(pipeline.read_channel_pixels(TextureChannel::Height).unwrap(), diffuse);
    assert_eq!(pipeline.read_channel_pixels(TextureChannel::Specular).unwrap(), diffuse);
}

#[test]
fn resize_applies_to_every_channel() {
    let mut pipeline = cpu_pipeline();
    let mut cfg = quiet_config();
    let mask = RgbaImage::from_fn(8, 8, |x, _| if x < 4 { Rgba([255, 0, 0, 255]) } else { Rgba([0, 0, 255, 255]) });
    pipeline.set_material_mask(&mask).unwrap();

    pipeline.submit(ConversionCommand::new(ConversionKind::Resize(ResizeTarget::Exact {
        width: 16,
        height: 4,
    })));
    let report = pipeline.render_channel(TextureChannel::Roughness, &mut cfg).unwrap();
    assert_eq!(report.mode, ConversionMode::Resize);
    assert_eq!(report.stale.len(), TextureChannel::ALL.len() - 1);
    for ch in TextureChannel::ALL {
        assert_eq!(pipeline.channel_size(ch).unwrap(), (16, 4), "{}", ch);
    }
    assert_eq!(pipeline.material_mask().unwrap().dimensions(), (16, 4));

    // Nearest resampling keeps the mask's colors exact.
    let material = pipeline.read_channel(TextureChannel::Material).unwrap();
    assert_eq!(material.get_pixel(0, 0).0, [255, 0, 0, 255]);
    assert_eq!(material.get_pixel(15, 3).0, [0, 0, 255, 255]);
}

#[test]
fn first_draw_is_reported_once_per_load() {
    let mut pipeline = cpu_pipeline();
    let mut cfg = quiet_config();
    assert!(!pipeline.take_first_draw(TextureChannel::Diffuse));
    pipeline.load_image(TextureChannel::Diffuse, &textured_image(4, 4)).unwrap();
    let report = pipeline.render(&mut cfg).unwrap();
    assert!(report.first_draw);
    assert!(pipeline.take_first_draw(TextureChannel::Diffuse));
    assert!(!pipeline.take_first_draw(TextureChannel::Diffuse));
}

#[test]
fn height_survives_a_normal_round_trip() {
    const N: u32 = 32;
    let tau = std::f32::consts::TAU;
    let mut original = PixelBuffer::new(N, N).unwrap();
    for y in 0..N {
        for x in 0..N {
            let v = 0.5 + 0.25 * (tau * x as f32 / N as f32).sin() * (tau * y as f32 / N as f32).sin();
            original.set(x, y, [v, v, v, 1.0]);
        }
    }
    original.quantize_in_place();

    let cfg = PipelineConfig::default();
    let mut height_cfg = cfg.height_conversion.clone();
    height_cfg.noise_level = 0.0;

    let mut backend = CpuBackend::new();
    let mut pool = ScratchPool::new();
    let mut frame = Frame::new(&mut backend, &mut pool);
    let normal = height_to_normal(&mut frame, &original, &cfg.normal_conversion).unwrap();
    let (rebuilt, range) = normal_to_height(&mut frame, &normal, &height_cfg, None).unwrap();
    assert!(!range.is_identity());

    // Compare after spreading both to the unit range.
    let (lo, hi) = original
        .pixels()
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    for y in 0..N {
        for x in 0..N {
            let expected = (original.get(x, y)[0] - lo) / (hi - lo);
            let got = rebuilt.get(x, y)[0];
            assert!((expected - got).abs() < 0.05, "({}, {}): {} vs {}", x, y, expected, got);
        }
    }
}

#[test]
fn drag_retransforms_the_last_frame_without_the_chain() {
    let (mut pipeline, mut cfg) = grunged_diffuse();
    cfg.channel_mut(TextureChannel::Diffuse).adjustments.invert = [true; 3];
    pipeline.render(&mut cfg).unwrap();

    // The drag widens the blend band.  Grunge stays in (it was part of the
    // cached frame), the inversion does not.
    cfg.seamless.radius = 3;
    let (mut reference, mut plain) = grunged_diffuse();
    plain.seamless.radius = 3;
    reference.render(&mut plain).unwrap();

    pipeline.begin_interactive_drag();
    pipeline.render(&mut cfg).unwrap();
    let dragged = pipeline.read_channel_pixels(TextureChannel::Diffuse).unwrap();
    assert_eq!(dragged, reference.read_channel_pixels(TextureChannel::Diffuse).unwrap());

    // The flag lasts one render; the next one runs the full chain again.
    pipeline.render(&mut cfg).unwrap();
    plain.channel_mut(TextureChannel::Diffuse).adjustments.invert = [true; 3];
    reference.render(&mut plain).unwrap();
    let full = pipeline.read_channel_pixels(TextureChannel::Diffuse).unwrap();
    assert_ne!(full, dragged);
    assert_eq!(full, reference.read_channel_pixels(TextureChannel::Diffuse).unwrap());

    // Commands wait for the next regular render.
    pipeline.submit(ConversionCommand::new(ConversionKind::DiffuseToOthers));
    pipeline.begin_interactive_drag();
    let report = pipeline.render(&mut cfg).unwrap();
    assert_eq!(report.mode, ConversionMode::None);
    assert_eq!(pipeline.pending_commands(), 1);
}

#[test]
fn drag_without_a_cached_frame_recomputes_the_input() {
    let (mut pipeline, mut cfg) = grunged_diffuse();
    cfg.channel_mut(TextureChannel::Diffuse).adjustments.invert = [true; 3];
    pipeline.begin_interactive_drag();
    pipeline.render(&mut cfg).unwrap();

    // Steps 1 to 3 and the UV transform only: no grunge, no inversion.
    let (mut reference, mut plain) = grunged_diffuse();
    plain.channel_mut(TextureChannel::Diffuse).grunge_weight = 0.0;
    reference.render(&mut plain).unwrap();
    assert_eq!(
        pipeline.read_channel_pixels(TextureChannel::Diffuse).unwrap(),
        reference.read_channel_pixels(TextureChannel::Diffuse).unwrap()
    );
}

#[test]
fn color_picking_and_skip_processing_bypass_the_chain() {
    let mut pipeline = cpu_pipeline();
    let mut cfg = quiet_config();
    cfg.channel_mut(TextureChannel::Diffuse).adjustments.invert = [true; 3];
    pipeline.load_image(TextureChannel::Diffuse, &textured_image(8, 8)).unwrap();
    let source = pipeline.read_source_pixels(TextureChannel::Diffuse).unwrap();

    pipeline.arm_color_picking(true);
    pipeline.render(&mut cfg).unwrap();
    assert_eq!(pipeline.read_channel_pixels(TextureChannel::Diffuse).unwrap(), source);

    pipeline.arm_color_picking(false);
    pipeline.render(&mut cfg).unwrap();
    let processed = pipeline.read_channel_pixels(TextureChannel::Diffuse).unwrap();
    assert_inverted(&processed, &source, 3, 5);

    pipeline.set_skip_processing(TextureChannel::Diffuse, true);
    pipeline.render(&mut cfg).unwrap();
    assert_eq!(pipeline.read_channel_pixels(TextureChannel::Diffuse).unwrap(), source);
}

#[test]
fn active_material_limits_the_chain_to_its_region() {
    let mut pipeline = cpu_pipeline();
    let mut cfg = quiet_config();
    cfg.seamless.mode = SeamlessMode::Mirror;
    cfg.seamless.radius = 3;
    cfg.channel_mut(TextureChannel::Diffuse).adjustments.invert = [true; 3];
    pipeline.load_image(TextureChannel::Diffuse, &textured_image(8, 8)).unwrap();
    let mask = RgbaImage::from_fn(8, 8, |x, _| if x < 4 { Rgba([255, 0, 0, 255]) } else { Rgba([0, 0, 255, 255]) });
    pipeline.set_material_mask(&mask).unwrap();
    cfg.material.active = MaterialIndex(0);

    pipeline.render_channel(TextureChannel::Diffuse, &mut cfg).unwrap();
    let out = pipeline.read_channel_pixels(TextureChannel::Diffuse).unwrap();
    let source = pipeline.read_source_pixels(TextureChannel::Diffuse).unwrap();
    // No edge blend anywhere: the red half is the inverted source, the blue
    // half the untouched source.
    for y in 0..8 {
        for x in 0..8 {
            if x < 4 {
                assert_inverted(&out, &source, x, y);
            } else {
                assert_eq!(out.get(x, y), source.get(x, y), "({}, {})", x, y);
            }
        }
    }
}

#[test]
fn grunge_never_touches_the_material_mask() {
    let mut pipeline = cpu_pipeline();
    let mut cfg = quiet_config();
    let mask = RgbaImage::from_fn(8, 8, |_, y| if y < 4 { Rgba([0, 255, 0, 255]) } else { Rgba([0, 0, 0, 255]) });
    pipeline.set_material_mask(&mask).unwrap();
    pipeline.load_image(TextureChannel::Grunge, &seeded_image(8, 8, 5)).unwrap();
    cfg.channel_mut(TextureChannel::Material).grunge_weight = 1.0;

    pipeline.render_channel(TextureChannel::Material, &mut cfg).unwrap();
    assert_eq!(pipeline.read_channel(TextureChannel::Material).unwrap(), mask);
}

#[test]
fn failed_conversion_leaves_config_and_channels_alone() {
    let mut pipeline = Pipeline::with_placeholder_size(
        FailingOn {
            inner: CpuBackend::new(),
            pass: "hue_shift",
        },
        8,
        8,
    )
    .unwrap();
    let mut cfg = quiet_config();
    cfg.base_map.conversion_enabled = true;
    cfg.base_map.show_height_preview = true;
    for ch in [TextureChannel::Diffuse, TextureChannel::Height] {
        cfg.channel_mut(ch).adjustments.hue_shift = 0.25;
    }
    pipeline.load_image(TextureChannel::Normal, &textured_image(8, 8)).unwrap();
    pipeline.load_image(TextureChannel::Diffuse, &textured_image(8, 8)).unwrap();
    let normal_before = pipeline.read_channel_pixels(TextureChannel::Normal).unwrap();

    pipeline.submit(ConversionCommand::new(ConversionKind::NormalToHeight));
    assert!(pipeline.render_channel(TextureChannel::Height, &mut cfg).is_err());
    assert!(cfg.height_conversion.last_range.is_none());

    pipeline.submit(ConversionCommand::new(ConversionKind::DiffuseToOthers));
    assert!(pipeline.render_channel(TextureChannel::Diffuse, &mut cfg).is_err());
    assert!(cfg.base_map.conversion_enabled);
    assert!(cfg.base_map.show_height_preview);
    // The normal loaded above is still in place: no staged result landed.
    assert_eq!(pipeline.read_channel_pixels(TextureChannel::Normal).unwrap(), normal_before);
    assert_eq!(pipeline.read_source_pixels(TextureChannel::Normal).unwrap(), normal_before);
}

#[test]
fn failed_resize_stays_queued_until_cancelled() {
    let mut pipeline = cpu_pipeline();
    let mut cfg = quiet_config();
    pipeline.submit(ConversionCommand::new(ConversionKind::Resize(ResizeTarget::Exact {
        width: 0,
        height: 4,
    })));

    for _ in 0..2 {
        assert!(matches!(
            pipeline.render(&mut cfg),
            Err(PipelineError::InvalidInput(_))
        ));
        assert_eq!(pipeline.pending_commands(), 1);
    }
    assert_eq!(pipeline.channel_size(TextureChannel::Diffuse).unwrap(), (8, 8));

    let dropped = pipeline.cancel_front_command().unwrap();
    assert!(matches!(dropped.kind, ConversionKind::Resize(_)));
    assert_eq!(pipeline.render(&mut cfg).unwrap().mode, ConversionMode::None);
}
