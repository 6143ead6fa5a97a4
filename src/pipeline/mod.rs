// ============================================================================
// TEXTURE DERIVATION PIPELINE — per-channel orchestration over a PassBackend
// ============================================================================
//
//   store.rs      — render target + source per channel
//   pool.rs       — scratch buffers keyed by size
//   frame.rs      — backend + pool for one render, ping-pong `apply`
//   graph.rs      — channel input dependencies, derived-UV short-circuit
//   command.rs    — conversion commands and their FIFO queue
//   gate.rs       — re-entrancy guard
//   material.rs   — material mask palette + index image
//   normalize.rs  — CPU-side range statistics
//   basemap.rs    — color → normal decomposition over four octaves
//   height.rs     — height ↔ normal, occlusion
//   transform.rs  — seamless tiling and perspective
//   enhance.rs    — standard per-channel chain and tails
//   orchestrator.rs — the render state machine
// ============================================================================

pub mod basemap;
pub mod command;
pub mod enhance;
pub mod frame;
pub mod gate;
pub mod graph;
pub mod height;
pub mod material;
pub mod normalize;
mod orchestrator;
pub mod pool;
pub mod store;
pub mod transform;

use image::RgbaImage;

pub use command::{ConversionCommand, ConversionKind, ConversionMode, ConversionQueue, ResizeTarget};
pub use gate::RenderGate;
pub use material::{MATERIAL_LIMIT, MaterialIndex, MaterialMask};
pub use normalize::NormalizeRange;

use crate::buffer::PixelBuffer;
use crate::channel::TextureChannel;
use crate::error::Result;
use crate::passes::PassBackend;
use store::{RenderTargetStore, placeholder_pair, upload_pair};

/// Size of the placeholder images every channel starts with.
pub const PLACEHOLDER_SIZE: u32 = 256;

/// Outcome of one render call.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderReport {
    pub channel: TextureChannel,
    pub mode: ConversionMode,
    /// The render found another one in progress and did nothing.
    pub coalesced: bool,
    /// Channels whose render targets no longer reflect their inputs: channels
    /// written by a conversion plus everything depending on them or on the
    /// rendered channel.
    pub stale: Vec<TextureChannel>,
    /// The rendered channel had a freshly loaded image.
    pub first_draw: bool,
}

impl RenderReport {
    fn coalesced(channel: TextureChannel) -> Self {
        Self {
            channel,
            mode: ConversionMode::None,
            coalesced: true,
            stale: Vec::new(),
            first_draw: false,
        }
    }
}

/// The stateful derivation core.  One instance owns every channel's buffers
/// on one backend; the caller owns the [`crate::config::PipelineConfig`].
pub struct Pipeline<B: PassBackend> {
    backend: B,
    store: RenderTargetStore<B::Target>,
    queue: ConversionQueue,
    material: Option<MaterialMask>,
    mixer: Option<B::Target>,
    gate: RenderGate,
    active: TextureChannel,
    interactive_drag: bool,
    color_picking: bool,
}

impl<B: PassBackend> Pipeline<B> {
    pub fn new(backend: B) -> Result<Self> {
        Self::with_placeholder_size(backend, PLACEHOLDER_SIZE, PLACEHOLDER_SIZE)
    }

    pub fn with_placeholder_size(mut backend: B, width: u32, height: u32) -> Result<Self> {
        let store = RenderTargetStore::with_placeholders(&mut backend, width, height)?;
        crate::log_info!(
            "Pipeline ready on {} backend ({}x{} placeholders)",
            backend.name(),
            width,
            height
        );
        Ok(Self {
            backend,
            store,
            queue: ConversionQueue::default(),
            material: None,
            mixer: None,
            gate: RenderGate::new(),
            active: TextureChannel::Diffuse,
            interactive_drag: false,
            color_picking: false,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Drop every buffer and hand the backend back for another pipeline.
    pub fn into_backend(self) -> B {
        self.backend
    }

    // ========================================================================
    // TRIGGERS
    // ========================================================================

    pub fn active_channel(&self) -> TextureChannel {
        self.active
    }

    pub fn select_channel(&mut self, ch: TextureChannel) {
        self.active = ch;
    }

    /// Queue a conversion.  It runs on the next render of its host channel
    /// (any render for a resize), after every earlier command.
    pub fn submit(&mut self, command: ConversionCommand) {
        crate::log_debug!("Queued {:?} ({} pending)", command.kind, self.queue.len());
        self.queue.push(command);
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    /// Drop the command at the head of the queue, e.g. a resize that keeps
    /// failing and would otherwise block everything behind it.
    pub fn cancel_front_command(&mut self) -> Option<ConversionCommand> {
        let cmd = self.queue.pop();
        if let Some(c) = &cmd {
            crate::log_warn!("Cancelled {:?}", c.kind);
        }
        cmd
    }

    pub fn set_skip_processing(&mut self, ch: TextureChannel, skip: bool) {
        self.store.slots[ch].skip_processing = skip;
    }

    /// The next render only previews the UV transforms: it re-transforms the
    /// channel's last pre-transform buffer (or recomputes steps 1 to 3 when
    /// none is cached) and skips grunge and the standard chain.
    pub fn begin_interactive_drag(&mut self) {
        self.interactive_drag = true;
    }

    /// While armed, the standard chain is skipped so picked colors come from
    /// the unprocessed image.
    pub fn arm_color_picking(&mut self, armed: bool) {
        self.color_picking = armed;
    }

    /// Handle on the re-entrancy guard, for schedulers living elsewhere.
    pub fn gate(&self) -> RenderGate {
        self.gate.clone()
    }

    // ========================================================================
    // IMAGES IN
    // ========================================================================

    /// Install `img` as `ch`'s source and target.  The channel takes the
    /// image's size.  Material images go through [`Pipeline::set_material_mask`].
    pub fn load_image(&mut self, ch: TextureChannel, img: &RgbaImage) -> Result<()> {
        if ch == TextureChannel::Material {
            return self.set_material_mask(img).map(|_| ());
        }
        let pixels = PixelBuffer::from_rgba8(img)?;
        self.install(ch, &pixels)?;
        self.store.slots[ch].first_draw = true;
        crate::log_info!("Loaded {}x{} image into {}", img.width(), img.height(), ch);
        Ok(())
    }

    fn install(&mut self, ch: TextureChannel, pixels: &PixelBuffer) -> Result<()> {
        let (target, source) = upload_pair(&mut self.backend, pixels)?;
        self.store.replace_target(ch, target);
        self.store.replace_source(ch, source);
        Ok(())
    }

    /// Secondary normal image blended by the Normal channel's mixer tail.
    pub fn set_normal_mixer_image(&mut self, img: &RgbaImage) -> Result<()> {
        let pixels = PixelBuffer::from_rgba8(img)?;
        let mut target = self.backend.create_target(img.width(), img.height())?;
        self.backend.upload(&mut target, &pixels)?;
        self.mixer = Some(target);
        Ok(())
    }

    /// Validate and install a material mask.  Returns the number of regions.
    /// A mask with more than [`MATERIAL_LIMIT`] colors is rejected and nothing
    /// changes.
    pub fn set_material_mask(&mut self, img: &RgbaImage) -> Result<usize> {
        let mask = match MaterialMask::from_image(img) {
            Ok(m) => m,
            Err(e) => {
                crate::log_warn!("Material mask rejected: {}", e);
                return Err(e);
            }
        };
        let pixels = PixelBuffer::from_rgba8(&mask.to_image())?;
        self.install(TextureChannel::Material, &pixels)?;
        self.store.slots[TextureChannel::Material].first_draw = true;
        let regions = mask.len();
        self.material = Some(mask);
        crate::log_info!("Material mask set ({} regions)", regions);
        Ok(regions)
    }

    /// Remove the mask; the Material channel returns to its placeholder.
    pub fn clear_material_mask(&mut self) -> Result<()> {
        let (w, h) = self.channel_size(TextureChannel::Material)?;
        let (target, source) = placeholder_pair(&mut self.backend, TextureChannel::Material, w, h)?;
        self.store.replace_target(TextureChannel::Material, target);
        self.store.replace_source(TextureChannel::Material, source);
        self.material = None;
        Ok(())
    }

    pub fn material_mask(&self) -> Option<&MaterialMask> {
        self.material.as_ref()
    }

    // ========================================================================
    // IMAGES OUT
    // ========================================================================

    pub fn channel_size(&self, ch: TextureChannel) -> Result<(u32, u32)> {
        Ok(self.backend.target_size(self.store.target(ch)?))
    }

    pub fn read_channel_pixels(&mut self, ch: TextureChannel) -> Result<PixelBuffer> {
        let target = self.store.target(ch)?;
        self.backend.read_back(target)
    }

    pub fn read_channel(&mut self, ch: TextureChannel) -> Result<RgbaImage> {
        Ok(self.read_channel_pixels(ch)?.to_rgba8())
    }

    pub fn read_source_pixels(&mut self, ch: TextureChannel) -> Result<PixelBuffer> {
        let source = self.store.source(ch)?;
        self.backend.read_back(source)
    }

    /// Returns the first-draw flag of `ch` once, then `false` until the next
    /// image load.
    pub fn take_first_draw(&mut self, ch: TextureChannel) -> bool {
        std::mem::take(&mut self.store.slots[ch].first_draw)
    }
}
