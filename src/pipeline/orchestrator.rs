// ============================================================================
// ORCHESTRATOR — one channel render: copy, dependency, conversion, grunge,
// UV transforms, standard chain, material masking, commit
// ============================================================================

use std::time::Instant;

use super::command::{ConversionCommand, ConversionKind, ConversionMode, ResizeTarget};
use super::frame::Frame;
use super::graph::{DependencyGraph, Origin};
use super::material::{MaterialIndex, MaterialMask};
use super::normalize::NormalizeRange;
use super::store::ChannelSlot;
use super::{Pipeline, RenderReport, basemap, enhance, height, transform};
use crate::channel::{ChannelMap, TextureChannel};
use crate::config::{BasicAdjustments, PipelineConfig};
use crate::error::{PipelineError, Result};
use crate::passes::{FilterMode, Pass, PassBackend};

/// A conversion result waiting to be installed as a channel's target and
/// source.
struct Commit<T> {
    channel: TextureChannel,
    target: T,
    source: T,
}

/// Everything a render hands back for installation.  Nothing in here touches
/// the store or the config until the whole render has succeeded.
struct Staged<T> {
    /// Raw conversion result for the rendered channel's own source.
    host_source: Option<T>,
    others: Vec<Commit<T>>,
    /// The rendered channel's buffer just before the UV transforms.
    preview_base: Option<T>,
    /// Range of a NormalToHeight reconstruction, for `last_range`.
    height_range: Option<NormalizeRange>,
    /// A diffuse decomposition ran; the base-map preview flags get cleared.
    base_map_converted: bool,
}

impl<T> Default for Staged<T> {
    fn default() -> Self {
        Self {
            host_source: None,
            others: Vec::new(),
            preview_base: None,
            height_range: None,
            base_map_converted: false,
        }
    }
}

/// Everything one render reads besides its working buffer.
struct ChannelRender<'a, B: PassBackend> {
    frame: Frame<'a, B>,
    slots: &'a ChannelMap<ChannelSlot<B::Target>>,
    material: Option<&'a MaterialMask>,
    mixer: Option<&'a B::Target>,
    ch: TextureChannel,
    drag: bool,
    picking: bool,
}

impl<B: PassBackend> Pipeline<B> {
    /// Render the active channel.
    pub fn render(&mut self, cfg: &mut PipelineConfig) -> Result<RenderReport> {
        self.render_channel(self.active, cfg)
    }

    /// Re-render `ch` from its source through the full chain.
    ///
    /// A queued command runs here when it is at the front of the queue and
    /// either hosted by `ch` or a resize.  Conversions write their results
    /// back into `cfg` (the range a height reconstruction used, the cleared
    /// base-map preview flags).  While another render holds the gate this
    /// returns a coalesced report and changes nothing.
    pub fn render_channel(&mut self, ch: TextureChannel, cfg: &mut PipelineConfig) -> Result<RenderReport> {
        let gate = self.gate.clone();
        let Some(_guard) = gate.try_enter() else {
            crate::log_debug!("Render of {} coalesced", ch);
            return Ok(RenderReport::coalesced(ch));
        };
        let started = Instant::now();
        let result = self.render_locked(ch, cfg);
        self.interactive_drag = false;
        let ms = started.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(report) if report.mode != ConversionMode::None => {
                crate::log_info!("{:?} on {} took {:.1} ms", report.mode, ch, ms);
            }
            Ok(_) => {
                crate::log_debug!("Rendered {} in {:.1} ms", ch, ms);
            }
            Err(e) => {
                crate::log_err!("Render of {} failed: {}", ch, e);
            }
        }
        result
    }

    /// Pop the front command if this render should perform it.  Commands for
    /// other channels block everything behind them.
    fn take_command(&mut self, ch: TextureChannel) -> Option<ConversionCommand> {
        let front = self.queue.front()?;
        let runs_here = match front.host_channel() {
            None => true,
            Some(host) => host == ch,
        };
        if runs_here { self.queue.pop() } else { None }
    }

    fn render_locked(&mut self, ch: TextureChannel, cfg: &mut PipelineConfig) -> Result<RenderReport> {
        self.backend.set_sampler(cfg.sampler);
        let graph = DependencyGraph::from_config(cfg)?;
        // A drag over a cached frame leaves queued commands for the next
        // regular render.
        let reuse_preview = self.interactive_drag && self.store.slots[ch].preview_base.is_some();
        let command = if reuse_preview { None } else { self.take_command(ch) };

        let mut mode = ConversionMode::None;
        let mut written: Vec<TextureChannel> = vec![ch];
        let conversion = match command {
            Some(cmd) => match cmd.kind {
                ConversionKind::Resize(target) => {
                    if let Err(e) = self.resize(target) {
                        self.queue.push_front(cmd);
                        return Err(e);
                    }
                    mode = ConversionMode::Resize;
                    written = TextureChannel::ALL.to_vec();
                    None
                }
                _ => Some(cmd),
            },
            None => None,
        };
        if let Some(cmd) = &conversion {
            mode = cmd.kind.mode();
        }

        let staged = {
            let Pipeline {
                backend,
                store,
                material,
                mixer,
                interactive_drag,
                color_picking,
                ..
            } = self;
            let mut work = store.slots[ch].target.take().ok_or(PipelineError::MissingTarget(ch))?;
            let outcome = {
                let mut render = ChannelRender {
                    frame: Frame::new(backend, &mut store.pool),
                    slots: &store.slots,
                    material: material.as_ref(),
                    mixer: mixer.as_ref(),
                    ch,
                    drag: *interactive_drag,
                    picking: *color_picking,
                };
                render.run(&mut work, cfg, &graph, conversion.as_ref())
            };
            store.slots[ch].target = Some(work);
            outcome?
        };

        let Staged {
            host_source,
            others,
            preview_base,
            height_range,
            base_map_converted,
        } = staged;
        if let Some(source) = host_source {
            self.swap_source(ch, source);
        }
        for commit in others {
            written.push(commit.channel);
            self.swap_target(commit.channel, commit.target);
            self.swap_source(commit.channel, commit.source);
        }
        if let Some(range) = height_range {
            cfg.height_conversion.last_range = Some(range);
        }
        if base_map_converted {
            cfg.base_map.conversion_enabled = false;
            cfg.base_map.show_height_preview = false;
        }

        let stale: Vec<TextureChannel> = graph.stale_after(&written).into_iter().filter(|&c| c != ch).collect();
        for &c in &stale {
            self.store.slots[c].preview_base = None;
        }
        if let Some(base) = preview_base
            && let Some(old) = self.store.slots[ch].preview_base.replace(base)
        {
            let (w, h) = self.backend.target_size(&old);
            self.store.pool.release(old, w, h);
        }
        Ok(RenderReport {
            channel: ch,
            mode,
            coalesced: false,
            stale,
            first_draw: self.store.slots[ch].first_draw,
        })
    }

    fn swap_target(&mut self, ch: TextureChannel, t: B::Target) {
        if let Some(old) = self.store.replace_target(ch, t) {
            let (w, h) = self.backend.target_size(&old);
            self.store.pool.release(old, w, h);
        }
    }

    fn swap_source(&mut self, ch: TextureChannel, t: B::Target) {
        if let Some(old) = self.store.replace_source(ch, t) {
            let (w, h) = self.backend.target_size(&old);
            self.store.pool.release(old, w, h);
        }
    }

    /// Resample every channel's source and target.  All new buffers are built
    /// before any is installed, so a failure leaves every channel as it was.
    fn resize(&mut self, target: ResizeTarget) -> Result<()> {
        let mut resized: Vec<(TextureChannel, B::Target, B::Target)> = Vec::with_capacity(TextureChannel::ALL.len());
        {
            let mut frame = Frame::new(&mut self.backend, &mut self.store.pool);
            for ch in TextureChannel::ALL {
                let slot = &self.store.slots[ch];
                let source = slot.source.as_ref().ok_or(PipelineError::MissingTarget(ch))?;
                let current = slot.target.as_ref().ok_or(PipelineError::MissingTarget(ch))?;
                let (w, h) = frame.size(source);
                let (nw, nh) = target.apply(w, h);
                if nw == 0 || nh == 0 {
                    return Err(PipelineError::InvalidInput(format!(
                        "cannot resize {} to {}x{}",
                        ch, nw, nh
                    )));
                }
                let filter = if ch == TextureChannel::Material {
                    FilterMode::Nearest
                } else {
                    FilterMode::Linear
                };
                let pass = Pass::Resample { filter };
                let new_source = frame.run_new(&pass, &[source], nw, nh)?;
                let new_target = frame.run_new(&pass, &[current], nw, nh)?;
                resized.push((ch, new_target, new_source));
            }
        }

        for (ch, t, s) in resized {
            self.store.replace_target(ch, t);
            self.store.replace_source(ch, s);
        }
        // Old buffers have the old sizes and would never be reused.
        self.store.pool.clear();

        let (mw, mh) = self.channel_size(TextureChannel::Material)?;
        self.material = self.material.as_ref().map(|m| m.resized(mw, mh));
        crate::log_info!("Resized all channels ({:?})", target);
        Ok(())
    }
}

impl<'a, B: PassBackend> ChannelRender<'a, B> {
    fn source(&self, ch: TextureChannel) -> Result<&'a B::Target> {
        let slots: &'a ChannelMap<ChannelSlot<B::Target>> = self.slots;
        slots[ch].source.as_ref().ok_or(PipelineError::MissingTarget(ch))
    }

    fn target(&self, ch: TextureChannel) -> Result<&'a B::Target> {
        let slots: &'a ChannelMap<ChannelSlot<B::Target>> = self.slots;
        slots[ch].target.as_ref().ok_or(PipelineError::MissingTarget(ch))
    }

    /// The selected material region, when a mask is loaded and the index
    /// names one of its colors.
    fn active_region(&self, cfg: &PipelineConfig) -> Option<(&'a MaterialMask, MaterialIndex, [f32; 3])> {
        let mask = self.material?;
        let index = cfg.material.active;
        let color = mask.color(index)?;
        Some((mask, index, color))
    }

    /// Swap `out` in as the working buffer.
    fn replace_work(&mut self, work: &mut B::Target, out: B::Target) {
        let old = std::mem::replace(work, out);
        self.frame.release(old);
    }

    fn run(
        &mut self,
        work: &mut B::Target,
        cfg: &PipelineConfig,
        graph: &DependencyGraph,
        conversion: Option<&ConversionCommand>,
    ) -> Result<Staged<B::Target>> {
        let ch = self.ch;
        let resolved = graph.resolve(ch);
        let slots = self.slots;

        // ---- drag preview: transform the cached pre-UV frame ---------------
        if self.drag
            && conversion.is_none()
            && let Some(base) = slots[ch].preview_base.as_ref()
        {
            self.frame.run(&Pass::Copy, &[base], work)?;
            let region_active = self.active_region(cfg).is_some();
            self.uv_transforms(work, cfg, resolved.derived_uv || region_active)?;
            return Ok(Staged::default());
        }

        let src = self.source(ch)?;
        self.frame.run(&Pass::Copy, &[src], work)?;

        // ---- dependency input ----------------------------------------------
        match resolved.origin {
            Origin::Own => {}
            Origin::Source(c) => {
                let input = self.source(c)?;
                self.frame.run(&Pass::Copy, &[input], work)?;
            }
            Origin::Output(c) => {
                let input = self.target(c)?;
                let pass = match (ch, c) {
                    (TextureChannel::Normal, TextureChannel::Height) => Pass::NormalFromHeight {
                        depth: cfg.normal_conversion.depth,
                    },
                    (TextureChannel::Occlusion, TextureChannel::Height) => height::occlusion_pass(&cfg.occlusion),
                    _ => Pass::Copy,
                };
                if matches!(pass, Pass::Occlusion { .. }) {
                    let normal = self.target(TextureChannel::Normal)?;
                    self.frame.run(&pass, &[input, normal], work)?;
                } else {
                    self.frame.run(&pass, &[input], work)?;
                }
            }
        }

        // ---- conversion ----------------------------------------------------
        let mut staged = Staged::default();
        let converting = conversion.is_some();
        if let Some(cmd) = conversion {
            self.convert(work, cfg, cmd, &mut staged)?;
        }

        let region = self.active_region(cfg);

        // ---- grunge --------------------------------------------------------
        let params = cfg.channel(ch);
        let composites = !matches!(ch, TextureChannel::Grunge | TextureChannel::Material);
        if params.grunge_weight != 0.0 && !converting && !self.drag && composites {
            let grunge = self.target(TextureChannel::Grunge)?;
            let pass = if ch.is_normal_typed() {
                Pass::GrungeNormalWarp {
                    weight: params.grunge_weight,
                    depth: cfg.grunge.normal_depth,
                }
            } else {
                Pass::OverlayBlend {
                    weight: params.grunge_weight,
                }
            };
            self.frame.apply(work, &pass, &[grunge])?;
        }

        if !self.drag {
            staged.preview_base = Some(self.frame.copy_of(work)?);
        }

        // ---- UV transforms -------------------------------------------------
        if !converting {
            self.uv_transforms(work, cfg, resolved.derived_uv || region.is_some())?;
        }

        // ---- standard chain ------------------------------------------------
        let skip = self.picking || self.slots[ch].skip_processing || self.drag || ch == TextureChannel::Material;
        let base_map_preview = cfg.base_map.conversion_enabled && !staged.base_map_converted;
        if !skip {
            match region {
                Some((mask, index, color)) => {
                    let original = self.frame.copy_of(work)?;
                    let slot = index.slot().map(|s| s as u32);
                    let adj = slot
                        .and_then(|s| params.material_overrides.get(&s))
                        .unwrap_or(&params.adjustments);
                    let chained = self.chain(work, cfg, adj, base_map_preview, Some((mask, index)));
                    let selected = match chained {
                        Ok(()) => {
                            let material = self.target(TextureChannel::Material)?;
                            self.frame.apply(work, &Pass::MaskSelect { color }, &[&original, material])
                        }
                        Err(e) => Err(e),
                    };
                    self.frame.release(original);
                    selected?;
                }
                None => self.chain(work, cfg, &params.adjustments, base_map_preview, None)?,
            }
        }

        Ok(staged)
    }

    /// Seamless tiling and perspective, unless `bypass` (derived-UV input or
    /// an active material region).  The Material channel is never warped.
    fn uv_transforms(&mut self, work: &mut B::Target, cfg: &PipelineConfig, bypass: bool) -> Result<()> {
        if bypass || self.ch == TextureChannel::Material {
            return Ok(());
        }
        let contrast = match cfg.seamless.contrast_input.channel() {
            Some(c) => Some(self.source(c)?),
            None => None,
        };
        transform::uv_transforms(&mut self.frame, work, &cfg.seamless, &cfg.perspective, contrast)
    }

    /// `base_map_preview` enables the diffuse decomposition tail.
    fn chain(
        &mut self,
        work: &mut B::Target,
        cfg: &PipelineConfig,
        adj: &BasicAdjustments,
        base_map_preview: bool,
        region: Option<(&'a MaterialMask, MaterialIndex)>,
    ) -> Result<()> {
        let ch = self.ch;
        enhance::standard_chain(&mut self.frame, work, adj, ch)?;
        match ch {
            TextureChannel::Roughness | TextureChannel::Metallic => {
                enhance::surface_filter(&mut self.frame, work, &cfg.channel(ch).surface)
            }
            TextureChannel::Normal => {
                let step = cfg.channel(ch).normal_step;
                enhance::normal_tail(&mut self.frame, work, step, &cfg.normal_mixer, self.mixer)
            }
            TextureChannel::Diffuse if base_map_preview => {
                let preview = basemap::decompose(&mut self.frame, work, &cfg.base_map)?;
                if cfg.base_map.show_height_preview {
                    let reconstructed = height::normal_to_height(&mut self.frame, &preview, &cfg.height_conversion, region);
                    self.frame.release(preview);
                    let (h, _) = reconstructed?;
                    self.replace_work(work, h);
                } else {
                    self.replace_work(work, preview);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Run `cmd` on the working buffer.  Host conversions replace `work` with
    /// their result and stage it as the host's new source; the diffuse
    /// decomposition stages results for the other channels.  Config
    /// write-backs are staged too and applied by the caller after the commit.
    fn convert(
        &mut self,
        work: &mut B::Target,
        cfg: &PipelineConfig,
        cmd: &ConversionCommand,
        staged: &mut Staged<B::Target>,
    ) -> Result<()> {
        let region = self.active_region(cfg).map(|(mask, index, _)| (mask, index));
        match cmd.kind {
            ConversionKind::HeightToNormal => {
                let h = self.target(TextureChannel::Height)?;
                let out = height::height_to_normal(&mut self.frame, h, &cfg.normal_conversion)?;
                self.replace_work(work, out);
            }
            ConversionKind::NormalToHeight => {
                let n = self.target(TextureChannel::Normal)?;
                let (out, range) = height::normal_to_height(&mut self.frame, n, &cfg.height_conversion, region)?;
                staged.height_range = Some(range);
                self.replace_work(work, out);
            }
            ConversionKind::HeightNormalToOcclusion => {
                let h = self.target(TextureChannel::Height)?;
                let n = self.target(TextureChannel::Normal)?;
                let out = height::occlusion(&mut self.frame, h, n, &cfg.occlusion)?;
                self.replace_work(work, out);
            }
            ConversionKind::DiffuseToOthers => {
                self.decompose_diffuse(work, cfg, cmd, region, staged)?;
                staged.base_map_converted = true;
                return Ok(());
            }
            ConversionKind::Resize(_) => return Ok(()),
        }
        staged.host_source = Some(self.frame.copy_of(work)?);
        Ok(())
    }

    fn decompose_diffuse(
        &mut self,
        work: &mut B::Target,
        cfg: &PipelineConfig,
        cmd: &ConversionCommand,
        region: Option<(&MaterialMask, MaterialIndex)>,
        staged: &mut Staged<B::Target>,
    ) -> Result<()> {
        use TextureChannel::*;
        let normal = basemap::decompose(&mut self.frame, work, &cfg.base_map)?;
        let (height_map, _) = height::normal_to_height(&mut self.frame, &normal, &cfg.height_conversion, region)?;
        let occlusion = height::occlusion(&mut self.frame, &height_map, &normal, &cfg.occlusion)?;

        let mut results = vec![(Normal, normal), (Height, height_map), (Occlusion, occlusion)];
        for c in [Specular, Roughness, Metallic] {
            if cmd.targets(c) {
                results.push((c, self.frame.copy_of(work)?));
            }
        }
        for (channel, target) in results {
            if !cmd.targets(channel) {
                self.frame.release(target);
                continue;
            }
            let source = self.frame.copy_of(&target)?;
            staged.others.push(Commit {
                channel,
                target,
                source,
            });
        }
        Ok(())
    }
}
