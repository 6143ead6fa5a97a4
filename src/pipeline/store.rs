// ============================================================================
// RENDER TARGET STORE — one render target + source per channel, plus scratch
// ============================================================================

use super::pool::ScratchPool;
use crate::buffer::PixelBuffer;
use crate::channel::{ChannelMap, TextureChannel};
use crate::error::{PipelineError, Result};
use crate::passes::PassBackend;

/// Per-channel state.  `target` is `None` only while the channel is being
/// rendered (it is moved into the render as the working buffer).
pub struct ChannelSlot<T> {
    pub target: Option<T>,
    pub source: Option<T>,
    pub skip_processing: bool,
    pub first_draw: bool,
    /// Buffer of the last regular render just before its UV transforms.  An
    /// interactive drag re-transforms this instead of recomputing the input.
    /// Dropped whenever the channel's target or source is replaced.
    pub preview_base: Option<T>,
}

impl<T> ChannelSlot<T> {
    fn empty() -> Self {
        Self {
            target: None,
            source: None,
            skip_processing: false,
            first_draw: false,
            preview_base: None,
        }
    }
}

pub struct RenderTargetStore<T> {
    pub slots: ChannelMap<ChannelSlot<T>>,
    pub pool: ScratchPool<T>,
}

impl<T> RenderTargetStore<T> {
    /// Every channel gets a `width × height` placeholder source and target in
    /// its neutral color.
    pub fn with_placeholders<B>(backend: &mut B, width: u32, height: u32) -> Result<Self>
    where
        B: PassBackend<Target = T>,
    {
        let mut slots = ChannelMap::from_fn(|_| ChannelSlot::empty());
        for ch in TextureChannel::ALL {
            let (target, source) = placeholder_pair(backend, ch, width, height)?;
            slots[ch].target = Some(target);
            slots[ch].source = Some(source);
        }
        Ok(Self {
            slots,
            pool: ScratchPool::new(),
        })
    }

    pub fn target(&self, ch: TextureChannel) -> Result<&T> {
        self.slots[ch].target.as_ref().ok_or(PipelineError::MissingTarget(ch))
    }

    pub fn source(&self, ch: TextureChannel) -> Result<&T> {
        self.slots[ch].source.as_ref().ok_or(PipelineError::MissingTarget(ch))
    }

    pub fn take_target(&mut self, ch: TextureChannel) -> Result<T> {
        self.slots[ch].target.take().ok_or(PipelineError::MissingTarget(ch))
    }

    pub fn put_target(&mut self, ch: TextureChannel, target: T) {
        self.slots[ch].target = Some(target);
    }

    /// Install a new target, returning the previous one.
    pub fn replace_target(&mut self, ch: TextureChannel, target: T) -> Option<T> {
        self.slots[ch].preview_base = None;
        self.slots[ch].target.replace(target)
    }

    pub fn replace_source(&mut self, ch: TextureChannel, source: T) -> Option<T> {
        self.slots[ch].preview_base = None;
        self.slots[ch].source.replace(source)
    }
}

/// Source and target filled with `ch`'s placeholder color.
pub fn placeholder_pair<B: PassBackend>(
    backend: &mut B,
    ch: TextureChannel,
    width: u32,
    height: u32,
) -> Result<(B::Target, B::Target)> {
    let pixels = PixelBuffer::filled(width, height, ch.placeholder_color())?;
    upload_pair(backend, &pixels)
}

/// Two independent backend buffers holding `pixels`.
pub fn upload_pair<B: PassBackend>(backend: &mut B, pixels: &PixelBuffer) -> Result<(B::Target, B::Target)> {
    let (w, h) = pixels.dimensions();
    let mut a = backend.create_target(w, h)?;
    backend.upload(&mut a, pixels)?;
    let mut b = backend.create_target(w, h)?;
    backend.upload(&mut b, pixels)?;
    Ok((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::CpuBackend;

    #[test]
    fn placeholders_use_neutral_colors() {
        let mut backend = CpuBackend::new();
        let store = RenderTargetStore::with_placeholders(&mut backend, 4, 4).unwrap();
        let normal = store.target(TextureChannel::Normal).unwrap();
        assert_eq!(normal.get(0, 0), [0.5, 0.5, 1.0, 1.0]);
        let occ = store.source(TextureChannel::Occlusion).unwrap();
        assert_eq!(occ.get(3, 3), [1.0; 4]);
    }

    #[test]
    fn replacing_buffers_drops_the_drag_preview() {
        let mut backend = CpuBackend::new();
        let mut store = RenderTargetStore::with_placeholders(&mut backend, 2, 2).unwrap();
        store.slots[TextureChannel::Diffuse].preview_base = Some(PixelBuffer::new(2, 2).unwrap());
        store.replace_source(TextureChannel::Diffuse, PixelBuffer::new(2, 2).unwrap());
        assert!(store.slots[TextureChannel::Diffuse].preview_base.is_none());
    }

    #[test]
    fn taken_target_is_reported_missing() {
        let mut backend = CpuBackend::new();
        let mut store = RenderTargetStore::with_placeholders(&mut backend, 2, 2).unwrap();
        let t = store.take_target(TextureChannel::Height).unwrap();
        assert!(matches!(
            store.target(TextureChannel::Height),
            Err(PipelineError::MissingTarget(TextureChannel::Height))
        ));
        store.put_target(TextureChannel::Height, t);
        assert!(store.target(TextureChannel::Height).is_ok());
    }
}
