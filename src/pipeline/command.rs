// ============================================================================
// CONVERSION COMMANDS — explicit, queued replacements for a global mode flag
// ============================================================================

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::channel::TextureChannel;

/// What a render reports as its conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConversionMode {
    #[default]
    None,
    HeightToNormal,
    NormalToHeight,
    DiffuseToOthers,
    HeightNormalToOcclusion,
    Resize,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResizeTarget {
    Exact { width: u32, height: u32 },
    /// Multiply every channel's current size.
    Scale(f32),
}

impl ResizeTarget {
    /// New size for a channel of `(w, h)`, at least 1×1.
    pub fn apply(self, w: u32, h: u32) -> (u32, u32) {
        match self {
            ResizeTarget::Exact { width, height } => (width, height),
            ResizeTarget::Scale(s) => (
                ((w as f32 * s).round() as u32).max(1),
                ((h as f32 * s).round() as u32).max(1),
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConversionKind {
    HeightToNormal,
    NormalToHeight,
    DiffuseToOthers,
    HeightNormalToOcclusion,
    Resize(ResizeTarget),
}

impl ConversionKind {
    pub fn mode(self) -> ConversionMode {
        match self {
            ConversionKind::HeightToNormal => ConversionMode::HeightToNormal,
            ConversionKind::NormalToHeight => ConversionMode::NormalToHeight,
            ConversionKind::DiffuseToOthers => ConversionMode::DiffuseToOthers,
            ConversionKind::HeightNormalToOcclusion => ConversionMode::HeightNormalToOcclusion,
            ConversionKind::Resize(_) => ConversionMode::Resize,
        }
    }

    /// The channel whose render performs the conversion.  `None` for resize,
    /// which applies to every channel at once.
    pub fn host_channel(self) -> Option<TextureChannel> {
        match self {
            ConversionKind::HeightToNormal => Some(TextureChannel::Normal),
            ConversionKind::NormalToHeight => Some(TextureChannel::Height),
            ConversionKind::DiffuseToOthers => Some(TextureChannel::Diffuse),
            ConversionKind::HeightNormalToOcclusion => Some(TextureChannel::Occlusion),
            ConversionKind::Resize(_) => None,
        }
    }

    pub fn default_targets(self) -> Vec<TextureChannel> {
        use TextureChannel::*;
        match self {
            ConversionKind::HeightToNormal => vec![Normal],
            ConversionKind::NormalToHeight => vec![Height],
            ConversionKind::DiffuseToOthers => {
                vec![Normal, Height, Occlusion, Specular, Roughness, Metallic]
            }
            ConversionKind::HeightNormalToOcclusion => vec![Occlusion],
            ConversionKind::Resize(_) => TextureChannel::ALL.to_vec(),
        }
    }
}

/// One conversion to perform on the next render of its host channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionCommand {
    pub kind: ConversionKind,
    /// Channels that receive results.  Targets the conversion cannot produce
    /// are ignored.
    pub targets: Vec<TextureChannel>,
}

impl ConversionCommand {
    pub fn new(kind: ConversionKind) -> Self {
        Self {
            kind,
            targets: kind.default_targets(),
        }
    }

    pub fn with_targets(kind: ConversionKind, targets: &[TextureChannel]) -> Self {
        Self {
            kind,
            targets: targets.to_vec(),
        }
    }

    pub fn targets(&self, ch: TextureChannel) -> bool {
        self.targets.contains(&ch)
    }

    pub fn host_channel(&self) -> Option<TextureChannel> {
        self.kind.host_channel()
    }
}

/// Commands waiting for their render, oldest first.  A render consumes at
/// most one.
#[derive(Debug, Default)]
pub struct ConversionQueue {
    pending: VecDeque<ConversionCommand>,
}

impl ConversionQueue {
    pub fn push(&mut self, cmd: ConversionCommand) {
        self.pending.push_back(cmd);
    }

    pub fn front(&self) -> Option<&ConversionCommand> {
        self.pending.front()
    }

    pub fn pop(&mut self) -> Option<ConversionCommand> {
        self.pending.pop_front()
    }

    /// Put a command back at the head, e.g. after it failed to run.
    pub fn push_front(&mut self, cmd: ConversionCommand) {
        self.pending.push_front(cmd);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
