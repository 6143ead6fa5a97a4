// ============================================================================
// TEXTURE CHANNELS — the named PBR outputs and per-channel storage
// ============================================================================

use serde::{Deserialize, Serialize};

/// One of the texture outputs the pipeline derives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TextureChannel {
    Diffuse,
    Normal,
    Specular,
    Height,
    Occlusion,
    Roughness,
    Metallic,
    Material,
    Grunge,
}

pub const CHANNEL_COUNT: usize = 9;

impl TextureChannel {
    pub const ALL: [TextureChannel; CHANNEL_COUNT] = [
        TextureChannel::Diffuse,
        TextureChannel::Normal,
        TextureChannel::Specular,
        TextureChannel::Height,
        TextureChannel::Occlusion,
        TextureChannel::Roughness,
        TextureChannel::Metallic,
        TextureChannel::Material,
        TextureChannel::Grunge,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Material and Grunge sit outside the cross-channel dependency graph.
    pub fn in_dependency_graph(self) -> bool {
        !matches!(self, TextureChannel::Material | TextureChannel::Grunge)
    }

    /// Channels whose pixels are encoded normals.
    pub fn is_normal_typed(self) -> bool {
        matches!(self, TextureChannel::Normal)
    }

    /// Lower-case name used for file suffixes and log lines.
    pub fn name(self) -> &'static str {
        match self {
            TextureChannel::Diffuse => "diffuse",
            TextureChannel::Normal => "normal",
            TextureChannel::Specular => "specular",
            TextureChannel::Height => "height",
            TextureChannel::Occlusion => "occlusion",
            TextureChannel::Roughness => "roughness",
            TextureChannel::Metallic => "metallic",
            TextureChannel::Material => "material",
            TextureChannel::Grunge => "grunge",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name.to_lowercase())
    }

    /// Neutral placeholder color used before any image is loaded.
    pub fn placeholder_color(self) -> [f32; 4] {
        match self {
            TextureChannel::Normal => [0.5, 0.5, 1.0, 1.0],
            TextureChannel::Occlusion => [1.0, 1.0, 1.0, 1.0],
            TextureChannel::Metallic | TextureChannel::Material => [0.0, 0.0, 0.0, 1.0],
            _ => [0.5, 0.5, 0.5, 1.0],
        }
    }
}

impl std::fmt::Display for TextureChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a channel's pixels conceptually come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputSource {
    /// The channel's own source texture.
    #[default]
    Own,
    /// Another channel's source texture (the loaded/derived image, untransformed).
    SourceOf(TextureChannel),
    /// Another channel's render target (already processed and UV-transformed).
    OutputOf(TextureChannel),
}

/// Fixed-size map keyed by [`TextureChannel`].
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelMap<T> {
    slots: [T; CHANNEL_COUNT],
}

impl<T> ChannelMap<T> {
    pub fn from_fn(mut f: impl FnMut(TextureChannel) -> T) -> Self {
        Self {
            slots: TextureChannel::ALL.map(&mut f),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureChannel, &T)> {
        TextureChannel::ALL.into_iter().zip(self.slots.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TextureChannel, &mut T)> {
        TextureChannel::ALL.into_iter().zip(self.slots.iter_mut())
    }
}

impl<T: Default> Default for ChannelMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> std::ops::Index<TextureChannel> for ChannelMap<T> {
    type Output = T;
    fn index(&self, ch: TextureChannel) -> &T {
        &self.slots[ch.index()]
    }
}

impl<T> std::ops::IndexMut<TextureChannel> for ChannelMap<T> {
    fn index_mut(&mut self, ch: TextureChannel) -> &mut T {
        &mut self.slots[ch.index()]
    }
}
