// ============================================================================
// GPU TARGET — Rgba16Float render target wrapper + readback row layout
// ============================================================================

/// Storage format of every render target.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Bytes per texel of [`TARGET_FORMAT`].
pub const TEXEL_BYTES: u32 = 8;

/// A pass input/output living on the device.
pub struct GpuTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl GpuTarget {
    /// Readable as a sampled texture, writable as storage, and copyable both
    /// ways for uploads and readbacks.
    pub fn new(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    /// Overwrite the whole texture with tightly packed half-float texels.
    pub fn write(&self, queue: &wgpu::Queue, texels: &[u8]) {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            texels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(TEXEL_BYTES * self.width),
                rows_per_image: Some(self.height),
            },
            self.extent(),
        );
    }
}

/// Row pitch of a texture-to-buffer copy: `width * 8` rounded up to
/// `COPY_BYTES_PER_ROW_ALIGNMENT`.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * TEXEL_BYTES;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Drop the per-row padding of a mapped readback buffer.
pub fn strip_row_padding(mapped: &[u8], width: u32, height: u32, padded_row: u32) -> Vec<u8> {
    let row = (width * TEXEL_BYTES) as usize;
    let padded_row = padded_row as usize;
    let mut out = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * padded_row;
        out.extend_from_slice(&mapped[start..start + row]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_256_bytes() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(32), 256);
        assert_eq!(padded_bytes_per_row(33), 512);
    }

    #[test]
    fn padding_is_stripped_per_row() {
        let padded = padded_bytes_per_row(2) as usize;
        let mut mapped = vec![0xAAu8; padded * 2];
        for (i, b) in mapped[..16].iter_mut().enumerate() {
            *b = i as u8;
        }
        for (i, b) in mapped[padded..padded + 16].iter_mut().enumerate() {
            *b = 100 + i as u8;
        }
        let out = strip_row_padding(&mapped, 2, 2, padded as u32);
        assert_eq!(out.len(), 32);
        assert_eq!(out[15], 15);
        assert_eq!(out[16], 100);
        assert!(!out.contains(&0xAA));
    }
}
