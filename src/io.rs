// ============================================================================
// IMAGE I/O — decoding inputs and writing derived channel maps
// ============================================================================

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageError, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::channel::TextureChannel;

/// Extensions the decoder is built for (see the `image` features in
/// Cargo.toml).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "tga", "tif", "tiff"];

pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// Decode any supported file to 8-bit RGBA.
pub fn load_image_sync(path: &Path) -> Result<RgbaImage, String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if !is_supported_extension(&ext) {
        return Err(format!("unsupported image type '{}'", ext));
    }
    let img = image::open(path).map_err(|e| e.to_string())?;
    Ok(img.to_rgba8())
}

/// Write `image` as an RGBA8 PNG.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<(), ImageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    PngEncoder::new(&mut writer).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(())
}

/// `<dir>/<stem>_<channel>.png`, with `dir` defaulting to the input's parent.
pub fn channel_output_path(input: &Path, output_dir: Option<&Path>, channel: TextureChannel) -> Option<PathBuf> {
    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let dir = match output_dir {
        Some(d) => d.to_path_buf(),
        None => input.parent().unwrap_or(Path::new(".")).to_path_buf(),
    };
    Some(dir.join(format!("{}_{}.png", stem, channel.name())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_carry_the_channel() {
        let p = channel_output_path(Path::new("maps/brick.jpg"), None, TextureChannel::Normal);
        assert_eq!(p, Some(PathBuf::from("maps/brick_normal.png")));
        let p = channel_output_path(Path::new("brick.png"), Some(Path::new("out")), TextureChannel::Height);
        assert_eq!(p, Some(PathBuf::from("out/brick_height.png")));
    }

    #[test]
    fn unknown_extensions_are_rejected_before_decoding() {
        assert!(is_supported_extension("JPG"));
        assert!(!is_supported_extension("psd"));
        assert!(load_image_sync(Path::new("missing.psd")).is_err());
    }

    #[test]
    fn png_round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("mapforge_io_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tile.png");
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(2, 1, image::Rgba([10, 20, 30, 255]));
        save_png(&img, &path).unwrap();
        let back = load_image_sync(&path).unwrap();
        assert_eq!(back, img);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
