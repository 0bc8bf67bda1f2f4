use crate::error::{CoverageError, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::path::{Path, PathBuf};

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Decodes any format the `image` crate understands into an RGB raster.
pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    let decoded = image::open(path)
        .map_err(|e| CoverageError::invalid_image(path.display().to_string(), e))?;
    Ok(decoded.to_rgb8())
}

/// Encodes in memory before touching `path`, so a failed encode leaves no
/// partial file behind.
pub fn save_jpeg(path: &Path, image: &RgbImage, quality: u8) -> Result<()> {
    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, quality)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|source| CoverageError::Encode {
            path: path.to_path_buf(),
            source,
        })?;

    std::fs::write(path, encoded).map_err(|e| CoverageError::io(path, e))
}

pub fn is_jpeg(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("jpg"))
}

/// JPEG files of a directory (non-recursive, sorted by name), or the file
/// itself when `source` is a single JPEG.
pub fn list_jpegs(source: &Path) -> Result<Vec<PathBuf>> {
    if source.is_dir() {
        let entries = std::fs::read_dir(source).map_err(|e| CoverageError::io(source, e))?;
        let mut images: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && is_jpeg(path))
            .collect();
        images.sort();
        return Ok(images);
    }

    if source.is_file() && is_jpeg(source) {
        return Ok(vec![source.to_path_buf()]);
    }

    Err(CoverageError::invalid_image(
        source.display().to_string(),
        "not a JPG file or a directory",
    ))
}
