// THEORY:
// The first stage puts every photograph into the same geometry before any
// heuristic looks at it. The corner search in the `corner_finder` measures
// against the corners of the image itself, and the color bands and kernel sizes
// were tuned at one working resolution, so both orientation and size have to be
// canonical. Portrait captures are turned landscape with a clockwise quarter
// turn, then the raster is resampled to the configured target size.

use crate::config::NormalizeConfig;
use crate::error::{CoverageError, Result};
use image::RgbImage;
use image::imageops;

/// Rotates portrait images to landscape and resamples to the target size.
///
/// An image already landscape and at the target size comes back unchanged.
pub fn normalize(image: RgbImage, config: &NormalizeConfig) -> Result<RgbImage> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(CoverageError::invalid_image(
            "raster",
            format!("empty image {}x{}", width, height),
        ));
    }

    let oriented = if height > width {
        imageops::rotate90(&image)
    } else {
        image
    };

    if oriented.dimensions() == (config.target_width, config.target_height) {
        return Ok(oriented);
    }

    log::debug!(
        "resizing {}x{} -> {}x{}",
        oriented.width(),
        oriented.height(),
        config.target_width,
        config.target_height
    );
    Ok(imageops::resize(
        &oriented,
        config.target_width,
        config.target_height,
        config.filter.into(),
    ))
}
