// THEORY:
// Coverage is the share of the measurement area that is vegetation. The area
// mask is the denominator, the vegetation pixels inside it the numerator. The
// intersection is also rendered as an image (original colors where counted,
// black elsewhere) so a person can check at a glance what was measured.
//
// An empty area has no meaningful share. It is reported as `DegenerateArea`
// instead of letting a division by zero turn into NaN in the results file.

use crate::core_modules::color::MASK_OFF;
use crate::error::{CoverageError, Result};
use image::{GrayImage, RgbImage};

pub type Percentage = f64;

/// Intersects the area and vegetation masks over `image`.
///
/// Returns the masked image and the vegetation percentage of the area.
pub fn compute_coverage(
    image: &RgbImage,
    area_mask: &GrayImage,
    vegetation_mask: &GrayImage,
) -> Result<(RgbImage, Percentage)> {
    let dimensions = image.dimensions();
    if area_mask.dimensions() != dimensions || vegetation_mask.dimensions() != dimensions {
        return Err(CoverageError::invalid_image(
            "coverage masks",
            format!(
                "image is {:?}, area mask {:?}, vegetation mask {:?}",
                dimensions,
                area_mask.dimensions(),
                vegetation_mask.dimensions()
            ),
        ));
    }

    let mut masked = RgbImage::new(dimensions.0, dimensions.1);
    let mut area_pixels = 0usize;
    let mut vegetation_pixels = 0usize;

    for (((source, target), area), vegetation) in image
        .pixels()
        .zip(masked.pixels_mut())
        .zip(area_mask.pixels())
        .zip(vegetation_mask.pixels())
    {
        if area.0[0] == MASK_OFF {
            continue;
        }
        area_pixels += 1;
        if area.0[0] & vegetation.0[0] != MASK_OFF {
            *target = *source;
            if source.0.iter().any(|&channel| channel != 0) {
                vegetation_pixels += 1;
            }
        }
    }

    if area_pixels == 0 {
        return Err(CoverageError::DegenerateArea);
    }

    let percentage = vegetation_pixels as Percentage * 100.0 / area_pixels as Percentage;
    log::debug!(
        "coverage: {} of {} area pixels ({:.2}%)",
        vegetation_pixels,
        area_pixels,
        percentage
    );
    Ok((masked, percentage))
}
