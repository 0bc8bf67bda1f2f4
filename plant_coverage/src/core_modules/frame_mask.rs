// THEORY:
// The sampling quadrat is bordered by a light, nearly colorless ring. This stage
// turns that ring into a binary mask.
//
// 1. Band test: bright, low-saturation pixels of any hue are ring candidates.
// 2. Otsu on the band mask, inverted. The cutoff is picked from the data, and
//    inversion makes the background the foreground for the next step.
// 3. Closing on the inverted mask removes ring candidates narrower than the
//    closing radius (glare specks on leaves), and inverting once more brings
//    the ring back to 255.

use crate::config::FrameConfig;
use crate::core_modules::color;
use image::{GrayImage, RgbImage, imageops};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;

/// Marks candidate frame-ring pixels with 255.
pub fn extract_frame_mask(image: &RgbImage, config: &FrameConfig) -> GrayImage {
    let band_mask = color::in_range(image, &config.band);

    let level = otsu_level(&band_mask);
    let background = threshold(&band_mask, level, ThresholdType::BinaryInverted);
    let mut closed = close(&background, Norm::LInf, config.close_radius());

    imageops::invert(&mut closed);
    log::debug!(
        "frame mask: otsu level {}, {} ring pixels",
        level,
        color::count_set(&closed)
    );
    closed
}
