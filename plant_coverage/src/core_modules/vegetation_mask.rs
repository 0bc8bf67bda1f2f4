use crate::config::VegetationConfig;
use crate::core_modules::color;
use image::{GrayImage, RgbImage};

/// Marks green, vegetation-colored pixels over the whole image.
///
/// The band is resolution-sensitive: the default one is tuned for 640x480 and
/// `CoverageConfig::full_resolution` carries the one for native captures.
pub fn extract_vegetation_mask(image: &RgbImage, config: &VegetationConfig) -> GrayImage {
    let mask = color::in_range(image, &config.band);
    log::debug!("vegetation mask: {} pixels", color::count_set(&mask));
    mask
}
