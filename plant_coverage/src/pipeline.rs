// THEORY:
// The `pipeline` module is the top-level API of the coverage engine. It composes
// the core stages into one stateless call:
//
//   normalize -> frame mask -> corners -> area mask ─┐
//            └-> vegetation mask ─────────────────────┴-> coverage -> annotate
//
// Inputs arrive either as a file on disk or as a raster already in memory (a
// live camera frame). Both are resolved to a raster once, at the entry point,
// and then travel the exact same path. No state is kept between calls, so the
// same input always gives the same percentage and the same pixels.

use crate::config::CoverageConfig;
use crate::core_modules::annotator::annotate;
use crate::core_modules::area_mask::build_area_mask;
use crate::core_modules::corner_finder::find_corners;
use crate::core_modules::coverage::{Percentage, compute_coverage};
use crate::core_modules::frame_mask::extract_frame_mask;
use crate::core_modules::normalizer::normalize;
use crate::core_modules::utils::image_helper::load_rgb;
use crate::core_modules::vegetation_mask::extract_vegetation_mask;
use crate::error::Result;
use image::RgbImage;
use std::path::PathBuf;

// Re-export key data structures for the public API.
pub use crate::core_modules::corner_finder::{CornerSet, Point2D};

/// Where a raster comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    File(PathBuf),
    Buffer(RgbImage),
}

impl ImageSource {
    fn into_raster(self) -> Result<RgbImage> {
        match self {
            ImageSource::File(path) => load_rgb(&path),
            ImageSource::Buffer(raster) => Ok(raster),
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::File(path)
    }
}

impl From<RgbImage> for ImageSource {
    fn from(raster: RgbImage) -> Self {
        ImageSource::Buffer(raster)
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone)]
pub struct CoverageResult {
    /// Vegetation share of the measurement area, 0..=100.
    pub percentage: Percentage,
    /// The masked image with the percentage stamped on it.
    pub annotated_image: RgbImage,
    /// Original pixels where vegetation was counted, black elsewhere.
    pub masked_image: RgbImage,
    /// Frame corners in the normalized image.
    pub corners: CornerSet,
}

impl CoverageResult {
    /// The label stamped on the annotated image.
    pub fn label(&self) -> String {
        format_percentage(self.percentage)
    }
}

pub fn format_percentage(percentage: Percentage) -> String {
    format!("{:.2}%", percentage)
}

/// Stateless coverage engine bound to one configuration.
#[derive(Debug, Clone, Default)]
pub struct CoveragePipeline {
    config: CoverageConfig,
}

impl CoveragePipeline {
    pub fn new(config: CoverageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CoverageConfig {
        &self.config
    }

    pub fn process(&self, source: impl Into<ImageSource>) -> Result<CoverageResult> {
        process_image(source.into(), &self.config)
    }
}

/// Runs the whole pipeline on one image.
pub fn process_image(source: ImageSource, config: &CoverageConfig) -> Result<CoverageResult> {
    // Stage 1: Canonical geometry
    let image = normalize(source.into_raster()?, &config.normalize)?;

    // Stage 2: Measurement area
    let frame_mask = extract_frame_mask(&image, &config.frame);
    let corners = find_corners(&frame_mask)?;
    let area_mask = build_area_mask(&image, &frame_mask, &corners, &config.area)?;

    // Stage 3: Vegetation
    let vegetation_mask = extract_vegetation_mask(&image, &config.vegetation);

    // Stage 4: Coverage and label
    let (masked_image, percentage) = compute_coverage(&image, &area_mask, &vegetation_mask)?;
    let annotated_image = annotate(
        &masked_image,
        &format_percentage(percentage),
        &config.annotation,
    )?;

    Ok(CoverageResult {
        percentage,
        annotated_image,
        masked_image,
        corners,
    })
}
