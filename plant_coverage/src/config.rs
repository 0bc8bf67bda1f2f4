// THEORY:
// All tunable behavior of the pipeline lives in `CoverageConfig`. The color bands
// and kernel sizes were tuned empirically against photographs normalized to
// 640x480; at another working resolution (or under a different lighting
// profile) they need different values, so they are injected rather than baked
// into the stages. Stages read only the section that concerns them.
//
// A deployment can ship a partial JSON file: every section carries
// `#[serde(default)]`, so absent fields keep the 640x480 defaults.

use crate::core_modules::color::{Hsv, HsvRange};
use crate::error::{CoverageError, Result};
use image::imageops::FilterType;
use image::Rgb;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Interpolation used when normalizing the working resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Bilinear,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub target_width: u32,
    pub target_height: u32,
    pub filter: ResizeFilter,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            target_width: 640,
            target_height: 480,
            filter: ResizeFilter::Bilinear,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Color band of the light ring bordering the quadrat.
    pub band: HsvRange,
    /// Side of the square structuring element used for closing.
    pub close_kernel_size: u8,
    pub close_iterations: u8,
}

impl FrameConfig {
    /// Chebyshev radius equivalent to applying the square kernel
    /// `close_iterations` times.
    pub fn close_radius(&self) -> u8 {
        (self.close_kernel_size / 2).saturating_mul(self.close_iterations)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            band: HsvRange::new(Hsv::new(0, 0, 200), Hsv::new(180, 55, 255)),
            close_kernel_size: 3,
            close_iterations: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    /// Side of the median window; must be odd.
    pub median_kernel_size: u32,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            median_kernel_size: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetationConfig {
    pub band: HsvRange,
}

impl Default for VegetationConfig {
    fn default() -> Self {
        Self {
            band: HsvRange::new(Hsv::new(30, 30, 10), Hsv::new(70, 255, 255)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Left end of the text baseline.
    pub origin_x: u32,
    pub origin_y: u32,
    /// Font scale is this value divided by the text length.
    pub scale_numerator: f32,
    /// Font size in pixels at font scale 1.0.
    pub base_font_px: f32,
    /// Background margin above and below the text.
    pub padding: u32,
    pub text_color: [u8; 3],
    pub background_color: [u8; 3],
}

impl AnnotationConfig {
    pub fn text_rgb(&self) -> Rgb<u8> {
        Rgb(self.text_color)
    }

    pub fn background_rgb(&self) -> Rgb<u8> {
        Rgb(self.background_color)
    }
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            origin_x: 5,
            origin_y: 30,
            scale_numerator: 4.0,
            base_font_px: 30.0,
            padding: 5,
            text_color: [255, 255, 255],
            background_color: [0, 0, 0],
        }
    }
}

/// Configuration for the coverage pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    pub normalize: NormalizeConfig,
    pub frame: FrameConfig,
    pub area: AreaConfig,
    pub vegetation: VegetationConfig,
    pub annotation: AnnotationConfig,
}

impl CoverageConfig {
    /// Profile for the native 4000x3000 captures. The green band starts at
    /// value 80 at that resolution.
    pub fn full_resolution() -> Self {
        Self {
            normalize: NormalizeConfig {
                target_width: 4000,
                target_height: 3000,
                ..NormalizeConfig::default()
            },
            vegetation: VegetationConfig {
                band: HsvRange::new(Hsv::new(30, 30, 80), Hsv::new(70, 255, 255)),
            },
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| CoverageError::io(path, e))?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.normalize.target_width == 0 || self.normalize.target_height == 0 {
            return Err(CoverageError::Config(format!(
                "target resolution must be non-zero, got {}x{}",
                self.normalize.target_width, self.normalize.target_height
            )));
        }
        if self.frame.close_kernel_size == 0 || self.frame.close_kernel_size % 2 == 0 {
            return Err(CoverageError::Config(format!(
                "closing kernel size must be odd, got {}",
                self.frame.close_kernel_size
            )));
        }
        if self.area.median_kernel_size == 0 || self.area.median_kernel_size % 2 == 0 {
            return Err(CoverageError::Config(format!(
                "median kernel size must be odd, got {}",
                self.area.median_kernel_size
            )));
        }
        if !self.frame.band.is_well_formed() {
            return Err(CoverageError::Config("frame HSV band is inverted".into()));
        }
        if !self.vegetation.band.is_well_formed() {
            return Err(CoverageError::Config(
                "vegetation HSV band is inverted".into(),
            ));
        }
        if !(self.annotation.scale_numerator > 0.0 && self.annotation.base_font_px > 0.0) {
            return Err(CoverageError::Config(
                "annotation scale must be positive".into(),
            ));
        }
        Ok(())
    }
}
