// THEORY (Color Bands):
// Both color classifiers of the pipeline (the silver frame ring and the green
// vegetation) are band tests in hue/saturation/value space. HSV separates "what
// color" from "how bright", which is what makes a fixed band hold up under the
// uneven lighting of field photographs.
//
// The conversion follows the 8-bit convention that the empirically tuned bands
// were measured in:
// - value (V):      max(R, G, B), 0..255
// - saturation (S): chroma / V scaled to 0..255, 0 for black
// - hue (H):        angle on the color wheel in degrees, halved into 0..180 so it
//                   fits a byte; 0 for achromatic pixels
//
// Single-pixel scope: nothing here reads neighbors. Masks are produced by
// applying the band test to every pixel independently.

use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

pub type Channel = u8;
pub type Hue = u8;
pub type Saturation = u8;
pub type Value = u8;

/// Mask value marking a selected pixel.
pub const MASK_ON: u8 = u8::MAX;
/// Mask value marking an unselected pixel.
pub const MASK_OFF: u8 = 0;

/// Upper bound of the byte-scaled hue channel.
pub const HUE_MAX: Hue = 180;

/// A pixel in 8-bit hue/saturation/value form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Hsv {
    pub hue: Hue,
    pub saturation: Saturation,
    pub value: Value,
}

impl Hsv {
    pub const fn new(hue: Hue, saturation: Saturation, value: Value) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }

    /// Converts one RGB pixel.
    ///
    /// When two channels tie for the maximum, red wins over green and green
    /// over blue when picking the hue sector.
    pub fn from_rgb(red: Channel, green: Channel, blue: Channel) -> Self {
        let maximum_channel = red.max(green).max(blue);
        let minimum_channel = red.min(green).min(blue);
        let chroma = (maximum_channel - minimum_channel) as f32;

        let saturation = if maximum_channel == 0 {
            0
        } else {
            (chroma * 255.0 / maximum_channel as f32).round() as Saturation
        };

        if chroma <= 0.0 {
            return Self::new(0, saturation, maximum_channel);
        }

        let (red, green, blue) = (red as f32, green as f32, blue as f32);
        let (base_difference, sector_offset) = if maximum_channel as f32 == red {
            (green - blue, 0.0)
        } else if maximum_channel as f32 == green {
            (blue - red, 60.0)
        } else {
            (red - green, 120.0)
        };

        // Rounded in half-degrees first, then wrapped, so hues just below 0
        // land on 0 rather than 180.
        let half_degrees = (30.0 * base_difference / chroma + sector_offset).round() as i32;
        let hue = half_degrees.rem_euclid(i32::from(HUE_MAX)) as Hue;

        Self::new(hue, saturation, maximum_channel)
    }
}

/// An inclusive box in HSV space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl HsvRange {
    pub const fn new(lower: Hsv, upper: Hsv) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.lower.hue..=self.upper.hue).contains(&hsv.hue)
            && (self.lower.saturation..=self.upper.saturation).contains(&hsv.saturation)
            && (self.lower.value..=self.upper.value).contains(&hsv.value)
    }

    /// True when every lower bound is at or below its upper bound and the hue
    /// stays on the byte-scaled wheel.
    pub fn is_well_formed(&self) -> bool {
        self.lower.hue <= self.upper.hue
            && self.upper.hue <= HUE_MAX
            && self.lower.saturation <= self.upper.saturation
            && self.lower.value <= self.upper.value
    }
}

/// Marks with `MASK_ON` every pixel whose HSV form falls inside `range`.
pub fn in_range(image: &RgbImage, range: &HsvRange) -> GrayImage {
    let mut mask = GrayImage::new(image.width(), image.height());
    for (source, target) in image.pixels().zip(mask.pixels_mut()) {
        let [red, green, blue] = source.0;
        if range.contains(Hsv::from_rgb(red, green, blue)) {
            *target = Luma([MASK_ON]);
        }
    }
    mask
}

/// Number of pixels set in a mask.
pub fn count_set(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] != MASK_OFF).count()
}
