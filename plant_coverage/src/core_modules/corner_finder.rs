// THEORY:
// Fitting a quadrilateral to the ring would need contour tracing and a polygon
// approximation that breaks down as soon as a leaf covers part of the ring.
// Instead, each corner of the *image* picks the ring pixel nearest to it. For a
// quadrat photographed roughly head-on this lands on the outer corners of the
// ring even when the frame is rotated or skewed a little, and it degrades
// gracefully when the ring is partially hidden.
//
// Distances are compared squared and in integers, so ties are exact and resolve
// to the first pixel met in row-major order.

use crate::core_modules::color::MASK_OFF;
use crate::error::{CoverageError, Result};
use image::GrayImage;

/// Integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point2D {
    pub x: u32,
    pub y: u32,
}

impl Point2D {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    fn squared_distance(&self, other: &Point2D) -> u64 {
        let dx = self.x.abs_diff(other.x) as u64;
        let dy = self.y.abs_diff(other.y) as u64;
        dx * dx + dy * dy
    }
}

/// The four frame corners, in polygon winding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CornerSet {
    pub top_left: Point2D,
    pub top_right: Point2D,
    pub bottom_right: Point2D,
    pub bottom_left: Point2D,
}

impl CornerSet {
    /// Corners as top-left, top-right, bottom-right, bottom-left.
    pub fn to_array(&self) -> [Point2D; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }
}

/// Picks, for each image corner, the nearest set pixel of the frame mask.
pub fn find_corners(frame_mask: &GrayImage) -> Result<CornerSet> {
    let (width, height) = frame_mask.dimensions();
    if width == 0 || height == 0 {
        return Err(CoverageError::DegenerateFrame);
    }

    let anchors = [
        Point2D::new(0, 0),
        Point2D::new(width - 1, 0),
        Point2D::new(width - 1, height - 1),
        Point2D::new(0, height - 1),
    ];
    let mut best: [Option<(u64, Point2D)>; 4] = [None; 4];

    for (x, y, pixel) in frame_mask.enumerate_pixels() {
        if pixel.0[0] == MASK_OFF {
            continue;
        }
        let candidate = Point2D::new(x, y);
        for (anchor, slot) in anchors.iter().zip(best.iter_mut()) {
            let distance = anchor.squared_distance(&candidate);
            if slot.is_none_or(|(closest, _)| distance < closest) {
                *slot = Some((distance, candidate));
            }
        }
    }

    match best {
        [Some((_, top_left)), Some((_, top_right)), Some((_, bottom_right)), Some((_, bottom_left))] => {
            let corners = CornerSet {
                top_left,
                top_right,
                bottom_right,
                bottom_left,
            };
            log::debug!("frame corners: {:?}", corners);
            Ok(corners)
        }
        _ => Err(CoverageError::DegenerateFrame),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::color::MASK_ON;
    use image::Luma;

    #[test]
    fn empty_mask_is_degenerate() {
        let mask = GrayImage::new(64, 48);
        assert!(matches!(
            find_corners(&mask),
            Err(CoverageError::DegenerateFrame)
        ));
    }

    #[test]
    fn axis_aligned_ring_yields_its_outer_corners() {
        let mask = GrayImage::from_fn(100, 80, |x, y| {
            let outer = (10..=90).contains(&x) && (5..=70).contains(&y);
            let inner = (15..=85).contains(&x) && (10..=65).contains(&y);
            Luma([if outer && !inner { MASK_ON } else { 0 }])
        });

        let corners = find_corners(&mask).unwrap();

        assert_eq!(corners.top_left, Point2D::new(10, 5));
        assert_eq!(corners.top_right, Point2D::new(90, 5));
        assert_eq!(corners.bottom_right, Point2D::new(90, 70));
        assert_eq!(corners.bottom_left, Point2D::new(10, 70));
    }

    #[test]
    fn diamond_vertices_tie_in_scan_order() {
        // One vertex per image edge; every anchor sees two vertices at equal distance.
        let mut mask = GrayImage::new(101, 101);
        for (x, y) in [(50, 10), (90, 50), (50, 90), (10, 50)] {
            mask.put_pixel(x, y, Luma([MASK_ON]));
        }

        let corners = find_corners(&mask).unwrap();
        let points = corners.to_array();

        assert_eq!(points[0], Point2D::new(50, 10));
        assert_eq!(points[1], Point2D::new(50, 10));
        assert_eq!(points[2], Point2D::new(90, 50));
        assert_eq!(points[3], Point2D::new(10, 50));
    }

    #[test]
    fn ties_resolve_to_first_pixel_in_scan_order() {
        let mut mask = GrayImage::new(11, 11);
        mask.put_pixel(3, 4, Luma([MASK_ON]));
        mask.put_pixel(4, 3, Luma([MASK_ON]));

        let corners = find_corners(&mask).unwrap();

        assert_eq!(corners.top_left, Point2D::new(4, 3));
    }

    #[test]
    fn corners_are_distinct_for_a_ring() {
        let mask = GrayImage::from_fn(64, 48, |x, y| {
            let on_border = x == 4 || x == 59 || y == 4 || y == 43;
            let within = (4..=59).contains(&x) && (4..=43).contains(&y);
            Luma([if on_border && within { MASK_ON } else { 0 }])
        });
        let points = find_corners(&mask).unwrap().to_array();
        for i in 0..4 {
            for j in (i + 1)..4 {
                assert_ne!(points[i], points[j]);
            }
        }
    }
}
