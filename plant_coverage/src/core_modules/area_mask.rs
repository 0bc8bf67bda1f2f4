// THEORY:
// The measurement region is "inside the frame, minus the frame". The polygon
// through the four corners covers the ring and everything it encloses; XOR with
// the ring mask then cuts the ring out. Where the ring is ragged the XOR leaves
// single-pixel slivers along its inner edge, which the median pass removes.

use crate::config::AreaConfig;
use crate::core_modules::color::{MASK_OFF, MASK_ON};
use crate::core_modules::corner_finder::CornerSet;
use crate::error::{CoverageError, Result};
use image::{GrayImage, Luma, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_polygon_mut};
use imageproc::filter::median_filter;
use imageproc::point::Point;

/// Builds the binary mask of the sample area enclosed by the frame.
pub fn build_area_mask(
    image: &RgbImage,
    frame_mask: &GrayImage,
    corners: &CornerSet,
    config: &AreaConfig,
) -> Result<GrayImage> {
    if image.dimensions() != frame_mask.dimensions() {
        return Err(CoverageError::invalid_image(
            "frame mask",
            format!(
                "mask is {:?} but image is {:?}",
                frame_mask.dimensions(),
                image.dimensions()
            ),
        ));
    }

    let mut area = GrayImage::new(image.width(), image.height());
    fill_corners(&mut area, corners);

    for (target, ring) in area.pixels_mut().zip(frame_mask.pixels()) {
        target.0[0] ^= ring.0[0];
    }

    let radius = config.median_kernel_size / 2;
    Ok(median_filter(&area, radius, radius))
}

/// Fills the corner polygon, falling back to a segment or a single pixel when
/// the corners collapse onto each other.
fn fill_corners(canvas: &mut GrayImage, corners: &CornerSet) {
    let mut polygon: Vec<Point<i32>> = Vec::with_capacity(4);
    for corner in corners.to_array() {
        let point = Point::new(corner.x as i32, corner.y as i32);
        if polygon.last() != Some(&point) {
            polygon.push(point);
        }
    }
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }

    let on = Luma([MASK_ON]);
    match polygon.as_slice() {
        [] => {}
        [single] => canvas.put_pixel(single.x as u32, single.y as u32, on),
        [start, end] => draw_line_segment_mut(
            canvas,
            (start.x as f32, start.y as f32),
            (end.x as f32, end.y as f32),
            on,
        ),
        _ => draw_polygon_mut(canvas, &polygon, on),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::color::count_set;
    use crate::core_modules::corner_finder::{Point2D, find_corners};

    fn ring_mask(width: u32, height: u32, outer: (u32, u32, u32, u32), thickness: u32) -> GrayImage {
        let (left, top, right, bottom) = outer;
        GrayImage::from_fn(width, height, |x, y| {
            let in_outer = (left..=right).contains(&x) && (top..=bottom).contains(&y);
            let in_inner = (left + thickness..=right - thickness).contains(&x)
                && (top + thickness..=bottom - thickness).contains(&y);
            Luma([if in_outer && !in_inner { MASK_ON } else { MASK_OFF }])
        })
    }

    #[test]
    fn interior_is_kept_and_ring_is_removed() {
        let frame = ring_mask(120, 90, (10, 10, 109, 79), 6);
        let image = RgbImage::new(120, 90);
        let corners = find_corners(&frame).unwrap();

        let area = build_area_mask(&image, &frame, &corners, &AreaConfig::default()).unwrap();

        assert_eq!(area.get_pixel(60, 45).0[0], MASK_ON);
        assert_eq!(area.get_pixel(12, 45).0[0], MASK_OFF);
        assert_eq!(area.get_pixel(5, 5).0[0], MASK_OFF);
        assert_eq!(area.get_pixel(18, 18).0[0], MASK_ON);
        assert_eq!(area.get_pixel(16, 16).0[0], MASK_OFF);
        // 88x58 interior, minus three pixels the median takes off each corner.
        assert_eq!(count_set(&area), 88 * 58 - 4 * 3);
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let frame = GrayImage::new(10, 10);
        let image = RgbImage::new(12, 10);
        let corners = CornerSet {
            top_left: Point2D::new(0, 0),
            top_right: Point2D::new(9, 0),
            bottom_right: Point2D::new(9, 9),
            bottom_left: Point2D::new(0, 9),
        };
        let err = build_area_mask(&image, &frame, &corners, &AreaConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "invalid_image");
    }

    #[test]
    fn collapsed_corners_do_not_panic() {
        let mut frame = GrayImage::new(20, 20);
        frame.put_pixel(7, 7, Luma([MASK_ON]));
        let image = RgbImage::new(20, 20);
        let corners = find_corners(&frame).unwrap();

        let area = build_area_mask(&image, &frame, &corners, &AreaConfig::default()).unwrap();

        assert_eq!(count_set(&area), 0);
    }

    #[test]
    fn frame_covering_the_whole_polygon_leaves_no_area() {
        let frame = GrayImage::from_pixel(32, 24, Luma([MASK_ON]));
        let image = RgbImage::new(32, 24);
        let corners = find_corners(&frame).unwrap();

        let area = build_area_mask(&image, &frame, &corners, &AreaConfig::default()).unwrap();

        assert_eq!(count_set(&area), 0);
    }
}
