//! Converts a detector model's probability map into boxed text regions in
//! original-image coordinates.

use ocr_common::{BoundingBox, OrientedRectangle, Point, PointF, Polygon, Result};
use ocr_engine_core::{convex_hull, dilate_polygon, identify_corners, min_area_rectangle, ReliefMap};

const BINARIZE_THRESHOLD: f32 = 0.2;
const OPEN_RADIUS: usize = 1;
const MIN_BOUNDARY_POINTS: usize = 10;
const DILATION_RATIO: f64 = 1.5;

#[allow(clippy::too_many_arguments)]
pub fn postprocess(
    map_data: Vec<f32>,
    map_width: usize,
    map_height: usize,
    padded_width: u32,
    padded_height: u32,
    original_width: u32,
    original_height: u32,
) -> Result<Vec<BoundingBox>> {
    let mut relief = ReliefMap::new(map_data, map_width, map_height)?;
    relief.binarize(BINARIZE_THRESHOLD);
    relief.open(OPEN_RADIUS);
    let raw_polygons = relief.trace_all_boundaries()?;

    let scale = (original_width as f64 / padded_width as f64).max(original_height as f64 / padded_height as f64);

    let mut boxes = Vec::new();
    for raw in raw_polygons {
        if raw.len() < MIN_BOUNDARY_POINTS {
            continue;
        }

        let int_points: Vec<Point> =
            raw.points.iter().map(|p| Point::new(p.x.round() as i32, p.y.round() as i32)).collect();
        let hull = convex_hull(&int_points);
        if hull.len() < 3 {
            continue;
        }

        let dilated = dilate_polygon(&hull, DILATION_RATIO);
        if dilated.is_empty() {
            continue;
        }

        let scaled_polygon = scale_polygon(&dilated, scale);
        let aa_rectangle = scaled_polygon.bounding_aarectangle();
        let oriented_corners = min_area_rectangle(&dilated).map(|p| PointF::new(p.x * scale, p.y * scale));
        let oriented_rectangle: OrientedRectangle = identify_corners(oriented_corners);

        boxes.push(BoundingBox { polygon: scaled_polygon, aa_rectangle, oriented_rectangle });
    }

    Ok(boxes)
}

fn scale_polygon(poly: &Polygon, scale: f64) -> Polygon {
    Polygon::new(poly.points.iter().map(|p| PointF::new(p.x * scale, p.y * scale)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_small_polygons_and_scales_survivors() {
        let data = vec![1.0f32; 40 * 40];
        let boxes = postprocess(data, 40, 40, 40, 40, 80, 80).unwrap();
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert!(b.aa_rectangle.width > 0.0);
        assert!(b.aa_rectangle.area() > 0.0);
    }

    #[test]
    fn all_background_yields_no_boxes() {
        let data = vec![0.0f32; 400];
        let boxes = postprocess(data, 20, 20, 20, 20, 20, 20).unwrap();
        assert!(boxes.is_empty());
    }

    #[test]
    fn tiny_noise_is_dropped_by_boundary_length_gate() {
        let mut data = vec![0.0f32; 900];
        data[30 * 15 + 15] = 1.0;
        let boxes = postprocess(data, 30, 30, 30, 30, 30, 30).unwrap();
        assert!(boxes.is_empty());
    }
}
