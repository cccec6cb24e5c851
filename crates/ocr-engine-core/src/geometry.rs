//! Convex hull, polygon dilation, and oriented-rectangle cropping.

use ocr_common::geometry_types::{AARectangle, OrientedRectangle, Point, PointF, Polygon};
use ocr_common::{OcrError, Result};

/// Strict convex hull via Graham scan. Fewer than 3 distinct input points
/// yields an empty polygon; a collinear input yields a single point, the
/// lexicographic minimum by `(y, x)`. The returned hull's vertices are in
/// strict counter-clockwise order starting at that minimum.
pub fn convex_hull(points: &[Point]) -> Polygon {
    let mut distinct: Vec<Point> = points.to_vec();
    distinct.sort_by_key(|p| (p.y, p.x));
    distinct.dedup();

    if distinct.len() < 3 {
        return Polygon::default();
    }

    let p0 = distinct[0];
    let p1 = distinct[1];
    let all_collinear = distinct[2..].iter().all(|&p| cross(p0, p1, p) == 0);
    if all_collinear {
        return Polygon::new(vec![PointF::from_point(p0)]);
    }

    let pivot = distinct[0];
    let mut rest: Vec<Point> = distinct[1..].to_vec();
    rest.sort_by(|&a, &b| {
        let c = cross(pivot, a, b);
        if c > 0 {
            std::cmp::Ordering::Less
        } else if c < 0 {
            std::cmp::Ordering::Greater
        } else {
            dist_squared(pivot, b).cmp(&dist_squared(pivot, a))
        }
    });

    let mut stack: Vec<Point> = vec![pivot];
    for p in rest {
        while stack.len() >= 2 {
            let n = stack.len();
            if cross(stack[n - 2], stack[n - 1], p) <= 0 {
                stack.pop();
            } else {
                break;
            }
        }
        stack.push(p);
    }

    Polygon::new(stack.into_iter().map(PointF::from_point).collect())
}

fn cross(o: Point, a: Point, b: Point) -> i64 {
    let ax = (a.x - o.x) as i64;
    let ay = (a.y - o.y) as i64;
    let bx = (b.x - o.x) as i64;
    let by = (b.y - o.y) as i64;
    ax * by - ay * bx
}

fn dist_squared(a: Point, b: Point) -> i64 {
    let dx = (a.x - b.x) as i64;
    let dy = (a.y - b.y) as i64;
    dx * dx + dy * dy
}

/// Default dilation ratio used when callers don't override it.
pub const DEFAULT_DILATION_RATIO: f64 = 1.5;

/// Offsets `poly` outward by `d = area * ratio / perimeter`, using round
/// joins sampled finely enough that no straight segment exceeds one pixel.
/// Empty input, area `< 9`, or non-positive perimeter all yield an empty
/// polygon.
pub fn dilate_polygon(poly: &Polygon, ratio: f64) -> Polygon {
    if poly.len() < 3 {
        return Polygon::default();
    }
    let area = poly.area();
    let perimeter = poly.perimeter();
    if area < 9.0 || perimeter <= 0.0 {
        return Polygon::default();
    }

    let offset = area * ratio / perimeter;
    offset_polygon(poly, offset)
}

fn outward_normal(a: PointF, b: PointF) -> (f64, f64) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        return (0.0, 0.0);
    }
    (dy / len, -dx / len)
}

fn offset_polygon(poly: &Polygon, offset: f64) -> Polygon {
    let n = poly.points.len();
    let mut result = Vec::with_capacity(n * 2);

    for i in 0..n {
        let prev = poly.points[(i + n - 1) % n];
        let curr = poly.points[i];
        let next = poly.points[(i + 1) % n];

        let normal_in = outward_normal(prev, curr);
        let normal_out = outward_normal(curr, next);

        let edge_end = PointF::new(curr.x + normal_in.0 * offset, curr.y + normal_in.1 * offset);
        let edge_start = PointF::new(curr.x + normal_out.0 * offset, curr.y + normal_out.1 * offset);

        result.push(edge_end);
        add_round_join(&mut result, curr, normal_in, normal_out, offset);
        result.push(edge_start);
    }

    Polygon::new(result)
}

fn add_round_join(out: &mut Vec<PointF>, center: PointF, n0: (f64, f64), n1: (f64, f64), radius: f64) {
    if radius <= 0.0 {
        return;
    }
    let angle0 = n0.1.atan2(n0.0);
    let angle1_raw = n1.1.atan2(n1.0);
    let mut delta = angle1_raw - angle0;
    let two_pi = 2.0 * std::f64::consts::PI;
    while delta <= -std::f64::consts::PI {
        delta += two_pi;
    }
    while delta > std::f64::consts::PI {
        delta -= two_pi;
    }

    let max_step = if radius > 0.5 { (1.0 / radius).min(std::f64::consts::FRAC_PI_2) } else { std::f64::consts::FRAC_PI_2 };
    let steps = ((delta.abs() / max_step).ceil() as usize).max(1);

    for i in 1..steps {
        let t = i as f64 / steps as f64;
        let angle = angle0 + delta * t;
        out.push(PointF::new(center.x + radius * angle.cos(), center.y + radius * angle.sin()));
    }
}

/// Minimum-area bounding rectangle of a convex polygon via rotating
/// calipers: for every hull edge, projects all vertices onto that edge's
/// direction and its perpendicular, and keeps the candidate rectangle with
/// the smallest area. Returned corners are not yet in reading order -- pass
/// them through [`identify_corners`] for that.
pub fn min_area_rectangle(hull: &Polygon) -> [PointF; 4] {
    let pts = &hull.points;
    if pts.len() < 3 {
        let aa = hull.bounding_aarectangle();
        return [
            PointF::new(aa.x, aa.y),
            PointF::new(aa.x + aa.width, aa.y),
            PointF::new(aa.x + aa.width, aa.y + aa.height),
            PointF::new(aa.x, aa.y + aa.height),
        ];
    }

    let n = pts.len();
    let mut best_area = f64::INFINITY;
    let mut best_corners = [pts[0]; 4];

    for i in 0..n {
        let p1 = pts[i];
        let p2 = pts[(i + 1) % n];
        let (ex, ey) = (p2.x - p1.x, p2.y - p1.y);
        let len = (ex * ex + ey * ey).sqrt();
        if len == 0.0 {
            continue;
        }
        let (ux, uy) = (ex / len, ey / len);
        let (vx, vy) = (-uy, ux);

        let mut min_u = f64::INFINITY;
        let mut max_u = f64::NEG_INFINITY;
        let mut min_v = f64::INFINITY;
        let mut max_v = f64::NEG_INFINITY;
        for p in pts {
            let (dx, dy) = (p.x - p1.x, p.y - p1.y);
            let u = dx * ux + dy * uy;
            let v = dx * vx + dy * vy;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let area = (max_u - min_u) * (max_v - min_v);
        if area < best_area {
            best_area = area;
            let corner = |u: f64, v: f64| PointF::new(p1.x + u * ux + v * vx, p1.y + u * uy + v * vy);
            best_corners = [
                corner(min_u, min_v),
                corner(max_u, min_v),
                corner(max_u, max_v),
                corner(min_u, max_v),
            ];
        }
    }

    best_corners
}

/// Identifies reading-direction corners from four corners given in any
/// cyclic or reversed order. Top-left is the corner with the smallest
/// `x + y`; top-right is the neighbour (in whichever direction) whose edge
/// from top-left best aligns with the positive-x axis.
pub fn identify_corners(corners: [PointF; 4]) -> OrientedRectangle {
    let top_left_idx = (0..4)
        .min_by(|&a, &b| {
            let sa = corners[a].x + corners[a].y;
            let sb = corners[b].x + corners[b].y;
            sa.partial_cmp(&sb).unwrap()
        })
        .unwrap();

    let next_idx = (top_left_idx + 1) % 4;
    let prev_idx = (top_left_idx + 3) % 4;
    let tl = corners[top_left_idx];

    let align = |idx: usize| -> f64 {
        let c = corners[idx];
        let (dx, dy) = (c.x - tl.x, c.y - tl.y);
        let len = (dx * dx + dy * dy).sqrt().max(1e-9);
        dx / len
    };

    let (top_right_idx, step): (usize, i32) =
        if align(next_idx) >= align(prev_idx) { (next_idx, 1) } else { (prev_idx, -1) };

    let bottom_right_idx = ((top_right_idx as i32 + step).rem_euclid(4)) as usize;
    let bottom_left_idx = ((bottom_right_idx as i32 + step).rem_euclid(4)) as usize;

    OrientedRectangle {
        top_left: tl,
        top_right: corners[top_right_idx],
        bottom_right: corners[bottom_right_idx],
        bottom_left: corners[bottom_left_idx],
    }
}

fn lerp(a: PointF, b: PointF, t: f64) -> PointF {
    PointF::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

/// Crops and un-rotates the content of `rect` out of `image`, producing an
/// output buffer at the rectangle's logical (un-rotated) size, reading
/// left-to-right top-to-bottom.
pub fn crop_oriented_rectangle(
    image: &image::RgbImage,
    rect: &OrientedRectangle,
) -> Result<image::RgbImage> {
    let (w, h) = rect.logical_size();
    let out_w = w.round().max(1.0) as u32;
    let out_h = h.round().max(1.0) as u32;
    if out_w == 0 || out_h == 0 {
        return Err(OcrError::EmptyImage);
    }

    let mut out = image::RgbImage::new(out_w, out_h);
    for oy in 0..out_h {
        let v = oy as f64 / out_h as f64;
        let left = lerp(rect.top_left, rect.bottom_left, v);
        let right = lerp(rect.top_right, rect.bottom_right, v);
        for ox in 0..out_w {
            let u = ox as f64 / out_w as f64;
            let p = lerp(left, right, u);
            let (sx, sy) = (p.x.round() as i64, p.y.round() as i64);
            let pixel = if sx >= 0 && sy >= 0 && (sx as u32) < image.width() && (sy as u32) < image.height() {
                *image.get_pixel(sx as u32, sy as u32)
            } else {
                image::Rgb([0, 0, 0])
            };
            out.put_pixel(ox, oy, pixel);
        }
    }
    Ok(out)
}

/// Axis-aligned bounding rectangle of an oriented rectangle's four corners.
pub fn oriented_to_aa(rect: &OrientedRectangle) -> AARectangle {
    AARectangle::bounding(&rect.corners())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: i32, y: i32) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn fewer_than_three_points_is_empty() {
        assert!(convex_hull(&[pt(0, 0), pt(1, 1)]).is_empty());
    }

    #[test]
    fn collinear_points_yield_lex_min_single_point() {
        let hull = convex_hull(&[pt(3, 0), pt(1, 0), pt(2, 0), pt(0, 0)]);
        assert_eq!(hull.len(), 1);
        assert_eq!(hull.points[0], PointF::new(0.0, 0.0));
    }

    #[test]
    fn square_hull_is_ccw_from_lex_min() {
        let square = [pt(0, 0), pt(4, 0), pt(4, 4), pt(0, 4), pt(2, 2)];
        let hull = convex_hull(&square);
        assert_eq!(hull.len(), 4);
        assert_eq!(hull.points[0], PointF::new(0.0, 0.0));
        assert!(hull.signed_area() > 0.0);
    }

    #[test]
    fn hull_is_idempotent() {
        let square = [pt(0, 0), pt(4, 0), pt(4, 4), pt(0, 4)];
        let hull = convex_hull(&square);
        let int_points: Vec<Point> =
            hull.points.iter().map(|p| Point::new(p.x.round() as i32, p.y.round() as i32)).collect();
        let hull2 = convex_hull(&int_points);
        assert_eq!(hull.points, hull2.points);
    }

    #[test]
    fn dilation_rejects_small_area() {
        let tiny = Polygon::new(vec![
            PointF::new(0.0, 0.0),
            PointF::new(1.0, 0.0),
            PointF::new(1.0, 1.0),
        ]);
        assert!(dilate_polygon(&tiny, 1.5).is_empty());
    }

    #[test]
    fn dilation_increases_bounding_area_monotonically() {
        let square = Polygon::new(vec![
            PointF::new(0.0, 0.0),
            PointF::new(10.0, 0.0),
            PointF::new(10.0, 10.0),
            PointF::new(0.0, 10.0),
        ]);
        let small = dilate_polygon(&square, 0.5).bounding_aarectangle().area();
        let large = dilate_polygon(&square, 2.0).bounding_aarectangle().area();
        assert!(large >= small);
    }

    #[test]
    fn min_area_rectangle_of_axis_aligned_square_is_itself() {
        let hull = Polygon::new(vec![
            PointF::new(0.0, 0.0),
            PointF::new(10.0, 0.0),
            PointF::new(10.0, 10.0),
            PointF::new(0.0, 10.0),
        ]);
        let corners = min_area_rectangle(&hull);
        let rect = identify_corners(corners);
        assert_eq!(rect.top_left, PointF::new(0.0, 0.0));
        assert_eq!(rect.top_right, PointF::new(10.0, 0.0));
    }

    #[test]
    fn corner_identification_is_order_independent() {
        let corners = [
            PointF::new(0.0, 0.0),
            PointF::new(10.0, 0.0),
            PointF::new(10.0, 5.0),
            PointF::new(0.0, 5.0),
        ];
        let forward = identify_corners(corners);
        let reversed = [corners[0], corners[3], corners[2], corners[1]];
        let rotated_reversed = identify_corners(reversed);
        assert_eq!(forward.top_left, rotated_reversed.top_left);
        assert_eq!(forward.top_right, rotated_reversed.top_right);
    }

    proptest::proptest! {
        /// Property 7: for any point cloud with >= 3 non-collinear points,
        /// the hull is strictly CCW and starts at the lexicographic minimum.
        #[test]
        fn hull_of_random_cloud_is_ccw_from_lex_min(
            raw_points in proptest::collection::vec((0i32..50, 0i32..50), 3..40)
        ) {
            let points: Vec<Point> = raw_points.iter().map(|&(x, y)| pt(x, y)).collect();
            let hull = convex_hull(&points);
            if hull.len() >= 3 {
                proptest::prop_assert!(hull.signed_area() > 0.0);
                let lex_min = points.iter().min_by_key(|p| (p.y, p.x)).unwrap();
                proptest::prop_assert_eq!(hull.points[0], PointF::from_point(*lex_min));
            }
        }

        /// Property 8: hull(hull(P)) == hull(P).
        #[test]
        fn hull_is_idempotent_for_random_cloud(
            raw_points in proptest::collection::vec((0i32..50, 0i32..50), 3..40)
        ) {
            let points: Vec<Point> = raw_points.iter().map(|&(x, y)| pt(x, y)).collect();
            let hull = convex_hull(&points);
            let int_points: Vec<Point> =
                hull.points.iter().map(|p| Point::new(p.x.round() as i32, p.y.round() as i32)).collect();
            let hull2 = convex_hull(&int_points);
            proptest::prop_assert_eq!(hull.points, hull2.points);
        }

        /// Property 9: increasing the dilation ratio never shrinks the
        /// bounding-box area of the result.
        #[test]
        fn dilation_area_is_monotonic_in_ratio(
            w in 5.0f64..50.0, h in 5.0f64..50.0, r1 in 0.1f64..3.0, r2 in 0.1f64..3.0
        ) {
            let square = Polygon::new(vec![
                PointF::new(0.0, 0.0),
                PointF::new(w, 0.0),
                PointF::new(w, h),
                PointF::new(0.0, h),
            ]);
            let (lo, hi) = if r1 <= r2 { (r1, r2) } else { (r2, r1) };
            let small = dilate_polygon(&square, lo).bounding_aarectangle().area();
            let large = dilate_polygon(&square, hi).bounding_aarectangle().area();
            proptest::prop_assert!(large >= small - 1e-6);
        }
    }
}
