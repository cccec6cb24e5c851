//! Geometric primitives shared by the relief map, geometry, and stage modules.

use serde::{Deserialize, Serialize};

/// Integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Floating pixel coordinate; used for the JSON-facing result schema, where
/// coordinates are image-pixel doubles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointF {
    pub x: f64,
    pub y: f64,
}

impl PointF {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn from_point(p: Point) -> Self {
        Self { x: p.x as f64, y: p.y as f64 }
    }
}

/// Ordered sequence of vertices. A polygon returned by the hull algorithm is
/// in strict counter-clockwise order starting at the lexicographically
/// smallest `(y, x)`, with no three consecutive collinear vertices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    pub points: Vec<PointF>,
}

impl Polygon {
    pub fn new(points: Vec<PointF>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Shoelace-formula signed area; positive for counter-clockwise polygons.
    pub fn signed_area(&self) -> f64 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let n = self.points.len();
        let mut sum = 0.0;
        for i in 0..n {
            let p0 = self.points[i];
            let p1 = self.points[(i + 1) % n];
            sum += p0.x * p1.y - p1.x * p0.y;
        }
        sum / 2.0
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn perimeter(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let n = self.points.len();
        let mut total = 0.0;
        for i in 0..n {
            let p0 = self.points[i];
            let p1 = self.points[(i + 1) % n];
            total += ((p1.x - p0.x).powi(2) + (p1.y - p0.y).powi(2)).sqrt();
        }
        total
    }

    pub fn bounding_aarectangle(&self) -> AARectangle {
        AARectangle::bounding(&self.points)
    }
}

/// Axis-aligned rectangle; `width` and `height` are non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AARectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl AARectangle {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        debug_assert!(width >= 0.0 && height >= 0.0);
        Self { x, y, width, height }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn bounding(points: &[PointF]) -> Self {
        if points.is_empty() {
            return Self { x: 0.0, y: 0.0, width: 0.0, height: 0.0 };
        }
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self { x: min_x, y: min_y, width: max_x - min_x, height: max_y - min_y }
    }
}

/// Four corners describing a (possibly rotated) quadrilateral enclosing
/// detected text. Corner 0 is the top-left of the enclosed text; corners
/// proceed TL -> TR -> BR -> BL in reading direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedRectangle {
    pub top_left: PointF,
    pub top_right: PointF,
    pub bottom_right: PointF,
    pub bottom_left: PointF,
}

impl Serialize for OrientedRectangle {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.corners().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OrientedRectangle {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let corners = <[PointF; 4]>::deserialize(deserializer)?;
        Ok(Self {
            top_left: corners[0],
            top_right: corners[1],
            bottom_right: corners[2],
            bottom_left: corners[3],
        })
    }
}

impl OrientedRectangle {
    pub fn corners(&self) -> [PointF; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    /// The logical width/height of the text the rectangle encloses (average
    /// of the two long and two short edges).
    pub fn logical_size(&self) -> (f64, f64) {
        let width = (dist(self.top_left, self.top_right) + dist(self.bottom_left, self.bottom_right)) / 2.0;
        let height = (dist(self.top_left, self.bottom_left) + dist(self.top_right, self.bottom_right)) / 2.0;
        (width, height)
    }
}

fn dist(a: PointF, b: PointF) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// The same detected region at three fidelity levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub polygon: Polygon,
    #[serde(rename = "aarectangle")]
    pub aa_rectangle: AARectangle,
    #[serde(rename = "orectangle")]
    pub oriented_rectangle: OrientedRectangle,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Polygon {
        Polygon::new(vec![
            PointF::new(0.0, 0.0),
            PointF::new(4.0, 0.0),
            PointF::new(4.0, 4.0),
            PointF::new(0.0, 4.0),
        ])
    }

    #[test]
    fn square_area_and_perimeter() {
        let sq = square();
        assert_eq!(sq.area(), 16.0);
        assert_eq!(sq.perimeter(), 16.0);
    }

    #[test]
    fn bounding_rect_matches_square() {
        let aar = square().bounding_aarectangle();
        assert_eq!(aar, AARectangle::new(0.0, 0.0, 4.0, 4.0));
    }
}
