//! 2-D float grid with binarization, morphological opening, flood fill, and
//! boundary tracing -- the detector's post-processing substrate.

use image::{GrayImage, Luma};
use imageproc::contours::find_contours;
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};
use ocr_common::geometry_types::{Point, PointF, Polygon};
use ocr_common::{OcrError, Result};

const SENTINEL_VISITED: f32 = -1.0;
const FOREGROUND: f32 = 1.0;
const BACKGROUND: f32 = 0.0;

/// A rectangular `W x H` float grid, typically a detection network's
/// per-pixel text probability map.
pub struct ReliefMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
    traced: bool,
}

impl ReliefMap {
    pub fn new(data: Vec<f32>, width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(OcrError::BadDimensions("width and height must both be positive".into()));
        }
        if data.len() != width * height {
            return Err(OcrError::BadDimensions(format!(
                "data length {} does not match {}x{}",
                data.len(),
                width,
                height
            )));
        }
        if data.iter().any(|&v| v == SENTINEL_VISITED) {
            return Err(OcrError::BadDimensions(
                "input data must not already contain the visited sentinel".into(),
            ));
        }
        Ok(Self { width, height, data, traced: false })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Cells `> threshold` become 1, everything else becomes 0.
    pub fn binarize(&mut self, threshold: f32) {
        for v in self.data.iter_mut() {
            *v = if *v > threshold { FOREGROUND } else { BACKGROUND };
        }
    }

    /// Morphological opening (erosion then dilation) with a square
    /// structuring element of side `2*radius + 1`. Removes single-pixel
    /// noise; `radius = 1` is typical.
    pub fn open(&mut self, radius: usize) {
        let k = radius.min(u8::MAX as usize) as u8;
        let mask = self.to_gray();
        let eroded = erode(&mask, Norm::LInf, k);
        let opened = dilate(&eroded, Norm::LInf, k);
        self.data = Self::from_gray(&opened);
    }

    fn to_gray(&self) -> GrayImage {
        let mut image = GrayImage::new(self.width as u32, self.height as u32);
        for (i, &v) in self.data.iter().enumerate() {
            let (x, y) = (i % self.width, i / self.width);
            image.put_pixel(x as u32, y as u32, Luma([if v > 0.0 { 255 } else { 0 }]));
        }
        image
    }

    fn from_gray(image: &GrayImage) -> Vec<f32> {
        image.pixels().map(|p| if p.0[0] > 0 { FOREGROUND } else { BACKGROUND }).collect()
    }

    /// 4-connected flood fill marking every cell reachable from `seed` along
    /// cells currently equal to 1 with the visited sentinel. No-op if the
    /// seed cell is `<= 0`.
    pub fn flood_fill(&mut self, seed: Point) {
        if seed.x < 0 || seed.y < 0 {
            return;
        }
        let (sx, sy) = (seed.x as usize, seed.y as usize);
        if sx >= self.width || sy >= self.height {
            return;
        }
        if self.data[self.index(sx, sy)] <= 0.0 {
            return;
        }

        let mut stack = vec![(sx, sy)];
        while let Some((x, y)) = stack.pop() {
            let idx = self.index(x, y);
            if self.data[idx] != FOREGROUND {
                continue;
            }
            self.data[idx] = SENTINEL_VISITED;
            if x + 1 < self.width {
                stack.push((x + 1, y));
            }
            if x > 0 {
                stack.push((x - 1, y));
            }
            if y + 1 < self.height {
                stack.push((x, y + 1));
            }
            if y > 0 {
                stack.push((x, y - 1));
            }
        }
    }

    /// Traces the 8-connected boundary of every connected foreground
    /// component via Suzuki-Abe border following. Single-use: a second call
    /// fails with [`OcrError::AlreadyTraced`].
    pub fn trace_all_boundaries(&mut self) -> Result<Vec<Polygon>> {
        if self.traced {
            return Err(OcrError::AlreadyTraced);
        }
        self.traced = true;

        let mask = self.to_gray();
        let contours = find_contours::<u32>(&mask);

        let polygons = contours
            .into_iter()
            .filter(|c| !c.points.is_empty())
            .map(|c| {
                let points: Vec<Point> =
                    c.points.iter().map(|p| Point::new(p.x as i32, p.y as i32)).collect();
                Polygon::new(points.into_iter().map(PointF::from_point).collect())
            })
            .collect();

        Ok(polygons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_square(size: usize) -> ReliefMap {
        let data = vec![1.0f32; size * size];
        ReliefMap::new(data, size, size).unwrap()
    }

    #[test]
    fn rejects_bad_dimensions() {
        assert!(matches!(ReliefMap::new(vec![1.0, 2.0], 0, 1), Err(OcrError::BadDimensions(_))));
        assert!(matches!(ReliefMap::new(vec![1.0, 2.0], 2, 2), Err(OcrError::BadDimensions(_))));
    }

    #[test]
    fn rejects_preexisting_sentinel() {
        let err = ReliefMap::new(vec![1.0, -1.0, 0.0, 0.0], 2, 2).unwrap_err();
        assert!(matches!(err, OcrError::BadDimensions(_)));
    }

    #[test]
    fn binarize_strict_greater() {
        let mut map = ReliefMap::new(vec![0.2, 0.2, 0.3, 0.1], 2, 2).unwrap();
        map.binarize(0.2);
        assert_eq!(map.data, vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn open_removes_single_pixel_noise() {
        // 5x5 grid with a lone foreground pixel at (2,2).
        let mut data = vec![0.0f32; 25];
        data[2 * 5 + 2] = 1.0;
        let mut map = ReliefMap::new(data, 5, 5).unwrap();
        map.open(1);
        assert!(map.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn flood_fill_noop_on_nonpositive_seed() {
        let mut map = filled_square(3);
        map.flood_fill(Point::new(-1, 0));
        assert!(map.data.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn trace_boundary_has_connected_vertices_and_no_duplicates() {
        let mut map = filled_square(6);
        let polygons = map.trace_all_boundaries().unwrap();
        assert_eq!(polygons.len(), 1);
        let poly = &polygons[0];

        for w in poly.points.windows(2) {
            let dx = (w[1].x - w[0].x).abs();
            let dy = (w[1].y - w[0].y).abs();
            assert!(dx <= 1.0 && dy <= 1.0 && (dx > 0.0 || dy > 0.0));
        }

        let mut seen = std::collections::HashSet::new();
        for p in &poly.points {
            assert!(seen.insert((p.x as i64, p.y as i64)), "duplicate vertex in traced boundary");
        }

        let first = poly.points[0];
        let last = *poly.points.last().unwrap();
        let cheby = (last.x - first.x).abs().max((last.y - first.y).abs());
        assert!(cheby <= 2.0);
    }

    #[test]
    fn second_trace_call_fails() {
        let mut map = filled_square(4);
        map.trace_all_boundaries().unwrap();
        assert!(matches!(map.trace_all_boundaries(), Err(OcrError::AlreadyTraced)));
    }

    fn rect_grid(size: usize, rects: &[(usize, usize, usize, usize)]) -> ReliefMap {
        let mut data = vec![0.0f32; size * size];
        for &(x0, y0, x1, y1) in rects {
            for y in y0..y1 {
                for x in x0..x1 {
                    data[y * size + x] = 1.0;
                }
            }
        }
        ReliefMap::new(data, size, size).unwrap()
    }

    proptest::proptest! {
        /// Property 5: every traced boundary of a rasterized axis-aligned
        /// rectangle (a convex polygon) in a 50x50 grid is 8-connected,
        /// duplicate-free, and closes within Chebyshev distance 2.
        #[test]
        fn boundary_trace_contract_holds_for_random_rect(
            x0 in 1usize..20, y0 in 1usize..20, w in 3usize..20, h in 3usize..20
        ) {
            let (x1, y1) = ((x0 + w).min(49), (y0 + h).min(49));
            let mut map = rect_grid(50, &[(x0, y0, x1, y1)]);
            let polygons = map.trace_all_boundaries().unwrap();
            proptest::prop_assert_eq!(polygons.len(), 1);
            let poly = &polygons[0];

            for pair in poly.points.windows(2) {
                let dx = (pair[1].x - pair[0].x).abs();
                let dy = (pair[1].y - pair[0].y).abs();
                proptest::prop_assert!(dx <= 1.0 && dy <= 1.0 && (dx > 0.0 || dy > 0.0));
            }

            let mut seen = std::collections::HashSet::new();
            for p in &poly.points {
                proptest::prop_assert!(seen.insert((p.x as i64, p.y as i64)));
            }

            let first = poly.points[0];
            let last = *poly.points.last().unwrap();
            let cheby = (last.x - first.x).abs().max((last.y - first.y).abs());
            proptest::prop_assert!(cheby <= 2.0);
        }

        /// Property 5(d): boundaries from disjoint components share no vertices.
        #[test]
        fn disjoint_rects_yield_disjoint_boundaries(
            gap in 5usize..15
        ) {
            let first = (2usize, 2usize, 10usize, 10usize);
            let second_x0 = 10 + gap;
            let second = (second_x0, 2usize, (second_x0 + 8).min(49), 10usize);
            let mut map = rect_grid(50, &[first, second]);
            let polygons = map.trace_all_boundaries().unwrap();
            proptest::prop_assert_eq!(polygons.len(), 2);

            let verts_a: std::collections::HashSet<(i64, i64)> =
                polygons[0].points.iter().map(|p| (p.x as i64, p.y as i64)).collect();
            for p in &polygons[1].points {
                proptest::prop_assert!(!verts_a.contains(&(p.x as i64, p.y as i64)));
            }
        }
    }
}
