//! Merges detected word boxes into lines using the anisotropic-distance
//! neighbour test, then wraps every line into a single page-level block.
//!
//! This is the merge strategy named by the pipeline's wiring: two
//! candidate strategies exist in principle (anisotropic-distance and simple
//! horizontal proximity), and this is the one actually composed here.

use ocr_common::{AARectangle, Block, BoundingBox, Line, OcrResult, Polygon, Word};
use ocr_engine_core::{convex_hull, identify_corners, min_area_rectangle};

const HORIZONTAL_WEIGHT: f64 = 0.67;
const VERTICAL_WEIGHT: f64 = 2.0;
const DISTANCE_THRESHOLD: f64 = 1.0;
const MIDLINE_FACTOR: f64 = 2.0;

/// One detected-and-recognized word, prior to line/block assembly.
pub struct RecognizedWord {
    pub bounding_box: BoundingBox,
    pub text: String,
    pub confidence: f32,
}

fn midline(aa: &AARectangle) -> f64 {
    aa.y + aa.height / 2.0
}

fn horizontal_gap(a: &AARectangle, b: &AARectangle) -> f64 {
    let a_right = a.x + a.width;
    let b_right = b.x + b.width;
    if a_right < b.x {
        b.x - a_right
    } else if b_right < a.x {
        a.x - b_right
    } else {
        0.0
    }
}

fn vertical_gap(a: &AARectangle, b: &AARectangle) -> f64 {
    let a_bottom = a.y + a.height;
    let b_bottom = b.y + b.height;
    if a_bottom < b.y {
        b.y - a_bottom
    } else if b_bottom < a.y {
        a.y - b_bottom
    } else {
        0.0
    }
}

fn mergeable(a: &AARectangle, b: &AARectangle) -> bool {
    let max_height = a.height.max(b.height).max(1e-6);
    if (midline(a) - midline(b)).abs() > MIDLINE_FACTOR * max_height {
        return false;
    }

    let gx = horizontal_gap(a, b) * HORIZONTAL_WEIGHT / max_height;
    let gy = vertical_gap(a, b) * VERTICAL_WEIGHT / max_height;
    (gx * gx + gy * gy).sqrt() <= DISTANCE_THRESHOLD
}

/// Groups word indices into connected components under the anisotropic
/// mergeability test via depth-first search over the implicit adjacency
/// graph.
fn group_into_lines(words: &[RecognizedWord]) -> Vec<Vec<usize>> {
    let n = words.len();
    let mut visited = vec![false; n];
    let mut groups = Vec::new();

    for start in 0..n {
        if visited[start] {
            continue;
        }
        let mut stack = vec![start];
        let mut component = Vec::new();
        visited[start] = true;
        while let Some(i) = stack.pop() {
            component.push(i);
            for j in 0..n {
                if !visited[j] && mergeable(&words[i].bounding_box.aa_rectangle, &words[j].bounding_box.aa_rectangle) {
                    visited[j] = true;
                    stack.push(j);
                }
            }
        }
        component.sort_by(|&a, &b| {
            words[a].bounding_box.aa_rectangle.x.partial_cmp(&words[b].bounding_box.aa_rectangle.x).unwrap()
        });
        groups.push(component);
    }

    groups
}

fn union_bounding_box(members: &[&BoundingBox]) -> BoundingBox {
    let all_points: Vec<_> = members.iter().flat_map(|b| b.polygon.points.iter().copied()).collect();
    let union_polygon = Polygon::new(all_points);
    let aa_rectangle = union_polygon.bounding_aarectangle();

    let int_points: Vec<ocr_common::Point> =
        union_polygon.points.iter().map(|p| ocr_common::Point::new(p.x.round() as i32, p.y.round() as i32)).collect();
    let hull = convex_hull(&int_points);
    let oriented_rectangle = if hull.len() >= 3 {
        identify_corners(min_area_rectangle(&hull))
    } else {
        identify_corners([
            ocr_common::PointF::new(aa_rectangle.x, aa_rectangle.y),
            ocr_common::PointF::new(aa_rectangle.x + aa_rectangle.width, aa_rectangle.y),
            ocr_common::PointF::new(aa_rectangle.x + aa_rectangle.width, aa_rectangle.y + aa_rectangle.height),
            ocr_common::PointF::new(aa_rectangle.x, aa_rectangle.y + aa_rectangle.height),
        ])
    };

    BoundingBox { polygon: union_polygon, aa_rectangle, oriented_rectangle }
}

/// Assembles words, lines (anisotropic-merged), and a single page-level
/// block into the final structured result.
pub fn assemble(page_number: u32, recognized: Vec<RecognizedWord>) -> OcrResult {
    if recognized.is_empty() {
        return OcrResult::empty(page_number);
    }

    let groups = group_into_lines(&recognized);

    let mut words = Vec::with_capacity(recognized.len());
    for (i, w) in recognized.iter().enumerate() {
        words.push(Word {
            id: format!("w{i}"),
            text: w.text.clone(),
            confidence: w.confidence,
            bounding_box: w.bounding_box.clone(),
        });
    }

    let mut lines = Vec::with_capacity(groups.len());
    let mut all_line_ids = Vec::with_capacity(groups.len());
    for (line_idx, group) in groups.iter().enumerate() {
        let line_id = format!("l{line_idx}");
        let text = group.iter().map(|&i| recognized[i].text.as_str()).collect::<Vec<_>>().join(" ");
        let confidence = group.iter().map(|&i| recognized[i].confidence).sum::<f32>() / group.len() as f32;
        let member_boxes: Vec<&BoundingBox> = group.iter().map(|&i| &recognized[i].bounding_box).collect();
        let bounding_box = union_bounding_box(&member_boxes);
        let word_ids: Vec<String> = group.iter().map(|&i| format!("w{i}")).collect();

        lines.push(Line { id: line_id.clone(), text, confidence, bounding_box, word_ids });
        all_line_ids.push(line_id);
    }

    let block_boxes: Vec<&BoundingBox> = lines.iter().map(|l| &l.bounding_box).collect();
    let block_bounding_box = union_bounding_box(&block_boxes);
    let block_text = lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join(" ");
    let block_confidence = lines.iter().map(|l| l.confidence).sum::<f32>() / lines.len().max(1) as f32;

    let blocks = vec![Block {
        id: "b0".to_string(),
        text: block_text,
        confidence: block_confidence,
        bounding_box: block_bounding_box,
        line_ids: all_line_ids,
    }];

    OcrResult { page_number, words, lines, blocks }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ocr_common::{OrientedRectangle, PointF};

    fn word_at(x: f64, y: f64, w: f64, h: f64, text: &str) -> RecognizedWord {
        let aa = AARectangle::new(x, y, w, h);
        let polygon = Polygon::new(vec![
            PointF::new(x, y),
            PointF::new(x + w, y),
            PointF::new(x + w, y + h),
            PointF::new(x, y + h),
        ]);
        let oriented_rectangle = OrientedRectangle {
            top_left: PointF::new(x, y),
            top_right: PointF::new(x + w, y),
            bottom_right: PointF::new(x + w, y + h),
            bottom_left: PointF::new(x, y + h),
        };
        RecognizedWord {
            bounding_box: BoundingBox { polygon, aa_rectangle: aa, oriented_rectangle },
            text: text.to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn nearby_same_line_words_merge_left_to_right() {
        let words = vec![word_at(100.0, 0.0, 40.0, 20.0, "WORLD"), word_at(0.0, 0.0, 40.0, 20.0, "HELLO")];
        let result = assemble(1, words);
        assert_eq!(result.lines.len(), 1);
        assert_eq!(result.lines[0].text, "HELLO WORLD");
    }

    #[test]
    fn distant_words_stay_in_separate_lines() {
        let words = vec![word_at(0.0, 0.0, 40.0, 20.0, "HELLO"), word_at(0.0, 500.0, 40.0, 20.0, "WORLD")];
        let result = assemble(1, words);
        assert_eq!(result.lines.len(), 2);
    }

    #[test]
    fn empty_input_yields_empty_result() {
        let result = assemble(3, vec![]);
        assert_eq!(result.page_number, 3);
        assert!(result.words.is_empty());
        assert!(result.lines.is_empty());
        assert!(result.blocks.is_empty());
    }
}
