//! The structured result produced by the pipeline orchestrator.

use crate::geometry_types::BoundingBox;
use serde::{Deserialize, Serialize};

/// A single recognized word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub id: String,
    pub text: String,
    pub confidence: f32,
    #[serde(rename = "boundingBox")]
    pub bounding_box: BoundingBox,
}

/// A line groups one or more word ids, in left-to-right reading order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub id: String,
    pub text: String,
    pub confidence: f32,
    #[serde(rename = "boundingBox")]
    pub bounding_box: BoundingBox,
    pub word_ids: Vec<String>,
}

/// A block groups one or more line ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub text: String,
    pub confidence: f32,
    #[serde(rename = "boundingBox")]
    pub bounding_box: BoundingBox,
    pub line_ids: Vec<String>,
}

/// Final output of one pipeline read: words, the lines they were merged
/// into, and the blocks lines were grouped into.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OcrResult {
    #[serde(rename = "pageNumber")]
    pub page_number: u32,
    pub words: Vec<Word>,
    pub lines: Vec<Line>,
    pub blocks: Vec<Block>,
}

impl OcrResult {
    pub fn empty(page_number: u32) -> Self {
        Self { page_number, words: Vec::new(), lines: Vec::new(), blocks: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_serializes() {
        let result = OcrResult::empty(0);
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"pageNumber\":0"));
        let back: OcrResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.words.len(), 0);
    }
}
