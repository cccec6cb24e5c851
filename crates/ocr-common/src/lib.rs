//! Shared types and error taxonomy for the OCR engine.

pub mod error;
pub mod geometry_types;
pub mod result;
pub mod tensor;

pub use error::{OcrError, Result};
pub use geometry_types::{AARectangle, BoundingBox, OrientedRectangle, Point, PointF, Polygon};
pub use result::{Block, Line, OcrResult, Word};
pub use tensor::Tensor;
