//! Shared error taxonomy for the OCR engine core.

use thiserror::Error;

/// Errors produced by the geometric and tensor-shape primitives shared across
/// every stage of the pipeline.
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("relief map has invalid dimensions: {0}")]
    BadDimensions(String),

    #[error("image has zero width or height")]
    EmptyImage,

    #[error("tensor shape is invalid: {0}")]
    BadShape(String),

    #[error("inference failed: {0}")]
    InferenceFailed(String),

    #[error("trace_all_boundaries called more than once on the same relief map")]
    AlreadyTraced,

    #[error("token was not minted by this log-book")]
    ForeignToken,

    #[error("operation cancelled")]
    Cancelled,

    #[error("capacity exhausted: pipeline is shutting down")]
    CapacityExhausted,
}

pub type Result<T> = std::result::Result<T, OcrError>;
