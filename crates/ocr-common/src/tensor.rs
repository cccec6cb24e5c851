//! The tensor handed between pipeline stages and the inference runner.

use crate::error::{OcrError, Result};

/// A contiguous float buffer plus its integer shape.
///
/// Ownership is exclusive to whoever currently holds the `Tensor`; it is
/// moved across stage boundaries, never shared behind a reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Vec<i64>,
}

impl Tensor {
    pub fn new(data: Vec<f32>, shape: Vec<i64>) -> Result<Self> {
        if shape.is_empty() {
            return Err(OcrError::BadShape("shape must have at least one dimension".into()));
        }
        let expected: i64 = shape.iter().product();
        if expected < 0 || expected as usize != data.len() {
            return Err(OcrError::BadShape(format!(
                "data length {} does not match shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self { data, shape })
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    /// Returns a copy of `shape` with a leading batch dimension of 1 prepended.
    pub fn with_leading_batch(shape: &[i64]) -> Vec<i64> {
        let mut batched = Vec::with_capacity(shape.len() + 1);
        batched.push(1);
        batched.extend_from_slice(shape);
        batched
    }

    /// Strips a leading batch dimension, asserting it was exactly 1.
    pub fn strip_leading_batch(shape: &[i64]) -> Result<Vec<i64>> {
        match shape.split_first() {
            Some((1, rest)) => Ok(rest.to_vec()),
            Some((n, _)) => Err(OcrError::BadShape(format!(
                "expected leading batch dimension of 1, got {n}"
            ))),
            None => Err(OcrError::BadShape("empty output shape".into())),
        }
    }
}
