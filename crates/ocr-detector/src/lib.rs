//! Detection stage: pre-processing, inference, and post-processing composed
//! around a single cached model session.

pub mod postprocess;
pub mod preprocess;

use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use ocr_common::{BoundingBox, Result};
use ocr_engine_core::{InferenceRunner, LogBook, Tunable};

pub use postprocess::postprocess as postprocess_relief_map;
pub use preprocess::{preprocess, Preprocessed};

/// Wraps a detection model session with its pre/post-processing.
pub struct DetectorStage {
    runner: InferenceRunner,
}

impl DetectorStage {
    pub fn from_file(model_path: impl AsRef<Path>, logbook: Arc<LogBook>) -> Result<Self> {
        Ok(Self { runner: InferenceRunner::from_file(model_path, logbook)? })
    }

    /// Runs the full pre-process -> inference -> post-process pipeline for
    /// one image, returning boxed text regions in original-image coordinates.
    pub async fn detect(&self, image: &RgbImage) -> Result<Vec<BoundingBox>> {
        let pre = preprocess(image)?;
        let shape = pre.tensor.shape().to_vec();
        let data = pre.tensor.into_data();

        let run_handle = self.runner.run(data, shape).await?;
        let (map_data, map_shape) = run_handle.complete().await?;

        let (map_height, map_width) = match map_shape.as_slice() {
            [h, w] => (*h as usize, *w as usize),
            other => {
                return Err(ocr_common::OcrError::BadShape(format!(
                    "detector output expected rank-2 [H, W], got {other:?}"
                )))
            }
        };

        postprocess::postprocess(
            map_data,
            map_width,
            map_height,
            pre.padded_width,
            pre.padded_height,
            pre.original_width,
            pre.original_height,
        )
    }

    pub fn current_max_parallelism(&self) -> usize {
        self.runner.current_max_parallelism()
    }

    pub fn as_tunable(&self) -> Arc<dyn Tunable> {
        self.runner.as_tunable()
    }
}
