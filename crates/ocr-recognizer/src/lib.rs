//! Recognition stage: region crop, pre-processing, inference, and greedy
//! CTC decoding composed around a single cached model session.

pub mod char_dict;
pub mod ctc;
pub mod preprocess;

use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use ocr_common::geometry_types::OrientedRectangle;
use ocr_common::{OcrError, Result};
use ocr_engine_core::{InferenceRunner, LogBook, Tunable};

pub use char_dict::CharDict;
pub use ctc::Decoded;
pub use preprocess::RecognizerConfig;

/// Wraps a recognition model session with its pre-processing, inference,
/// and CTC post-processing.
pub struct RecognizerStage {
    runner: InferenceRunner,
    dict: CharDict,
    config: RecognizerConfig,
}

impl RecognizerStage {
    pub fn from_file(model_path: impl AsRef<Path>, logbook: Arc<LogBook>) -> Result<Self> {
        Self::with_config(model_path, logbook, RecognizerConfig::default())
    }

    pub fn with_config(
        model_path: impl AsRef<Path>,
        logbook: Arc<LogBook>,
        config: RecognizerConfig,
    ) -> Result<Self> {
        Ok(Self { runner: InferenceRunner::from_file(model_path, logbook)?, dict: CharDict::new(), config })
    }

    /// Recognizes one region. A zero-area region yields an empty decode
    /// rather than an error -- the model is never invoked for it.
    pub async fn recognize(&self, image: &RgbImage, rect: &OrientedRectangle) -> Result<Decoded> {
        let tensor = match preprocess::preprocess_region(image, rect, &self.config) {
            Ok(tensor) => tensor,
            Err(OcrError::EmptyImage) => return Ok(Decoded::empty()),
            Err(other) => return Err(other),
        };

        let shape = tensor.shape().to_vec();
        let data = tensor.into_data();

        let run_handle = self.runner.run(data, shape).await?;
        let (out_data, out_shape) = run_handle.complete().await?;

        let (t, c) = match out_shape.as_slice() {
            [t, c] => (*t as usize, *c as usize),
            other => {
                return Err(OcrError::BadShape(format!(
                    "recognizer output expected rank-2 [T, C], got {other:?}"
                )))
            }
        };

        Ok(ctc::decode(&out_data, t, c, &self.dict))
    }

    /// Recognizes every region in `rects`. An empty `rects` yields an empty
    /// list, not an error.
    pub async fn recognize_many(&self, image: &RgbImage, rects: &[OrientedRectangle]) -> Result<Vec<Decoded>> {
        let mut out = Vec::with_capacity(rects.len());
        for rect in rects {
            out.push(self.recognize(image, rect).await?);
        }
        Ok(out)
    }

    pub fn current_max_parallelism(&self) -> usize {
        self.runner.current_max_parallelism()
    }

    pub fn as_tunable(&self) -> Arc<dyn Tunable> {
        self.runner.as_tunable()
    }
}
