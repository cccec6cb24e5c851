//! Composes the detector and recognizer stages, fanning in images and
//! fanning out structured results under a single global capacity bound.

pub mod merge;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use image::RgbImage;
use ocr_common::{OcrResult, Result};
use ocr_detector::DetectorStage;
use ocr_engine_core::{CancelToken, CompletionHandle, Executor, LogBook, Tuner};
use ocr_recognizer::RecognizerStage;
use tokio_stream::wrappers::ReceiverStream;

use merge::RecognizedWord;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type OrchestratorFn = Box<dyn Fn(RgbImage) -> BoxFuture<Result<OcrResult>> + Send + Sync>;

/// Tuning knobs for the orchestrator's global capacity and the executors it
/// wraps the detector/recognizer sessions in.
pub struct PipelineConfig {
    pub max_parallelism: usize,
    pub max_batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { max_parallelism: 4, max_batch_size: 1 }
    }
}

impl PipelineConfig {
    fn capacity(&self) -> usize {
        (self.max_parallelism * self.max_batch_size * 2).max(1)
    }
}

/// Composes detector and recognizer stages, exposing admission/completion
/// two-level handles for single reads and a backpressured stream for many.
pub struct PipelineOrchestrator {
    executor: Arc<Executor<OrchestratorFn, RgbImage, OcrResult>>,
    capacity: usize,
    tuner: ocr_engine_core::TunerHandle,
}

impl PipelineOrchestrator {
    pub fn from_files(
        detector_model: impl AsRef<Path>,
        recognizer_model: impl AsRef<Path>,
        config: PipelineConfig,
    ) -> Result<Self> {
        let logbook = Arc::new(LogBook::new());
        let detector = Arc::new(DetectorStage::from_file(detector_model, Arc::clone(&logbook))?);
        let recognizer = Arc::new(RecognizerStage::from_file(recognizer_model, Arc::clone(&logbook))?);

        let tuner = Tuner::new(recognizer.as_tunable(), detector.as_tunable());
        let tuner_handle = Arc::new(tuner).spawn();

        let capacity = config.capacity();

        let detector_for_fn = Arc::clone(&detector);
        let recognizer_for_fn = Arc::clone(&recognizer);
        let page_counter_for_fn = Arc::new(AtomicU32::new(0));

        let func: OrchestratorFn = Box::new(move |image: RgbImage| {
            let detector = Arc::clone(&detector_for_fn);
            let recognizer = Arc::clone(&recognizer_for_fn);
            let page_counter = Arc::clone(&page_counter_for_fn);
            Box::pin(async move {
                let page_number = page_counter.fetch_add(1, Ordering::SeqCst);
                process_one(&detector, &recognizer, &image, page_number).await
            })
        });

        let executor = Arc::new(Executor::new(capacity, logbook, func));

        Ok(Self { executor, capacity, tuner: tuner_handle })
    }

    /// Two-level handle: the outer await resolves once the image is
    /// admitted under the global capacity bound; the inner await resolves
    /// to the finished result.
    pub async fn read_one(&self, image: RgbImage) -> Result<CompletionHandle<OcrResult>> {
        self.executor.execute_two_level(image, CancelToken::new()).await
    }

    /// Streams results in completion order. Backpressure from a slow
    /// consumer is carried by a bounded channel whose capacity matches the
    /// orchestrator's admission bound: the driver only pulls the next image
    /// from `images` once it has reserved a slot to send a prior result.
    pub fn read_many<S>(&self, images: S) -> ReceiverStream<Result<OcrResult>>
    where
        S: Stream<Item = RgbImage> + Send + 'static,
    {
        let executor = Arc::clone(&self.executor);
        let (tx, rx) = tokio::sync::mpsc::channel(self.capacity);

        tokio::spawn(async move {
            tokio::pin!(images);
            while let Some(image) = images.next().await {
                let reserved = match tx.clone().reserve_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let executor = Arc::clone(&executor);
                tokio::spawn(async move {
                    let result = run_one(&executor, image).await;
                    reserved.send(result);
                });
            }
        });

        ReceiverStream::new(rx)
    }

    /// Shuts the pipeline down. Consuming `self` closes the input side first:
    /// no further `read_one`/`read_many` call can be made once this returns
    /// control to the caller, since the orchestrator that would accept one is
    /// gone. The tuner's background loop is then stopped, and finally this
    /// waits for every in-flight job spawned by a prior `read_one`/`read_many`
    /// call to finish and drop its executor handle before releasing the
    /// executor's capacity.
    pub async fn shutdown(self) {
        self.tuner.shutdown().await;
        while Arc::strong_count(&self.executor) > 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

async fn run_one(
    executor: &Arc<Executor<OrchestratorFn, RgbImage, OcrResult>>,
    image: RgbImage,
) -> Result<OcrResult> {
    let handle = executor.execute_two_level(image, CancelToken::new()).await?;
    handle.complete().await
}

async fn process_one(
    detector: &Arc<DetectorStage>,
    recognizer: &Arc<RecognizerStage>,
    image: &RgbImage,
    page_number: u32,
) -> Result<OcrResult> {
    let boxes = detector.detect(image).await?;
    if boxes.is_empty() {
        return Ok(OcrResult::empty(page_number));
    }

    let mut recognized = Vec::with_capacity(boxes.len());
    for bounding_box in boxes {
        let decoded = recognizer.recognize(image, &bounding_box.oriented_rectangle).await?;
        recognized.push(RecognizedWord {
            bounding_box,
            text: decoded.text,
            confidence: decoded.confidence as f32,
        });
    }

    Ok(merge::assemble(page_number, recognized))
}
