//! Wraps a single ONNX model session behind a uniform tensor-in/tensor-out
//! contract, serializing concurrent calls through an [`Executor`].

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use ocr_common::{OcrError, Result, Tensor};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use tracing::debug;

use crate::executor::{CancelToken, CompletionHandle, Executor};
use crate::logbook::LogBook;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type RunFn = Box<dyn Fn(RunInput) -> BoxFuture<Result<RunOutput>> + Send + Sync>;

/// Pre-batched tensor data handed to the model session.
struct RunInput {
    data: Vec<f32>,
    shape: Vec<i64>,
}

/// Output tensor data with its batch dimension already stripped.
pub type RunOutput = (Vec<f32>, Vec<i64>);

/// Completion half of a `run` call: resolves to the model's output once
/// inference finishes.
pub struct RunHandle {
    inner: CompletionHandle<RunOutput>,
}

impl RunHandle {
    pub async fn complete(self) -> Result<RunOutput> {
        self.inner.complete().await
    }
}

/// A single model session shared by one executor. Only one call runs at a
/// time on the CPU path (`current_max_parallelism` starts at 1); batching is
/// deliberately not supported (batch size is always 1 on the CPU path).
pub struct InferenceRunner {
    executor: Arc<Executor<RunFn, RunInput, RunOutput>>,
}

impl InferenceRunner {
    pub fn from_file(model_path: impl AsRef<Path>, logbook: Arc<LogBook>) -> Result<Self> {
        let session = create_cpu_only_session(model_path.as_ref())?;
        let session = Arc::new(Mutex::new(session));

        let func: RunFn = Box::new(move |input: RunInput| {
            let session = Arc::clone(&session);
            Box::pin(async move { run_on_session(session, input).await })
        });

        let executor = Arc::new(Executor::new(1, logbook, func));
        Ok(Self { executor })
    }

    /// `shape` is pre-pending-batch-size; a leading `1` is added before the
    /// model call and stripped from the result.
    pub async fn run(&self, data: Vec<f32>, shape: Vec<i64>) -> Result<RunHandle> {
        if shape.is_empty() {
            return Err(OcrError::BadShape("shape must have at least one dimension".into()));
        }
        let batched_shape = Tensor::with_leading_batch(&shape);
        let input = RunInput { data, shape: batched_shape };
        let inner = self.executor.execute_two_level(input, CancelToken::new()).await?;
        Ok(RunHandle { inner })
    }

    pub fn current_max_parallelism(&self) -> usize {
        self.executor.current_max_parallelism()
    }

    pub fn executor(&self) -> Arc<Executor<RunFn, RunInput, RunOutput>> {
        Arc::clone(&self.executor)
    }

    /// Type-erased view of the executor for the [`crate::tuner::Tuner`],
    /// which only needs `queue_depth`/`increment_parallelism`.
    pub fn as_tunable(&self) -> Arc<dyn crate::tuner::Tunable> {
        Arc::clone(&self.executor) as Arc<dyn crate::tuner::Tunable>
    }
}

async fn run_on_session(session: Arc<Mutex<Session>>, input: RunInput) -> Result<RunOutput> {
    tokio::task::spawn_blocking(move || {
        let dims: Vec<usize> = input.shape.iter().map(|&d| d as usize).collect();
        let array = ndarray::ArrayD::from_shape_vec(dims, input.data)
            .map_err(|e| OcrError::BadShape(e.to_string()))?;

        let mut session = session
            .lock()
            .map_err(|_| OcrError::InferenceFailed("model session mutex poisoned".into()))?;

        let input_value =
            Value::from_array(array).map_err(|e| OcrError::InferenceFailed(e.to_string()))?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| OcrError::InferenceFailed(e.to_string()))?;

        let (out_shape, out_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| OcrError::InferenceFailed(e.to_string()))?;

        let shape_i64: Vec<i64> = out_shape.iter().map(|&d| d as i64).collect();
        let stripped_shape = Tensor::strip_leading_batch(&shape_i64)?;
        Ok((out_data.to_vec(), stripped_shape))
    })
    .await
    .map_err(|e| OcrError::InferenceFailed(format!("inference task panicked: {e}")))?
}

/// CPU-only session, matching the Non-goal that GPU scheduling is out of
/// scope for this core. Intra-op thread count follows physical core count
/// unless overridden by `OCR_ENGINE_THREADS`.
fn create_cpu_only_session(model_path: &Path) -> Result<Session> {
    let intra_threads = std::env::var("OCR_ENGINE_THREADS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or_else(num_cpus::get_physical);

    debug!(?model_path, intra_threads, "loading model session (CPU)");

    Session::builder()
        .map_err(|e| OcrError::InferenceFailed(format!("session builder failed: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| OcrError::InferenceFailed(format!("failed to set optimization level: {e}")))?
        .with_intra_threads(intra_threads)
        .map_err(|e| OcrError::InferenceFailed(format!("failed to set thread count: {e}")))?
        .commit_from_file(model_path)
        .map_err(|e| OcrError::InferenceFailed(format!("failed to load model {model_path:?}: {e}")))
}
