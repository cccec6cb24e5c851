//! Background loop that watches executor queue depth and grows parallelism.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

const DEFAULT_INTERVAL: Duration = Duration::from_millis(250);
const SUB_SAMPLES: u32 = 10;

/// The subset of [`crate::executor::Executor`] the tuner needs, decoupled
/// from the executor's `TIn`/`TOut` type parameters so one tuner can manage
/// executors of different shapes.
pub trait Tunable: Send + Sync {
    fn queue_depth(&self) -> i64;
    fn increment_parallelism(&self);
}

impl<F, TIn, TOut, Fut> Tunable for crate::executor::Executor<F, TIn, TOut>
where
    F: Fn(TIn) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ocr_common::Result<TOut>> + Send + 'static,
    TIn: Send + 'static,
    TOut: Send + 'static,
{
    fn queue_depth(&self) -> i64 {
        crate::executor::Executor::queue_depth(self)
    }

    fn increment_parallelism(&self) {
        crate::executor::Executor::increment_parallelism(self)
    }
}

/// Watches the recognition and detection executors and grows their caps
/// when queue depth outpaces observed parallelism. Recognition is favored
/// because it is the pipeline's latency bottleneck: if it was incremented
/// this cycle, detection is left alone until the next one.
pub struct Tuner {
    recognition: Arc<dyn Tunable>,
    detection: Arc<dyn Tunable>,
    interval: Duration,
}

impl Tuner {
    pub fn new(recognition: Arc<dyn Tunable>, detection: Arc<dyn Tunable>) -> Self {
        Self { recognition, detection, interval: DEFAULT_INTERVAL }
    }

    #[cfg(test)]
    fn with_interval(recognition: Arc<dyn Tunable>, detection: Arc<dyn Tunable>, interval: Duration) -> Self {
        Self { recognition, detection, interval }
    }

    async fn sample_avg_queue_depth(executor: &Arc<dyn Tunable>, sub_interval: Duration) -> f64 {
        let mut sum: i64 = 0;
        for _ in 0..SUB_SAMPLES {
            sum += executor.queue_depth();
            tokio::time::sleep(sub_interval).await;
        }
        sum as f64 / SUB_SAMPLES as f64
    }

    /// One tuning decision. Recognition is sampled and, if its queue depth
    /// meets the threshold, incremented; detection is only evaluated when
    /// recognition was not.
    async fn evaluate_cycle(&self) {
        let sub_interval = self.interval / SUB_SAMPLES;

        let recognition_avg = Self::sample_avg_queue_depth(&self.recognition, sub_interval).await;
        let recognition_depth = self.recognition.queue_depth();
        let recognition_incremented = should_increment(recognition_depth, recognition_avg);
        if recognition_incremented {
            debug!(recognition_depth, recognition_avg, "incrementing recognition parallelism");
            self.recognition.increment_parallelism();
        }

        if !recognition_incremented {
            let detection_avg = Self::sample_avg_queue_depth(&self.detection, sub_interval).await;
            let detection_depth = self.detection.queue_depth();
            if should_increment(detection_depth, detection_avg) {
                debug!(detection_depth, detection_avg, "incrementing detection parallelism");
                self.detection.increment_parallelism();
            }
        }
    }

    /// Spawns the tuning loop. The returned handle's cancellation awaits the
    /// in-flight cycle before returning.
    pub fn spawn(self: Arc<Self>) -> TunerHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_inner = stop.clone();
        let join = tokio::spawn(async move {
            let mut tick = tokio::time::interval(self.interval);
            loop {
                tick.tick().await;
                if stop_inner.load(Ordering::SeqCst) {
                    break;
                }
                self.evaluate_cycle().await;
            }
        });
        TunerHandle { stop, join }
    }
}

fn should_increment(queue_depth: i64, observed_parallelism: f64) -> bool {
    queue_depth >= observed_parallelism.mul_add(0.5, 0.0).ceil() as i64
}

/// Handle to a spawned tuner loop.
pub struct TunerHandle {
    stop: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl TunerHandle {
    /// Requests shutdown and waits for the in-flight cycle to finish.
    pub async fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.join.await;
    }
}
