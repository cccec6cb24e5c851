//! Bounded-parallel job dispatcher with dynamic max-parallelism.
//!
//! Every inference call in the pipeline is routed through one of these so
//! that concurrency stays within a live-tunable cap while still emitting
//! log-book events the tuner and telemetry consume.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ocr_common::{OcrError, Result};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::logbook::LogBook;

/// Cooperative cancellation flag shared between a caller and the job it
/// submitted to an executor.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Administrative pause latch. While held, [`Executor::admit`] will not let
/// any new job begin execution, but it never holds the semaphore while
/// waiting on the latch -- the two are strictly alternated.
struct PauseLatch {
    held: AtomicBool,
    notify: Notify,
}

impl PauseLatch {
    fn new() -> Self {
        Self { held: AtomicBool::new(false), notify: Notify::new() }
    }

    fn raise(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    fn lower(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    async fn wait_clear(&self) {
        while self.is_held() {
            self.notify.notified().await;
        }
    }
}

/// Bounded-parallel dispatcher for a single user function `f: TIn -> TOut`.
pub struct Executor<F, TIn, TOut> {
    func: F,
    semaphore: Arc<Semaphore>,
    current_max_parallelism: AtomicUsize,
    queue_depth: AtomicI64,
    pause: PauseLatch,
    logbook: Arc<LogBook>,
    _marker: PhantomData<fn(TIn) -> TOut>,
}

impl<F, TIn, TOut, Fut> Executor<F, TIn, TOut>
where
    F: Fn(TIn) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TOut>> + Send + 'static,
    TIn: Send + 'static,
    TOut: Send + 'static,
{
    pub fn new(initial_max_parallelism: usize, logbook: Arc<LogBook>, func: F) -> Self {
        assert!(initial_max_parallelism >= 1, "max parallelism must be at least 1");
        Self {
            func,
            semaphore: Arc::new(Semaphore::new(initial_max_parallelism)),
            current_max_parallelism: AtomicUsize::new(initial_max_parallelism),
            queue_depth: AtomicI64::new(0),
            pause: PauseLatch::new(),
            logbook,
            _marker: PhantomData,
        }
    }

    pub fn queue_depth(&self) -> i64 {
        self.queue_depth.load(Ordering::SeqCst)
    }

    pub fn current_max_parallelism(&self) -> usize {
        self.current_max_parallelism.load(Ordering::SeqCst)
    }

    /// Admission: acquires one permit, respecting the pause latch. Never
    /// returns holding a permit across a latch wait.
    async fn admit(&self) -> OwnedSemaphorePermit {
        self.queue_depth.fetch_add(1, Ordering::SeqCst);
        let enqueued_at = Instant::now();

        let permit = loop {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("executor semaphore should never be closed");

            if self.pause.is_held() {
                drop(permit);
                self.pause.wait_clear().await;
                continue;
            }

            break permit;
        };

        self.queue_depth.fetch_sub(1, Ordering::SeqCst);
        debug!(wait_ms = enqueued_at.elapsed().as_secs_f64() * 1000.0, "job admitted");
        permit
    }

    /// Runs `f(input)` once a permit is available. The permit is held for the
    /// duration of the call and released (success or failure) when it
    /// returns. `cancel` is checked once admission completes; if already
    /// cancelled, `f` is never invoked.
    pub async fn execute_single(&self, input: TIn, cancel: &CancelToken) -> Result<TOut> {
        let permit = self.admit().await;

        if cancel.is_cancelled() {
            drop(permit);
            return Err(OcrError::Cancelled);
        }

        let token = self.logbook.log_start();
        let result = (self.func)(input).await;
        let _ = self.logbook.log_end(token);
        drop(permit);
        result
    }

    /// Two-level variant of [`Executor::execute_single`]: the outer future
    /// resolves once admission completes (a permit is held), returning a
    /// [`CompletionHandle`] whose own future resolves when `f` finishes.
    /// This is the hook callers use to decouple admission from completion
    /// for fine-grained backpressure scheduling.
    pub async fn execute_two_level(
        self: &Arc<Self>,
        input: TIn,
        cancel: CancelToken,
    ) -> Result<CompletionHandle<TOut>> {
        let permit = self.admit().await;

        if cancel.is_cancelled() {
            drop(permit);
            return Err(OcrError::Cancelled);
        }

        let this = Arc::clone(self);
        let join = tokio::spawn(async move {
            let _permit = permit;
            let token = this.logbook.log_start();
            let result = (this.func)(input).await;
            let _ = this.logbook.log_end(token);
            result
        });

        Ok(CompletionHandle { join })
    }

    /// Atomically increases the cap by one and releases an extra permit.
    /// Effective immediately for new work.
    pub fn increment_parallelism(&self) {
        self.current_max_parallelism.fetch_add(1, Ordering::SeqCst);
        self.semaphore.add_permits(1);
    }

    /// Raises the pause latch, waits for an in-flight slot to drain, then
    /// permanently removes that slot's permit and lowers the cap. Guarantees
    /// `semaphore_permits_in_flight` never exceeds `current_max_parallelism`.
    pub async fn decrement_parallelism(&self) {
        self.pause.raise();
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("executor semaphore should never be closed");
        self.pause.lower();
        permit.forget();
        self.current_max_parallelism.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Completion half of a two-level handle: awaits the actual work, not just
/// its admission.
pub struct CompletionHandle<TOut> {
    join: JoinHandle<Result<TOut>>,
}

impl<TOut: Send + 'static> CompletionHandle<TOut> {
    pub async fn complete(self) -> Result<TOut> {
        match self.join.await {
            Ok(result) => result,
            Err(_) => Err(OcrError::Cancelled),
        }
    }
}
