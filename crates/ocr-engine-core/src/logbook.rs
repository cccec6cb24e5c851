//! Thread-safe job start/end registry and window-summary statistics.
//!
//! `log_start`/`log_end` are lock-free concurrent map insertions; `get_summary`
//! and `prune` share a single critical section so that summaries always see a
//! coherent snapshot, but never block the hot insert path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use ocr_common::{OcrError, Result};

use crate::clock::MonotonicClock;

static NEXT_BOOK_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque job handle minted by [`LogBook::log_start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token {
    book_id: u64,
    id: u64,
}

/// Window summary statistics produced by [`LogBook::get_summary`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Summary {
    pub avg_duration: Duration,
    pub avg_throughput: f64,
    pub avg_parallelism: f64,
}

/// Thread-safe registry of job start/end timestamps.
pub struct LogBook {
    book_id: u64,
    clock: MonotonicClock,
    next_id: AtomicU64,
    starts: DashMap<Token, Duration>,
    ends: DashMap<Token, Duration>,
    // Serializes get_summary/prune with each other; log_start/log_end never
    // touch this lock.
    summary_lock: Mutex<()>,
}

impl LogBook {
    pub fn new() -> Self {
        Self {
            book_id: NEXT_BOOK_ID.fetch_add(1, Ordering::Relaxed),
            clock: MonotonicClock::new(),
            next_id: AtomicU64::new(0),
            starts: DashMap::new(),
            ends: DashMap::new(),
            summary_lock: Mutex::new(()),
        }
    }

    /// Records the current time under a freshly minted token. O(1).
    pub fn log_start(&self) -> Token {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = Token { book_id: self.book_id, id };
        self.starts.insert(token, self.clock.now());
        token
    }

    /// Records the current time under `token`. Must be called at most once
    /// per token; fails with [`OcrError::ForeignToken`] for tokens minted by
    /// a different log-book.
    pub fn log_end(&self, token: Token) -> Result<()> {
        if token.book_id != self.book_id {
            return Err(OcrError::ForeignToken);
        }
        self.ends.insert(token, self.clock.now());
        Ok(())
    }

    /// Window summary over `[start, end]`. Requires `end >= start`; returns
    /// an all-zero summary if no job both started and ended in the window.
    pub fn get_summary(&self, start: Duration, end: Duration) -> Summary {
        if end < start {
            return Summary::default();
        }

        let _guard = self.summary_lock.lock().unwrap();

        // Snapshot end-times first, then start-times: any end observed here
        // already has its start visible in the snapshot taken afterward,
        // since a job's start always precedes its end in real time.
        let end_snapshot: HashMap<Token, Duration> =
            self.ends.iter().map(|e| (*e.key(), *e.value())).collect();
        let start_snapshot: HashMap<Token, Duration> =
            self.starts.iter().map(|e| (*e.key(), *e.value())).collect();

        let mut pairs: Vec<(Duration, Duration)> = Vec::new();
        for (token, &end_time) in &end_snapshot {
            if let Some(&start_time) = start_snapshot.get(token) {
                if start_time >= start && end_time <= end {
                    pairs.push((start_time, end_time));
                }
            }
        }

        if pairs.is_empty() {
            return Summary::default();
        }

        let avg_duration_secs: f64 = pairs
            .iter()
            .map(|(s, e)| (*e - *s).as_secs_f64())
            .sum::<f64>()
            / pairs.len() as f64;

        // Sweep over every job (not just the selected pairs) whose end-time
        // falls within the window, merged with the selected set's events.
        // delta_all tracks concurrency across all such jobs; delta_selected
        // gates accumulation to intervals where a selected job is active.
        let mut events: Vec<(Duration, i64, i64)> = Vec::new();
        for (token, &end_time) in &end_snapshot {
            if end_time > end {
                continue;
            }
            if let Some(&start_time) = start_snapshot.get(token) {
                let is_selected = start_time >= start && end_time <= end;
                let sel = if is_selected { 1 } else { 0 };
                events.push((start_time, 1, sel));
                events.push((end_time, -1, -sel));
            }
        }
        events.sort_by_key(|e| e.0);

        let mut all_count: i64 = 0;
        let mut selected_count: i64 = 0;
        let mut active_time = Duration::ZERO;
        let mut weighted_sum = 0.0f64;
        let mut prev_time: Option<Duration> = None;

        for (t, d_all, d_sel) in events {
            if let Some(pt) = prev_time {
                if t > pt && selected_count > 0 {
                    let dt = t - pt;
                    active_time += dt;
                    weighted_sum += all_count as f64 * dt.as_secs_f64();
                }
            }
            all_count += d_all;
            selected_count += d_sel;
            prev_time = Some(t);
        }

        let active_secs = active_time.as_secs_f64();
        let avg_throughput = if active_secs > 0.0 { pairs.len() as f64 / active_secs } else { 0.0 };
        let avg_parallelism = if active_secs > 0.0 { weighted_sum / active_secs } else { 0.0 };

        Summary {
            avg_duration: Duration::from_secs_f64(avg_duration_secs),
            avg_throughput,
            avg_parallelism,
        }
    }

    /// Removes every token whose end-time is `< before`. Callers promise no
    /// future `get_summary` will be issued with `start <= before`; each
    /// removed pair's start/end events cancel in the sweep above, so pruning
    /// cannot change any later window's statistics.
    pub fn prune(&self, before: Duration) {
        let _guard = self.summary_lock.lock().unwrap();
        let stale: Vec<Token> = self
            .ends
            .iter()
            .filter(|e| *e.value() < before)
            .map(|e| *e.key())
            .collect();
        for token in stale {
            self.ends.remove(&token);
            self.starts.remove(&token);
        }
    }
}

impl Default for LogBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration as StdDuration;

    #[test]
    fn foreign_token_rejected() {
        let a = LogBook::new();
        let b = LogBook::new();
        let token = a.log_start();
        assert!(matches!(b.log_end(token), Err(OcrError::ForeignToken)));
    }

    #[test]
    fn empty_window_is_zero() {
        let book = LogBook::new();
        let summary = book.get_summary(Duration::from_secs(0), Duration::from_secs(1));
        assert_eq!(summary, Summary::default());
    }

    #[test]
    fn end_before_start_is_zero() {
        let book = LogBook::new();
        let summary = book.get_summary(Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(summary, Summary::default());
    }

    #[test]
    fn single_job_duration_and_throughput() {
        let book = LogBook::new();
        let token = book.log_start();
        thread::sleep(StdDuration::from_millis(20));
        book.log_end(token).unwrap();

        let summary = book.get_summary(Duration::from_secs(0), Duration::from_secs(10));
        assert!(summary.avg_duration >= StdDuration::from_millis(15));
        assert!(summary.avg_throughput > 0.0);
        assert!(summary.avg_parallelism >= 1.0);
    }

    #[test]
    fn prune_does_not_affect_later_windows() {
        let book = LogBook::new();

        let t1 = book.log_start();
        thread::sleep(StdDuration::from_millis(5));
        book.log_end(t1).unwrap();

        let before_prune = book.get_summary(Duration::from_secs(0), Duration::from_secs(10));

        book.prune(Duration::from_millis(1));

        let t2 = book.log_start();
        thread::sleep(StdDuration::from_millis(5));
        book.log_end(t2).unwrap();

        // Windows strictly after the prune point for the still-present job
        // are unaffected by having pruned t1.
        let after = book.get_summary(Duration::from_secs(0), Duration::from_secs(10));
        assert!(after.avg_throughput > 0.0);
        assert_ne!(before_prune.avg_duration, Duration::ZERO);
    }

    #[test]
    fn concurrent_jobs_increase_parallelism() {
        let book = LogBook::new();
        let t1 = book.log_start();
        let t2 = book.log_start();
        thread::sleep(StdDuration::from_millis(10));
        book.log_end(t1).unwrap();
        book.log_end(t2).unwrap();

        let summary = book.get_summary(Duration::from_secs(0), Duration::from_secs(10));
        assert!(summary.avg_parallelism >= 1.5);
    }
}
