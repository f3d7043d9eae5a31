use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Cooperative cancellation flag shared between the caller and a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Receives search progress. All methods default to no-ops.
pub trait ProgressSink: Send + Sync {
    /// Called once before enumeration with the combination count
    /// (`None` if it overflows `u128`).
    fn on_start(&self, _total: Option<u128>) {}

    /// Called with the number of evaluations finished since the last call.
    fn on_advance(&self, _evaluated: u64) {}

    fn on_finish(&self) {}
}

/// How combinations are enumerated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Single thread, lexicographic order.
    #[default]
    Sequential,
    /// Rayon worker pool; same result as `Sequential`.
    Parallel,
}

/// Search engine settings.
#[derive(Clone)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub cancel: Option<CancelToken>,
    pub time_limit: Option<Duration>,
    /// Poll cancellation/time and report progress every this many evaluations.
    pub check_every: u64,
    pub progress: Option<Arc<dyn ProgressSink>>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::Sequential,
            cancel: None,
            time_limit: None,
            check_every: 1024,
            progress: None,
        }
    }
}

impl std::fmt::Debug for SearchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchOptions")
            .field("mode", &self.mode)
            .field("cancel", &self.cancel)
            .field("time_limit", &self.time_limit)
            .field("check_every", &self.check_every)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl SearchOptions {
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub(crate) fn check_every(&self) -> u64 {
        self.check_every.max(1)
    }

    /// Returns the reason to stop, if any.
    pub(crate) fn check(&self, started: Instant) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(Error::Cancelled);
        }
        if let Some(limit) = self.time_limit {
            if started.elapsed() > limit {
                return Err(Error::TimedOut { limit });
            }
        }
        Ok(())
    }

    pub(crate) fn report_start(&self, total: Option<u128>) {
        if let Some(sink) = &self.progress {
            sink.on_start(total);
        }
    }

    pub(crate) fn report_advance(&self, evaluated: u64) {
        if let Some(sink) = &self.progress {
            sink.on_advance(evaluated);
        }
    }

    pub(crate) fn report_finish(&self) {
        if let Some(sink) = &self.progress {
            sink.on_finish();
        }
    }
}
