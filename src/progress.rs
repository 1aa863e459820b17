use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::info;

/// Receives `(completed, total)` updates while a document pair is aligned.
///
/// Implementations may be called from any thread.
pub trait ProgressSink: Send + Sync {
    fn report(&self, current: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn report(&self, current: usize, total: usize) {
        self(current, total)
    }
}

/// Logs each update through `tracing`
#[derive(Debug, Clone)]
pub struct LogProgress {
    label: String,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ProgressSink for LogProgress {
    fn report(&self, current: usize, total: usize) {
        let total_nonzero = total.max(1);
        let pct = (current.min(total_nonzero) as f64 / total_nonzero as f64) * 100.0;
        info!("[{}] {}/{} paragraphs aligned ({:.1}%)", self.label, current, total, pct);
    }
}

/// Discards all updates
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _current: usize, _total: usize) {}
}

/// Records every update; used to observe progress in tests and reports
#[derive(Debug, Default)]
pub struct RecordingProgress {
    calls: AtomicUsize,
    updates: Mutex<Vec<(usize, usize)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> Vec<(usize, usize)> {
        self.updates
            .lock()
            .map(|u| u.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, current: usize, total: usize) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.updates.lock() {
            Ok(mut updates) => updates.push((current, total)),
            Err(poisoned) => poisoned.into_inner().push((current, total)),
        }
    }
}
