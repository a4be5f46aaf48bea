use std::sync::atomic::{AtomicUsize, Ordering};

/// Segment counters shared between the poller and the fetcher.
#[derive(Debug, Default)]
pub struct Progress {
    total: AtomicUsize,
    finished: AtomicUsize,
    skipped: AtomicUsize,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments queued so far.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    /// Segments appended to the output so far.
    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::Relaxed)
    }

    /// Segments dropped after a failed download.
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }

    pub(crate) fn queued(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Reverts [`Progress::queued`] for a segment that never reached the queue.
    pub(crate) fn unqueued(&self) {
        self.total.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn appended(&self) -> usize {
        self.finished.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }
}
