use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-file outcome counters shared by every worker of a run.
#[derive(Debug, Default)]
pub struct SyncStats {
    downloaded: AtomicUsize,
    unchanged: AtomicUsize,
    unavailable: AtomicUsize,
    failed: AtomicUsize,
}

impl SyncStats {
    /// Creates a tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files written this run.
    #[must_use]
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Files skipped because the cache says they are current.
    #[must_use]
    pub fn unchanged(&self) -> usize {
        self.unchanged.load(Ordering::SeqCst)
    }

    /// Files the server no longer serves.
    #[must_use]
    pub fn unavailable(&self) -> usize {
        self.unavailable.load(Ordering::SeqCst)
    }

    /// Files or units that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub(crate) fn increment_downloaded(&self) {
        self.downloaded.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_unchanged(&self) {
        self.unchanged.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_unavailable(&self) {
        self.unavailable.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }
}
