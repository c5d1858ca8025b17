//! Single consumer that applies completion events to the journal.
//!
//! Workers hold a [`CompletionSender`] and never touch the store. The writer
//! runs on a blocking thread, applies events in the order it receives them,
//! and exits after a [`CacheEvent::Stop`] or once every sender is dropped.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::error::CacheError;
use super::record::{CacheKey, CacheRecord};
use super::store::CacheStore;

/// Default queue depth between workers and the writer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Message carried from a worker to the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A file was written; record it.
    Completed {
        /// File identity.
        key: CacheKey,
        /// New state for the key.
        record: CacheRecord,
    },
    /// No more events will follow.
    Stop,
}

/// Totals reported by the writer when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterReport {
    /// Events durably applied.
    pub applied: usize,
    /// Events that could not be written.
    pub failed: usize,
    /// Whether the journal was compacted on shutdown.
    pub compacted: bool,
}

/// Producer handle given to each worker.
#[derive(Debug, Clone)]
pub struct CompletionSender {
    tx: mpsc::Sender<CacheEvent>,
}

impl CompletionSender {
    /// Queues a completed download. Returns false if the writer is gone.
    pub async fn completed(&self, key: CacheKey, record: CacheRecord) -> bool {
        let sent = self.tx.send(CacheEvent::Completed { key, record }).await;
        if let Err(mpsc::error::SendError(event)) = &sent {
            error!(?event, "cache writer is gone, completion dropped");
        }
        sent.is_ok()
    }
}

/// Handle to the running writer.
#[derive(Debug)]
pub struct CacheWriter {
    tx: mpsc::Sender<CacheEvent>,
    handle: JoinHandle<Result<WriterReport, CacheError>>,
}

impl CacheWriter {
    /// Moves `store` onto a blocking thread and starts consuming events.
    #[must_use]
    pub fn spawn(store: CacheStore, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = tokio::task::spawn_blocking(move || run(store, rx));
        Self { tx, handle }
    }

    /// New producer handle.
    #[must_use]
    pub fn sender(&self) -> CompletionSender {
        CompletionSender {
            tx: self.tx.clone(),
        }
    }

    /// Sends the stop event and waits for every earlier event to be applied.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Writer`] if the writer thread panicked, or the
    /// compaction error if the final rewrite failed.
    pub async fn finish(self) -> Result<WriterReport, CacheError> {
        if self.tx.send(CacheEvent::Stop).await.is_err() {
            debug!("cache writer already stopped");
        }
        drop(self.tx);
        self.handle.await.map_err(|e| CacheError::Writer {
            reason: e.to_string(),
        })?
    }
}

fn run(mut store: CacheStore, mut rx: mpsc::Receiver<CacheEvent>) -> Result<WriterReport, CacheError> {
    let mut report = WriterReport::default();

    while let Some(event) = rx.blocking_recv() {
        match event {
            CacheEvent::Completed { key, record } => match store.apply(key.clone(), record) {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(key = %key, error = %e, "failed to record completed download");
                }
            },
            CacheEvent::Stop => break,
        }
    }

    report.compacted = store.compact()?;
    info!(
        applied = report.applied,
        failed = report.failed,
        records = store.index().len(),
        "Cache writer finished"
    );
    Ok(report)
}
