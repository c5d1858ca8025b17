//! Incremental sync of the library against the storefront.
//!
//! A run moves through [`SyncPhase`]s: the purchase keys (or trove products)
//! are listed, one [`WorkUnit`] per entry is dispatched to a bounded worker
//! pool, and the cache writer is drained once every unit has finished.
//!
//! # Example
//!
//! ```no_run
//! use hb_downloader_core::download::{HttpClient, HttpSettings};
//! use hb_downloader_core::sync::{SyncConfig, SyncCoordinator};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(None, &HttpSettings::default())?;
//! let mut coordinator = SyncCoordinator::new(SyncConfig::new("./library"), client);
//! let report = coordinator.run(&CancellationToken::new()).await?;
//! println!("downloaded {} files", report.downloaded);
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod coordinator;
mod error;
mod order;
mod stats;
mod trove;

use std::fmt;

pub use config::{DEFAULT_CONTENT_TYPE, SyncConfig};
pub use coordinator::SyncCoordinator;
pub use error::SyncError;
pub use stats::SyncStats;
pub use trove::TROVE_FOLDER;

use crate::catalog::TroveProduct;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Not started.
    Idle,
    /// Listing purchase keys or trove pages.
    FetchingOrderKeys,
    /// Handing units to workers.
    Dispatching,
    /// Waiting for workers and the cache writer.
    Draining,
    /// Finished.
    Done,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::FetchingOrderKeys => "fetching-order-keys",
            Self::Dispatching => "dispatching",
            Self::Draining => "draining",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Independent unit of parallel work.
#[derive(Debug, Clone)]
pub enum WorkUnit {
    /// One purchase key.
    Order(String),
    /// One trove title.
    Trove(TroveProduct),
}

impl WorkUnit {
    /// Short name for logs.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Order(key) => key,
            Self::Trove(product) => &product.human_name,
        }
    }
}

/// Totals of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Units dispatched to workers.
    pub units: usize,
    /// Files written.
    pub downloaded: usize,
    /// Files skipped as current.
    pub unchanged: usize,
    /// Files the server no longer serves.
    pub unavailable: usize,
    /// Files or units that failed.
    pub failed: usize,
    /// Completion events written to the cache.
    pub recorded: usize,
    /// Whether the caller cancelled the run.
    pub cancelled: bool,
}

impl SyncReport {
    fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Self::default()
        }
    }
}
