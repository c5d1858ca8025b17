//! Runs a whole sync: enumerate, fan out, drain, record.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::config::SyncConfig;
use super::context::UnitContext;
use super::error::SyncError;
use super::order::process_order;
use super::stats::SyncStats;
use super::trove::process_trove_product;
use super::{SyncPhase, SyncReport, WorkUnit};
use crate::cache::{CacheStore, CacheWriter, DEFAULT_QUEUE_CAPACITY};
use crate::catalog::{CatalogError, Endpoints, TroveCatalog, fetch_purchase_keys};
use crate::download::{DownloadExecutor, HttpClient, LibraryLayout, Progress};

/// Drives one sync run over a bounded worker pool.
///
/// Workers never touch the cache journal. They send completion events to a
/// single [`CacheWriter`], which is drained before [`run`](Self::run)
/// returns, so every file reported as downloaded is durably recorded.
#[derive(Debug)]
pub struct SyncCoordinator {
    config: SyncConfig,
    client: HttpClient,
    endpoints: Endpoints,
    progress: Progress,
    phase: SyncPhase,
}

impl SyncCoordinator {
    /// Creates a coordinator talking to the production storefront.
    #[must_use]
    pub fn new(config: SyncConfig, client: HttpClient) -> Self {
        let progress = Progress::new(config.progress);
        Self {
            config,
            client,
            endpoints: Endpoints::default(),
            progress,
            phase: SyncPhase::Idle,
        }
    }

    /// Points every catalog request at `endpoints`.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    fn set_phase(&mut self, phase: SyncPhase) {
        debug!(from = %self.phase, to = %phase, "sync phase");
        self.phase = phase;
    }

    /// Runs the sync to completion.
    ///
    /// Cancelling `cancel` stops dispatch, aborts in-flight downloads without
    /// leaving partial files, and still flushes completed events.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Library`] when the library root can't be created
    /// - [`SyncError::CorruptCache`] when the journal can't be loaded
    /// - [`SyncError::Authorization`] when the session is rejected
    /// - [`SyncError::Catalog`] when purchases or the trove can't be listed
    /// - [`SyncError::Writer`] when the journal can't be finalised
    #[instrument(skip(self, cancel), fields(library = %self.config.library_path.display()))]
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<SyncReport, SyncError> {
        let library = self.config.library_path.clone();
        tokio::fs::create_dir_all(&library)
            .await
            .map_err(|source| SyncError::Library {
                path: library.clone(),
                source,
            })?;

        let store = CacheStore::open(&self.config.cache_path()).map_err(SyncError::CorruptCache)?;
        let index = Arc::new(store.index().clone());
        let writer = CacheWriter::spawn(store, DEFAULT_QUEUE_CAPACITY);

        // Child token: a fatal unit stops its siblings without cancelling the caller.
        let run_cancel = cancel.child_token();

        self.set_phase(SyncPhase::FetchingOrderKeys);
        let units = match self.enumerate(&run_cancel).await {
            Ok(units) => units,
            Err(e) => {
                if let Err(writer_error) = writer.finish().await {
                    error!(error = %writer_error, "cache writer failed");
                }
                if e.is_cancelled() {
                    self.set_phase(SyncPhase::Done);
                    return Ok(SyncReport::cancelled());
                }
                return Err(SyncError::from_catalog(e));
            }
        };
        info!(units = units.len(), workers = self.config.effective_workers(), "Starting sync");

        let stats = Arc::new(SyncStats::new());
        let ctx = Arc::new(UnitContext {
            client: self.client.clone(),
            endpoints: self.endpoints.clone(),
            trove: TroveCatalog::new(self.client.clone(), self.endpoints.clone()),
            layout: LibraryLayout::new(&library),
            executor: DownloadExecutor::new(self.progress.clone()),
            index,
            completions: writer.sender(),
            stats: Arc::clone(&stats),
            filter: self.config.filter.clone(),
            content_types: self.config.effective_content_types(),
            update: self.config.update,
            cancel: run_cancel.clone(),
        });

        self.set_phase(SyncPhase::Dispatching);
        let semaphore = Arc::new(Semaphore::new(self.config.effective_workers()));
        let mut handles = Vec::with_capacity(units.len());
        for unit in units {
            let permit = tokio::select! {
                biased;
                () = run_cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let ctx = Arc::clone(&ctx);
            handles.push(tokio::spawn(async move {
                let _permit = permit;
                let label = unit.label().to_string();
                let result = run_unit(&ctx, unit).await;
                if let Err(e) = &result
                    && e.is_authorization()
                {
                    error!(unit = %label, error = %e, "aborting sync");
                    ctx.cancel.cancel();
                }
                result
            }));
        }
        let dispatched = handles.len();

        self.set_phase(SyncPhase::Draining);
        let mut fatal = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "work unit panicked");
                    stats.increment_failed();
                }
            }
        }
        drop(ctx);

        let writer_result = writer.finish().await;
        if let Some(e) = fatal {
            if let Err(writer_error) = writer_result {
                error!(error = %writer_error, "cache writer failed");
            }
            return Err(e);
        }
        let writer_report = writer_result.map_err(SyncError::Writer)?;

        self.set_phase(SyncPhase::Done);
        let report = SyncReport {
            units: dispatched,
            downloaded: stats.downloaded(),
            unchanged: stats.unchanged(),
            unavailable: stats.unavailable(),
            failed: stats.failed(),
            recorded: writer_report.applied,
            cancelled: cancel.is_cancelled(),
        };
        info!(
            units = report.units,
            downloaded = report.downloaded,
            unchanged = report.unchanged,
            unavailable = report.unavailable,
            failed = report.failed,
            "Sync complete"
        );
        Ok(report)
    }

    async fn enumerate(&self, cancel: &CancellationToken) -> Result<Vec<WorkUnit>, CatalogError> {
        if self.config.trove {
            let catalog = TroveCatalog::new(self.client.clone(), self.endpoints.clone());
            let products = catalog.products(cancel).await?;
            return Ok(products.into_iter().map(WorkUnit::Trove).collect());
        }

        let keys = if self.config.purchase_keys.is_empty() {
            fetch_purchase_keys(&self.client, &self.endpoints, cancel).await?
        } else {
            info!(count = self.config.purchase_keys.len(), "Using configured purchase keys");
            self.config.purchase_keys.clone()
        };
        Ok(keys.into_iter().map(WorkUnit::Order).collect())
    }
}

async fn run_unit(ctx: &UnitContext, unit: WorkUnit) -> Result<(), SyncError> {
    match unit {
        WorkUnit::Order(key) => {
            process_order(ctx, &key).await;
            Ok(())
        }
        WorkUnit::Trove(product) => process_trove_product(ctx, &product).await,
    }
}
