//! State shared by every work unit of a run, and the common download tail.

use std::sync::Arc;

use reqwest::Response;
use reqwest::header::LAST_MODIFIED;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::stats::SyncStats;
use crate::cache::{CacheIndex, CacheKey, CacheRecord, CompletionSender};
use crate::catalog::{Endpoints, FileFilter, TroveCatalog};
use crate::detect::RenameHint;
use crate::download::{DownloadExecutor, HttpClient, LibraryLayout};

/// What happened to one remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileOutcome {
    Downloaded,
    Unchanged,
    Unavailable,
    Failed,
    Filtered,
    Cancelled,
}

/// Read-only view every worker gets a clone of.
#[derive(Debug)]
pub(crate) struct UnitContext {
    pub client: HttpClient,
    pub endpoints: Endpoints,
    pub trove: TroveCatalog,
    pub layout: LibraryLayout,
    pub executor: DownloadExecutor,
    pub index: Arc<CacheIndex>,
    pub completions: CompletionSender,
    pub stats: Arc<SyncStats>,
    pub filter: FileFilter,
    pub content_types: Vec<String>,
    pub update: bool,
    pub cancel: CancellationToken,
}

/// Where a file lands and how it is recorded.
pub(crate) struct Target<'a> {
    pub key: CacheKey,
    pub container_name: &'a str,
    pub product_name: &'a str,
    pub remote_modified: Option<String>,
    pub content_hash: Option<String>,
}

impl UnitContext {
    /// True when the file was written before and the run is not re-checking.
    pub fn skip_cached(&self, key: &CacheKey) -> bool {
        !self.update && self.index.get(key).is_some_and(|r| !r.is_empty())
    }

    pub fn record(&self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Downloaded => self.stats.increment_downloaded(),
            FileOutcome::Unchanged => self.stats.increment_unchanged(),
            FileOutcome::Unavailable => self.stats.increment_unavailable(),
            FileOutcome::Failed => self.stats.increment_failed(),
            FileOutcome::Filtered | FileOutcome::Cancelled => {}
        }
    }

    /// Writes `response` into the product folder and queues the cache update.
    pub async fn store(
        &self,
        target: Target<'_>,
        response: Response,
        rename_hint: Option<RenameHint>,
    ) -> FileOutcome {
        let Target {
            key,
            container_name,
            product_name,
            remote_modified,
            content_hash,
        } = target;

        let folder = match self
            .layout
            .create_product_folder(container_name, product_name)
            .await
        {
            Ok(folder) => folder,
            Err(e) => {
                warn!(container = %key.container, file = %key.filename, error = %e, "cannot create product folder");
                return FileOutcome::Failed;
            }
        };

        let destination = folder.join(&key.filename);
        let hint = rename_hint.as_ref().map(RenameHint::as_str);
        match self
            .executor
            .download(response, &destination, hint, &self.cancel)
            .await
        {
            Ok(file) => {
                if let Some(old) = &file.superseded {
                    info!(container = %key.container, file = %key.filename, kept = %old.display(), "previous version kept");
                }
                let record = CacheRecord::completed(remote_modified, content_hash);
                if !self.completions.completed(key.clone(), record).await {
                    warn!(container = %key.container, file = %key.filename, "download not recorded in cache");
                }
                FileOutcome::Downloaded
            }
            Err(e) if e.is_cancelled() => {
                debug!(container = %key.container, file = %key.filename, "download cancelled");
                FileOutcome::Cancelled
            }
            Err(e) => {
                warn!(container = %key.container, file = %key.filename, error = %e, "download failed");
                FileOutcome::Failed
            }
        }
    }
}

/// The `Last-Modified` header, if present and readable.
pub(crate) fn last_modified(response: &Response) -> Option<String> {
    response
        .headers()
        .get(LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
