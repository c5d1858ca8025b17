use std::path::{Path, PathBuf};

use crate::cache::CACHE_FILE_NAME;
use crate::catalog::FileFilter;

/// Content type fetched when none is configured.
pub const DEFAULT_CONTENT_TYPE: &str = "web";

/// Everything a sync run needs to know besides credentials.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Root of the local library.
    pub library_path: PathBuf,
    /// Platform and extension filter.
    pub filter: FileFilter,
    /// URL categories to fetch, in order (`web`, `bittorrent`).
    pub content_types: Vec<String>,
    /// Re-check cached files against the server.
    pub update: bool,
    /// Sync the trove catalog instead of purchased orders.
    pub trove: bool,
    /// Explicit purchase keys; when empty they are read from the account.
    pub purchase_keys: Vec<String>,
    /// Units processed in parallel.
    pub workers: usize,
    /// Show per-file progress bars.
    pub progress: bool,
    /// Journal file name inside the library root.
    pub cache_file_name: String,
}

impl SyncConfig {
    /// Defaults for a library rooted at `library_path`.
    pub fn new(library_path: impl Into<PathBuf>) -> Self {
        Self {
            library_path: library_path.into(),
            filter: FileFilter::default(),
            content_types: vec![DEFAULT_CONTENT_TYPE.to_string()],
            update: false,
            trove: false,
            purchase_keys: Vec::new(),
            workers: num_cpus::get(),
            progress: false,
            cache_file_name: CACHE_FILE_NAME.to_string(),
        }
    }

    /// Journal location.
    #[must_use]
    pub fn cache_path(&self) -> PathBuf {
        self.library_path.join(&self.cache_file_name)
    }

    /// Library root.
    #[must_use]
    pub fn library_path(&self) -> &Path {
        &self.library_path
    }

    /// Worker count, never below one.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }

    /// Configured content types, falling back to `web`.
    #[must_use]
    pub fn effective_content_types(&self) -> Vec<String> {
        let types: Vec<String> = self
            .content_types
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if types.is_empty() {
            vec![DEFAULT_CONTENT_TYPE.to_string()]
        } else {
            types
        }
    }
}
