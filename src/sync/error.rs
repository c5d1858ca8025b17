use std::path::PathBuf;

use thiserror::Error;

use crate::cache::CacheError;
use crate::catalog::CatalogError;

/// Failures that end a sync run.
///
/// Per-file problems never surface here; they are logged and counted in
/// [`SyncStats`](super::SyncStats).
#[derive(Debug, Error)]
pub enum SyncError {
    /// The session was rejected while listing purchases or signing a trove
    /// download.
    #[error("authorization failed: {0}")]
    Authorization(#[source] CatalogError),

    /// The cache journal could not be loaded; nothing can be skipped safely.
    #[error("cache is unusable: {0}")]
    CorruptCache(#[source] CacheError),

    /// The catalog could not be enumerated.
    #[error("catalog unavailable: {0}")]
    Catalog(#[source] CatalogError),

    /// The cache writer failed while draining.
    #[error("cache writer failed: {0}")]
    Writer(#[source] CacheError),

    /// The library root could not be created.
    #[error("cannot create library directory {path}: {source}")]
    Library {
        /// Library root.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Routes a catalog failure to the authorization or catalog variant.
    #[must_use]
    pub fn from_catalog(error: CatalogError) -> Self {
        if error.is_authorization() {
            Self::Authorization(error)
        } else {
            Self::Catalog(error)
        }
    }

    /// True for [`SyncError::Authorization`].
    #[must_use]
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Authorization(_))
    }
}
