use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one file of one container (order key, or `trove`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    /// Order key, or [`TROVE_CONTAINER`] for subscription files.
    pub container: String,
    /// Remote file name.
    pub filename: String,
}

/// Container id shared by every trove file.
pub const TROVE_CONTAINER: &str = "trove";

impl CacheKey {
    /// Creates a key.
    pub fn new(container: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            filename: filename.into(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.filename)
    }
}

/// Last known state of a file that was written to the library.
///
/// The default value is the empty record returned for unknown keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheRecord {
    /// Remote revision token at the time of the download.
    pub remote_modified: Option<String>,
    /// Content hash reported by the catalog, if any.
    pub content_hash: Option<String>,
    /// When the file was written locally.
    pub local_modified: Option<DateTime<Utc>>,
}

impl CacheRecord {
    /// Record for a file that was just written.
    #[must_use]
    pub fn completed(remote_modified: Option<String>, content_hash: Option<String>) -> Self {
        Self {
            remote_modified,
            content_hash,
            local_modified: Some(Utc::now()),
        }
    }

    /// True for the empty record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remote_modified.is_none() && self.content_hash.is_none() && self.local_modified.is_none()
    }
}

/// One journal line. Unknown fields are ignored on read.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CacheLine {
    pub container: String,
    pub filename: String,
    #[serde(default)]
    pub remote_modified: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub local_modified: Option<DateTime<Utc>>,
}

impl CacheLine {
    pub(crate) fn new(key: &CacheKey, record: &CacheRecord) -> Self {
        Self {
            container: key.container.clone(),
            filename: key.filename.clone(),
            remote_modified: record.remote_modified.clone(),
            content_hash: record.content_hash.clone(),
            local_modified: record.local_modified,
        }
    }

    pub(crate) fn into_entry(self) -> (CacheKey, CacheRecord) {
        (
            CacheKey {
                container: self.container,
                filename: self.filename,
            },
            CacheRecord {
                remote_modified: self.remote_modified,
                content_hash: self.content_hash,
                local_modified: self.local_modified,
            },
        )
    }
}
