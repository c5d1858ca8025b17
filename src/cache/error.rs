use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the cache journal.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading, appending to, or replacing the journal failed.
    #[error("cache IO error at {path}: {source}")]
    Io {
        /// Journal path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A journal line could not be understood. The cache can't be trusted.
    #[error("corrupt cache {path} at line {line}: {reason}")]
    Corrupt {
        /// Journal path.
        path: PathBuf,
        /// 1-based line number.
        line: usize,
        /// Parser message.
        reason: String,
    },

    /// A record could not be serialized.
    #[error("cannot encode cache record: {0}")]
    Encode(#[from] serde_json::Error),

    /// The writer task ended abnormally.
    #[error("cache writer stopped: {reason}")]
    Writer {
        /// What happened to the task.
        reason: String,
    },
}

impl CacheError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a corruption error.
    pub fn corrupt(path: impl Into<PathBuf>, line: usize, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            line,
            reason: reason.into(),
        }
    }
}
