//! HTTP fetching and atomic file writes.
//!
//! This module provides the fetch capability used by every other part of a
//! sync run, plus the executor that writes response bodies into the library.
//!
//! # Features
//!
//! - Session credentials attached to every request (cookie jar or raw header)
//! - Configurable timeouts (30s connect, 5min between reads by default)
//! - Bounded retry with exponential backoff for 429/500/502/503/504
//! - Streaming writes through a temp file, promoted with a rename
//! - Superseded files kept under a dated name
//! - Optional per-file progress bars
//!
//! # Example
//!
//! ```no_run
//! use hb_downloader_core::download::{DownloadExecutor, HttpClient, HttpSettings};
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(None, &HttpSettings::default())?;
//! let cancel = CancellationToken::new();
//! let response = client.get("https://example.com/book.pdf", &cancel).await?;
//! let file = DownloadExecutor::default()
//!     .download(response, Path::new("./book.pdf"), None, &cancel)
//!     .await?;
//! println!("Downloaded: {}", file.path.display());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod executor;
mod filename;
mod progress;
mod retry;

pub use client::{HttpClient, HttpSettings, parse_retry_after, with_cancel};
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::DownloadError;
pub use executor::{DownloadExecutor, DownloadedFile};
pub use filename::{LibraryLayout, clean_name, dated_sibling_path, file_extension, filename_from_url};
pub use progress::{FileProgress, Progress};
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
    is_retryable_status,
};
