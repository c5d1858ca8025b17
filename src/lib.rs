//! hb-downloader core library
//!
//! Keeps a local folder in sync with a purchased digital library: it lists
//! orders (or the trove catalog), decides per file whether the local copy is
//! current, and downloads new or updated files without ever leaving a
//! truncated file behind.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`auth`] - Session cookies and tokens
//! - [`cache`] - Durable journal of downloaded files and its single writer
//! - [`catalog`] - Storefront documents, filters and trove signing
//! - [`detect`] - New/changed/unchanged decision per file
//! - [`download`] - HTTP client with retry, atomic file writer, naming
//! - [`sync`] - Worker pool tying everything together

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod cache;
pub mod catalog;
pub mod detect;
pub mod download;
pub mod sync;

// Re-export commonly used types
pub use auth::{CredentialsError, SessionCredentials};
pub use cache::{CacheError, CacheKey, CacheRecord, CacheStore};
pub use catalog::{CatalogError, Endpoints, ExtensionFilter, FileFilter};
pub use detect::{Change, RemoteState, RenameHint, detect};
pub use download::{DownloadError, DownloadExecutor, HttpClient, HttpSettings, RetryPolicy};
pub use sync::{SyncConfig, SyncCoordinator, SyncError, SyncPhase, SyncReport};
