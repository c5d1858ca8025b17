//! Durable record of files already written to the library.
//!
//! - [`CacheStore`] owns the journal file and is the only thing that writes it.
//! - [`CacheIndex`] is the read-only snapshot workers consult.
//! - [`CacheWriter`] runs the store behind a multi-producer queue of
//!   [`CacheEvent`]s.

mod error;
mod record;
mod store;
mod writer;

pub use error::CacheError;
pub use record::{CacheKey, CacheRecord, TROVE_CONTAINER};
pub use store::{CACHE_FILE_NAME, CacheIndex, CacheStore};
pub use writer::{CacheEvent, CacheWriter, CompletionSender, DEFAULT_QUEUE_CAPACITY, WriterReport};
