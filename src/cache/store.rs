//! JSON Lines journal of completed downloads.
//!
//! Every applied event appends one line and syncs it, so a crash loses at
//! most the event being written. Later lines win for the same key.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use super::error::CacheError;
use super::record::{CacheKey, CacheLine, CacheRecord};
use crate::detect::{Change, RemoteState, detect};

/// Journal file name inside the library root.
pub const CACHE_FILE_NAME: &str = ".hb-cache.jsonl";

/// In-memory view of the journal.
#[derive(Debug, Clone, Default)]
pub struct CacheIndex {
    records: HashMap<CacheKey, CacheRecord>,
}

impl CacheIndex {
    /// Record for `key`, if one was ever applied.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<&CacheRecord> {
        self.records.get(key)
    }

    /// Record for a container/filename pair, or the empty record.
    #[must_use]
    pub fn lookup(&self, container: &str, filename: &str) -> CacheRecord {
        self.records
            .get(&CacheKey::new(container, filename))
            .cloned()
            .unwrap_or_default()
    }

    /// Whether a file was ever written for `key`.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.records.contains_key(key)
    }

    /// Whether `key` is cached and still matches `remote`.
    #[must_use]
    pub fn contains_unchanged(&self, key: &CacheKey, remote: &RemoteState) -> bool {
        matches!(detect(remote, self.get(key)), Change::Unchanged)
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn insert(&mut self, key: CacheKey, record: CacheRecord) {
        self.records.insert(key, record);
    }
}

/// Sole owner of the journal file.
#[derive(Debug)]
pub struct CacheStore {
    path: PathBuf,
    index: CacheIndex,
    file: File,
    lines: usize,
}

impl CacheStore {
    /// Loads the journal at `path` and opens it for appending.
    ///
    /// A missing file is created. A torn final line left by a crash is
    /// dropped and truncated away.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Corrupt`] for an unreadable line and
    /// [`CacheError::Io`] when the file can't be read or opened.
    #[instrument(level = "debug", skip(path), fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        let loaded = read_journal(path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CacheError::io(path, e))?;
        if let Some(valid_len) = loaded.truncate_to {
            file.set_len(valid_len).map_err(|e| CacheError::io(path, e))?;
        }

        let mut store = Self {
            path: path.to_path_buf(),
            index: loaded.index,
            file,
            lines: loaded.lines,
        };
        if loaded.needs_newline {
            store.append_raw(b"\n")?;
        }

        info!(records = store.index.len(), path = %path.display(), "Loaded cache");
        Ok(store)
    }

    /// Reads the journal without opening it for writing.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open), except a missing file yields an empty index.
    pub fn load(path: &Path) -> Result<CacheIndex, CacheError> {
        Ok(read_journal(path)?.index)
    }

    /// Current view of the journal.
    #[must_use]
    pub fn index(&self) -> &CacheIndex {
        &self.index
    }

    /// Journal path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one record and syncs it to disk before updating the index.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] or [`CacheError::Encode`]; the index is
    /// left unchanged on error.
    pub fn apply(&mut self, key: CacheKey, record: CacheRecord) -> Result<(), CacheError> {
        let mut line = serde_json::to_vec(&CacheLine::new(&key, &record))?;
        line.push(b'\n');
        self.append_raw(&line)?;
        self.lines += 1;
        debug!(key = %key, "cache record applied");
        self.index.insert(key, record);
        Ok(())
    }

    /// Rewrites the journal with one line per key when superseded lines exist.
    ///
    /// Returns true when the file was rewritten.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] when the replacement can't be written; the
    /// existing journal is left in place.
    pub fn compact(&mut self) -> Result<bool, CacheError> {
        if self.lines <= self.index.len() {
            return Ok(false);
        }

        let mut entries: Vec<_> = self.index.records.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let mut body = Vec::new();
        for (key, record) in &entries {
            serde_json::to_writer(&mut body, &CacheLine::new(key, record))?;
            body.push(b'\n');
        }

        let temp_path = self.path.with_extension("jsonl.tmp");
        let write_temp = || -> std::io::Result<()> {
            let mut temp = File::create(&temp_path)?;
            temp.write_all(&body)?;
            temp.sync_all()?;
            fs::rename(&temp_path, &self.path)
        };
        if let Err(e) = write_temp() {
            let _ = fs::remove_file(&temp_path);
            return Err(CacheError::io(&self.path, e));
        }

        self.file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| CacheError::io(&self.path, e))?;
        info!(before = self.lines, after = entries.len(), "Compacted cache");
        self.lines = entries.len();
        Ok(true)
    }

    fn append_raw(&mut self, bytes: &[u8]) -> Result<(), CacheError> {
        self.file
            .write_all(bytes)
            .and_then(|()| self.file.flush())
            .and_then(|()| self.file.sync_data())
            .map_err(|e| CacheError::io(&self.path, e))
    }
}

struct LoadedJournal {
    index: CacheIndex,
    lines: usize,
    truncate_to: Option<u64>,
    needs_newline: bool,
}

fn read_journal(path: &Path) -> Result<LoadedJournal, CacheError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no cache yet");
            String::new()
        }
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            return Err(CacheError::corrupt(path, 0, "journal is not valid UTF-8"));
        }
        Err(e) => return Err(CacheError::io(path, e)),
    };

    let mut loaded = LoadedJournal {
        index: CacheIndex::default(),
        lines: 0,
        truncate_to: None,
        needs_newline: false,
    };
    let mut offset = 0usize;

    for (idx, segment) in raw.split_inclusive('\n').enumerate() {
        let line_number = idx + 1;
        let complete = segment.ends_with('\n');
        let text = segment.trim();
        let start = offset;
        offset += segment.len();

        if text.is_empty() {
            continue;
        }

        match serde_json::from_str::<CacheLine>(text) {
            Ok(line) => {
                let (key, record) = line.into_entry();
                loaded.index.insert(key, record);
                loaded.lines += 1;
                loaded.needs_newline = !complete;
            }
            Err(e) if !complete => {
                warn!(
                    path = %path.display(),
                    line = line_number,
                    error = %e,
                    "dropping incomplete final cache line"
                );
                loaded.truncate_to = Some(start as u64);
            }
            Err(e) => return Err(CacheError::corrupt(path, line_number, e.to_string())),
        }
    }

    Ok(loaded)
}
