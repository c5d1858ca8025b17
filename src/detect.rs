//! Decides whether a remote file must be fetched.
//!
//! The same rules apply to purchased orders and to the trove:
//!
//! 1. A file the server no longer serves is [`Change::Unavailable`].
//! 2. A file with no cached record is new.
//! 3. Equal revision tokens mean unchanged.
//! 4. Equal content hashes mean unchanged even when the tokens differ.
//! 5. Anything else is a change, and the previous local file is kept under a
//!    dated name derived from the cached record.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::cache::CacheRecord;

/// What the remote side currently says about a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteState {
    /// Revision token (Last-Modified value, upload timestamp, ...).
    pub modified: Option<String>,
    /// Content hash, when the catalog publishes one.
    pub hash: Option<String>,
    /// False when the server refused to serve the file.
    pub available: bool,
}

impl RemoteState {
    /// An available file with the given token and hash.
    pub fn new(modified: Option<&str>, hash: Option<&str>) -> Self {
        Self {
            modified: modified.map(str::to_string),
            hash: hash.map(str::to_string),
            available: true,
        }
    }

    /// A file the server no longer serves.
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            modified: None,
            hash: None,
            available: false,
        }
    }
}

/// Date label for a superseded file, formatted `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameHint(String);

impl RenameHint {
    /// The date label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RenameHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of comparing remote state with the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// Local copy is current; skip.
    Unchanged,
    /// Fetch the file. A hint means an older copy exists and should be kept.
    NewOrChanged {
        /// Date label for the superseded file.
        rename_hint: Option<RenameHint>,
    },
    /// The server no longer serves this file; skip.
    Unavailable,
}

/// Compares `remote` with the cached record for the same file.
#[must_use]
pub fn detect(remote: &RemoteState, cached: Option<&CacheRecord>) -> Change {
    if !remote.available {
        return Change::Unavailable;
    }

    let Some(record) = cached.filter(|r| !r.is_empty()) else {
        return Change::NewOrChanged { rename_hint: None };
    };

    if let (Some(remote_token), Some(cached_token)) = (&remote.modified, &record.remote_modified)
        && remote_token == cached_token
    {
        return Change::Unchanged;
    }

    if let (Some(remote_hash), Some(cached_hash)) = (
        non_empty(remote.hash.as_deref()),
        non_empty(record.content_hash.as_deref()),
    ) && remote_hash.eq_ignore_ascii_case(cached_hash)
    {
        return Change::Unchanged;
    }

    Change::NewOrChanged {
        rename_hint: Some(rename_hint(record)),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn rename_hint(record: &CacheRecord) -> RenameHint {
    let date = record
        .remote_modified
        .as_deref()
        .and_then(token_date)
        .or_else(|| record.local_modified.map(|t| t.date_naive()))
        .unwrap_or_else(|| Utc::now().date_naive());
    RenameHint(date.format("%Y-%m-%d").to_string())
}

/// Reads a calendar date out of a revision token.
///
/// Accepts HTTP-dates, unix timestamps (seconds, UTC), RFC 3339 timestamps,
/// and plain `YYYY-MM-DD[THH:MM:SS]` forms.
#[must_use]
pub fn token_date(token: &str) -> Option<NaiveDate> {
    let token = token.trim();

    if let Ok(time) = httpdate::parse_http_date(token) {
        return Some(DateTime::<Utc>::from(time).date_naive());
    }
    if let Ok(seconds) = token.parse::<f64>() {
        if seconds.is_finite() && seconds > 0.0 {
            #[allow(clippy::cast_possible_truncation)]
            return DateTime::from_timestamp(seconds.trunc() as i64, 0).map(|t| t.date_naive());
        }
        return None;
    }
    if let Ok(time) = DateTime::parse_from_rfc3339(token) {
        return Some(time.with_timezone(&Utc).date_naive());
    }
    if let Ok(time) = NaiveDateTime::parse_from_str(token, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(time.date());
    }
    NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cached(token: Option<&str>, hash: Option<&str>) -> CacheRecord {
        CacheRecord {
            remote_modified: token.map(str::to_string),
            content_hash: hash.map(str::to_string),
            local_modified: Some(
                DateTime::parse_from_rfc3339("2022-12-25T10:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ),
        }
    }

    fn hint(date: &str) -> Change {
        Change::NewOrChanged {
            rename_hint: Some(RenameHint(date.to_string())),
        }
    }

    #[test]
    fn test_missing_record_is_new() {
        let remote = RemoteState::new(Some("2023-01-01"), None);
        assert_eq!(detect(&remote, None), Change::NewOrChanged { rename_hint: None });
        assert_eq!(
            detect(&remote, Some(&CacheRecord::default())),
            Change::NewOrChanged { rename_hint: None }
        );
    }

    #[test]
    fn test_same_token_is_unchanged() {
        let remote = RemoteState::new(Some("2023-01-01"), None);
        assert_eq!(detect(&remote, Some(&cached(Some("2023-01-01"), None))), Change::Unchanged);
    }

    #[test]
    fn test_new_token_is_changed_with_dated_hint() {
        let remote = RemoteState::new(Some("2023-06-01"), None);
        assert_eq!(
            detect(&remote, Some(&cached(Some("2023-01-01"), None))),
            hint("2023-01-01")
        );
    }

    #[test]
    fn test_matching_hash_overrides_token_drift() {
        let remote = RemoteState::new(Some("1690000000"), Some("ABC123"));
        assert_eq!(
            detect(&remote, Some(&cached(Some("1670000000"), Some("abc123")))),
            Change::Unchanged
        );
    }

    #[test]
    fn test_differing_hash_and_token_is_changed() {
        let remote = RemoteState::new(Some("1690000000"), Some("def"));
        assert_eq!(
            detect(&remote, Some(&cached(Some("1672574400"), Some("abc")))),
            hint("2023-01-01")
        );
    }

    #[test]
    fn test_empty_hashes_are_ignored() {
        let remote = RemoteState::new(Some("b"), Some(""));
        assert!(matches!(
            detect(&remote, Some(&cached(Some("a"), Some("")))),
            Change::NewOrChanged { .. }
        ));
    }

    #[test]
    fn test_hash_only_remote_matches_cache() {
        let remote = RemoteState::new(None, Some("abc"));
        assert_eq!(detect(&remote, Some(&cached(Some("x"), Some("abc")))), Change::Unchanged);
    }

    #[test]
    fn test_unavailable_wins() {
        assert_eq!(
            detect(&RemoteState::unavailable(), Some(&cached(Some("a"), None))),
            Change::Unavailable
        );
        assert_eq!(detect(&RemoteState::unavailable(), None), Change::Unavailable);
    }

    #[test]
    fn test_unparseable_token_falls_back_to_local_date() {
        let remote = RemoteState::new(Some("v2"), None);
        assert_eq!(detect(&remote, Some(&cached(Some("v1"), None))), hint("2022-12-25"));
    }

    #[test]
    fn test_token_date_formats() {
        let jan1 = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert_eq!(token_date("Sun, 01 Jan 2023 08:00:00 GMT"), Some(jan1));
        assert_eq!(token_date("1672574400"), Some(jan1));
        assert_eq!(token_date("1672574400.25"), Some(jan1));
        assert_eq!(token_date("2023-01-01T12:00:00+00:00"), Some(jan1));
        assert_eq!(token_date("2023-01-01T12:00:00"), Some(jan1));
        assert_eq!(token_date("2023-01-01"), Some(jan1));
        assert_eq!(token_date("0"), None);
        assert_eq!(token_date("not a date"), None);
    }
}
