//! Browser cookie exports in the Netscape `cookies.txt` layout.
//!
//! Each data line carries seven TAB-separated columns:
//! `domain  include-subdomains  path  secure  expires  name  value`.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use reqwest::cookie::Jar;
use tracing::{debug, warn};
use url::Url;

/// Exporters mark HttpOnly cookies by prefixing the domain column.
const HTTP_ONLY_MARKER: &str = "#HttpOnly_";

/// Why a data line was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CookieLineError {
    #[error("expected 7 TAB-separated columns, found {0}")]
    ColumnCount(usize),
    #[error("domain column is empty")]
    EmptyDomain,
    #[error("cookie name column is empty")]
    EmptyName,
    #[error("secure column must be TRUE or FALSE, got '{0}'")]
    Secure(String),
    #[error("expires column must be a non-negative integer, got '{0}'")]
    Expires(String),
}

/// One cookie from an export. `Debug` never shows the value.
#[derive(Clone)]
pub struct ExportedCookie {
    pub domain: String,
    pub path: String,
    pub secure: bool,
    /// Unix seconds; 0 for a session cookie.
    pub expires: u64,
    pub name: String,
    value: String,
}

impl fmt::Debug for ExportedCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportedCookie")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ExportedCookie {
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// URL the cookie is scoped to, used to place it in a jar.
    #[must_use]
    pub fn origin(&self) -> Option<Url> {
        let scheme = if self.secure { "https" } else { "http" };
        let host = self.domain.trim_start_matches('.');
        Url::parse(&format!("{scheme}://{host}{}", self.path)).ok()
    }

    /// The cookie rendered as a `Set-Cookie` value.
    #[must_use]
    pub fn set_cookie(&self) -> String {
        let mut header = format!(
            "{}={}; Domain={}; Path={}",
            self.name, self.value, self.domain, self.path
        );
        if self.secure {
            header.push_str("; Secure");
        }
        if self.expires > 0
            && let Some(at) = UNIX_EPOCH.checked_add(Duration::from_secs(self.expires))
        {
            header.push_str("; Expires=");
            header.push_str(&httpdate::fmt_http_date(at));
        }
        header
    }
}

/// Parsed export: accepted cookies plus the data lines that were skipped.
#[derive(Debug, Default)]
pub struct CookieExport {
    pub cookies: Vec<ExportedCookie>,
    /// `(1-based line number, reason)`.
    pub skipped: Vec<(usize, CookieLineError)>,
}

impl CookieExport {
    /// True when the text had no data lines at all, only comments or blanks.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.cookies.is_empty() && self.skipped.is_empty()
    }
}

/// Parses the text of a cookie export. Bad lines are skipped, not fatal.
#[must_use]
pub fn parse_cookie_export(text: &str) -> CookieExport {
    let mut export = CookieExport::default();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim_end();
        let line = match line.strip_prefix(HTTP_ONLY_MARKER) {
            Some(rest) => rest,
            None if line.is_empty() || line.starts_with('#') => continue,
            None => line,
        };
        match parse_line(line) {
            Ok(cookie) => {
                debug!(line = index + 1, domain = %cookie.domain, name = %cookie.name, "cookie accepted");
                export.cookies.push(cookie);
            }
            Err(reason) => export.skipped.push((index + 1, reason)),
        }
    }
    export
}

fn parse_line(line: &str) -> Result<ExportedCookie, CookieLineError> {
    let columns: Vec<&str> = line.split('\t').collect();
    let &[domain, _, path, secure, expires, name, value] = columns.as_slice() else {
        return Err(CookieLineError::ColumnCount(columns.len()));
    };
    if domain.is_empty() {
        return Err(CookieLineError::EmptyDomain);
    }
    if name.is_empty() {
        return Err(CookieLineError::EmptyName);
    }
    let secure = match secure {
        "TRUE" => true,
        "FALSE" => false,
        other => return Err(CookieLineError::Secure(other.to_string())),
    };
    let expires = expires
        .parse()
        .map_err(|_| CookieLineError::Expires(expires.to_string()))?;

    Ok(ExportedCookie {
        domain: domain.to_string(),
        path: path.to_string(),
        secure,
        expires,
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Builds a jar holding every cookie whose domain forms a valid URL.
#[must_use]
pub fn cookie_jar(cookies: &[ExportedCookie]) -> Arc<Jar> {
    let jar = Arc::new(Jar::default());
    for cookie in cookies {
        match cookie.origin() {
            Some(origin) => jar.add_cookie_str(&cookie.set_cookie(), &origin),
            None => warn!(domain = %cookie.domain, name = %cookie.name, "cookie domain is not a valid host"),
        }
    }
    jar
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore;

    const SESSION_LINE: &str = ".humblebundle.com\tTRUE\t/\tTRUE\t0\t_simpleauth_sess\tabc123";

    #[test]
    fn test_export_with_header_and_two_cookies() {
        let text = format!(
            "# Netscape HTTP Cookie File\n\n{SESSION_LINE}\n.humblebundle.com\tTRUE\t/\tFALSE\t1700000000\tcsrf\txyz\n"
        );
        let export = parse_cookie_export(&text);
        assert!(export.skipped.is_empty());
        assert_eq!(export.cookies.len(), 2);
        assert_eq!(export.cookies[0].name, "_simpleauth_sess");
        assert_eq!(export.cookies[0].value(), "abc123");
        assert!(export.cookies[0].secure);
        assert_eq!(export.cookies[1].expires, 1_700_000_000);
    }

    #[test]
    fn test_http_only_marker_is_stripped() {
        let export = parse_cookie_export(&format!("#HttpOnly_{SESSION_LINE}\r\n"));
        assert_eq!(export.cookies.len(), 1);
        assert_eq!(export.cookies[0].domain, ".humblebundle.com");
    }

    #[test]
    fn test_bad_lines_are_skipped_with_line_numbers() {
        let text = format!("# header\n{SESSION_LINE}\n_simpleauth_sess=abc; other=1\n");
        let export = parse_cookie_export(&text);
        assert_eq!(export.cookies.len(), 1);
        assert_eq!(export.skipped, vec![(3, CookieLineError::ColumnCount(1))]);
    }

    #[test]
    fn test_invalid_columns() {
        let cases = [
            (".a.com\tTRUE\t/\tMAYBE\t0\tn\tv", CookieLineError::Secure("MAYBE".into())),
            (".a.com\tTRUE\t/\tFALSE\tsoon\tn\tv", CookieLineError::Expires("soon".into())),
            ("\tTRUE\t/\tFALSE\t0\tn\tv", CookieLineError::EmptyDomain),
            (".a.com\tTRUE\t/\tFALSE\t0\t\tv", CookieLineError::EmptyName),
        ];
        for (line, expected) in cases {
            assert_eq!(parse_line(line).unwrap_err(), expected, "{line:?}");
        }
    }

    #[test]
    fn test_comment_only_export_is_blank() {
        assert!(parse_cookie_export("# Netscape HTTP Cookie File\n\n").is_blank());
        assert!(!parse_cookie_export("garbage\n").is_blank());
    }

    #[test]
    fn test_debug_hides_value() {
        let export = parse_cookie_export(".a.com\tTRUE\t/\tFALSE\t0\ts\tsuper_secret\n");
        let rendered = format!("{:?}", export.cookies[0]);
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("super_secret"));
    }

    #[test]
    fn test_set_cookie_includes_expiry() {
        let export = parse_cookie_export(".a.com\tTRUE\t/x\tTRUE\t1700000000\ts\tv\n");
        assert_eq!(
            export.cookies[0].set_cookie(),
            "s=v; Domain=.a.com; Path=/x; Secure; Expires=Tue, 14 Nov 2023 22:13:20 GMT"
        );
    }

    #[test]
    fn test_jar_sends_session_cookie_to_storefront() {
        let export = parse_cookie_export(SESSION_LINE);
        let jar = cookie_jar(&export.cookies);
        let library: Url = "https://www.humblebundle.com/home/library".parse().unwrap();
        let header = jar.cookies(&library).unwrap();
        assert_eq!(header.to_str().unwrap(), "_simpleauth_sess=abc123");
    }
}
