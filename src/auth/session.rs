use std::path::Path;
use std::sync::Arc;

use reqwest::cookie::Jar;
use tracing::{debug, info, warn};

use super::{cookie_jar, parse_cookie_export};

/// Name of the storefront session cookie.
pub const SESSION_COOKIE_NAME: &str = "_simpleauth_sess";

/// How requests authenticate against the storefront.
#[derive(Clone)]
pub enum SessionCredentials {
    /// Cookies loaded from a browser export.
    CookieJar(Arc<Jar>),
    /// A raw `Cookie` header value sent on every request.
    CookieHeader(String),
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CookieJar(_) => f.write_str("CookieJar([REDACTED])"),
            Self::CookieHeader(_) => f.write_str("CookieHeader([REDACTED])"),
        }
    }
}

/// Errors raised while loading credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    /// The cookie file could not be read.
    #[error("cannot read cookie file '{path}': {source}")]
    Read {
        /// Cookie file path.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The cookie file was empty.
    #[error("cookie file '{path}' is empty")]
    Empty {
        /// Cookie file path.
        path: String,
    },

    /// A session token contained characters that can't go in a header.
    #[error("session token contains characters not allowed in a cookie")]
    InvalidToken,
}

impl SessionCredentials {
    /// Builds credentials from a bare session token.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::InvalidToken`] for empty tokens or tokens
    /// containing whitespace, `;` or control characters.
    pub fn from_session_token(token: &str) -> Result<Self, CredentialsError> {
        let token = token.trim();
        if token.is_empty()
            || token
                .chars()
                .any(|c| c.is_whitespace() || c.is_control() || c == ';')
        {
            return Err(CredentialsError::InvalidToken);
        }
        Ok(Self::CookieHeader(format!("{SESSION_COOKIE_NAME}={token}")))
    }

    /// Loads credentials from a cookie file.
    ///
    /// Netscape-format exports are loaded into a cookie jar. Anything else is
    /// treated as a raw `Cookie` header and sent verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialsError::Read`] when the file can't be read and
    /// [`CredentialsError::Empty`] when it holds nothing usable.
    pub fn from_cookie_file(path: &Path) -> Result<Self, CredentialsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let empty = || CredentialsError::Empty {
            path: path.display().to_string(),
        };

        let export = parse_cookie_export(&raw);
        if !export.cookies.is_empty() {
            for (line, reason) in &export.skipped {
                warn!(line, %reason, "skipping malformed cookie line");
            }
            info!(count = export.cookies.len(), "Loaded cookies");
            return Ok(Self::CookieJar(cookie_jar(&export.cookies)));
        }

        let header = raw.trim();
        if export.is_blank() || header.is_empty() {
            return Err(empty());
        }
        debug!("cookie file is not in Netscape format, using it as a raw Cookie header");
        if !header.contains(SESSION_COOKIE_NAME) {
            warn!("cookie header does not contain {SESSION_COOKIE_NAME}; requests may be rejected");
        }
        Ok(Self::CookieHeader(header.to_string()))
    }
}
