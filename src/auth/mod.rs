//! Session credentials for the storefront.
//!
//! Credentials come either from a browser cookie export (Netscape format or a
//! raw `Cookie` header pasted into a file) or from a bare session token.

mod cookies;
mod session;

pub use cookies::{CookieExport, CookieLineError, ExportedCookie, cookie_jar, parse_cookie_export};
pub use session::{CredentialsError, SESSION_COOKIE_NAME, SessionCredentials};
