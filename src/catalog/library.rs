//! Purchase keys from the account's library page.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::endpoints::Endpoints;
use super::error::CatalogError;
use crate::download::HttpClient;

#[allow(clippy::expect_used)]
static ACCOUNT_DATA_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<script[^>]*\bid\s*=\s*["']user-home-json-data["'][^>]*>(.*?)</script>"#,
    )
    .expect("account data regex is valid")
});

#[derive(Debug, Deserialize)]
struct AccountData {
    #[serde(default)]
    gamekeys: Option<Vec<String>>,
}

/// Extracts purchase keys from the library page HTML.
///
/// # Errors
///
/// Returns [`CatalogError::InvalidSession`] when the page has no account data
/// (the storefront serves a login page instead), and
/// [`CatalogError::Malformed`] when the embedded JSON can't be read.
pub fn parse_purchase_keys(html: &str) -> Result<Vec<String>, CatalogError> {
    let Some(captures) = ACCOUNT_DATA_PATTERN.captures(html) else {
        return Err(CatalogError::InvalidSession {
            reason: "library page has no account data".to_string(),
        });
    };
    let json = captures.get(1).map_or("", |m| m.as_str()).trim();
    let data: AccountData =
        serde_json::from_str(json).map_err(|e| CatalogError::Malformed { reason: e.to_string() })?;

    let Some(keys) = data.gamekeys else {
        return Err(CatalogError::InvalidSession {
            reason: "account data has no purchase keys".to_string(),
        });
    };
    let mut seen = std::collections::HashSet::new();
    Ok(keys
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect())
}

/// Fetches the library page and returns every purchase key on the account.
///
/// # Errors
///
/// See [`parse_purchase_keys`]; transport failures come back as
/// [`CatalogError::Fetch`].
#[instrument(skip(client, endpoints, cancel))]
pub async fn fetch_purchase_keys(
    client: &HttpClient,
    endpoints: &Endpoints,
    cancel: &CancellationToken,
) -> Result<Vec<String>, CatalogError> {
    let url = endpoints.library();
    debug!(url = %url, "fetching library page");
    let html = client.get_text(&url, cancel).await?;
    let keys = parse_purchase_keys(&html)?;
    info!(count = keys.len(), "Found purchase keys");
    Ok(keys)
}
