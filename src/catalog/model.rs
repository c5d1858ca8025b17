//! Typed views of the storefront's JSON documents.
//!
//! Only the fields the sync reads are modelled; everything else is ignored.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

/// Revision markers arrive as strings or numbers depending on the endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawToken {
    /// Text form (dates, opaque markers).
    Text(String),
    /// Integer form (unix seconds).
    Integer(i64),
    /// Fractional form (unix seconds with sub-second part).
    Float(f64),
}

impl RawToken {
    /// Canonical string form used as the cache token.
    #[must_use]
    pub fn to_token(&self) -> Option<String> {
        match self {
            Self::Text(text) => {
                let text = text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            Self::Integer(value) => Some(value.to_string()),
            Self::Float(value) => Some(value.to_string()),
        }
    }
}

fn first_token(candidates: &[Option<&RawToken>]) -> Option<String> {
    candidates.iter().flatten().find_map(|t| t.to_token())
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// One purchase as returned by `/api/v1/order/{key}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    /// Bundle-level information.
    pub product: OrderProduct,
    /// Titles included in the purchase.
    #[serde(default)]
    pub subproducts: Vec<Subproduct>,
}

/// Bundle-level information of an order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderProduct {
    /// Display name of the bundle.
    pub human_name: String,
}

/// A purchased title.
#[derive(Debug, Clone, Deserialize)]
pub struct Subproduct {
    /// Display name of the title.
    pub human_name: String,
    /// Per-platform downloads.
    #[serde(default)]
    pub downloads: Vec<PlatformDownload>,
}

/// All files offered for one platform of a title.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformDownload {
    /// Platform tag (`windows`, `ebook`, `audio`, ...).
    pub platform: String,
    /// Individual files.
    #[serde(default)]
    pub download_struct: Vec<DownloadStruct>,
}

/// One downloadable file of a platform entry.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadStruct {
    /// Label shown on the storefront (`PDF`, `Download`, ...).
    #[serde(default)]
    pub name: Option<String>,
    /// URLs keyed by content type (`web`, `bittorrent`).
    #[serde(default)]
    pub url: HashMap<String, Option<String>>,
    /// MD5 of the file.
    #[serde(default)]
    pub md5: Option<String>,
    /// Size as displayed, e.g. `1.2 GB` or `0 bytes`.
    #[serde(default)]
    pub human_size: Option<String>,
    /// Upload marker, when present.
    #[serde(default)]
    pub uploaded_at: Option<RawToken>,
    /// Alternative upload marker.
    #[serde(default)]
    pub timestamp: Option<RawToken>,
}

impl DownloadStruct {
    /// URL for a content type, if offered.
    #[must_use]
    pub fn url_for(&self, content_type: &str) -> Option<&str> {
        non_empty(self.url.get(content_type).and_then(Option::as_ref))
    }

    /// Whether the storefront lists this file with a non-zero size.
    #[must_use]
    pub fn declares_content(&self) -> bool {
        self.human_size
            .as_deref()
            .is_none_or(|size| size.trim() != "0 bytes")
    }

    /// Revision token published in the order document, if any.
    #[must_use]
    pub fn revision_token(&self) -> Option<String> {
        first_token(&[self.uploaded_at.as_ref(), self.timestamp.as_ref()])
    }

    /// Content hash, if published.
    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        non_empty(self.md5.as_ref())
    }
}

/// One title of the trove catalog (`/client/catalog?index=N`).
#[derive(Debug, Clone, Deserialize)]
pub struct TroveProduct {
    /// Display name.
    #[serde(rename = "human-name")]
    pub human_name: String,
    /// When the title joined the catalog.
    #[serde(default)]
    pub date_added: Option<RawToken>,
    /// Files keyed by platform.
    #[serde(default)]
    pub downloads: BTreeMap<String, TroveDownload>,
}

/// One platform file of a trove title.
#[derive(Debug, Clone, Deserialize)]
pub struct TroveDownload {
    /// Identifier passed to the signing endpoint.
    pub machine_name: String,
    /// Paths keyed by content type; `web` is the signable one.
    #[serde(default)]
    pub url: HashMap<String, Option<String>>,
    /// Upload marker.
    #[serde(default)]
    pub uploaded_at: Option<RawToken>,
    /// Alternative upload marker.
    #[serde(default)]
    pub timestamp: Option<RawToken>,
    /// MD5 of the file.
    #[serde(default)]
    pub md5: Option<String>,
}

impl TroveDownload {
    /// The `web` path, used both for signing and as the file name source.
    #[must_use]
    pub fn web_path(&self) -> Option<&str> {
        non_empty(self.url.get("web").and_then(Option::as_ref))
    }

    /// Revision token: `uploaded_at`, else `timestamp`, else the title's
    /// `date_added`, else `"0"`.
    #[must_use]
    pub fn revision_token(&self, product: &TroveProduct) -> String {
        first_token(&[
            self.uploaded_at.as_ref(),
            self.timestamp.as_ref(),
            product.date_added.as_ref(),
        ])
        .unwrap_or_else(|| "0".to_string())
    }

    /// Content hash, if published.
    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        non_empty(self.md5.as_ref())
    }
}

/// Reply of the URL signing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SignedUrl {
    /// Short-lived download URL.
    #[serde(default)]
    pub signed_url: Option<String>,
    /// Error marker, `Unauthorized` when the account has no trove access.
    #[serde(default, rename = "_errors")]
    pub errors: Option<serde_json::Value>,
}

impl SignedUrl {
    /// True when the server refused to sign for this account.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        match &self.errors {
            Some(serde_json::Value::String(text)) => text.eq_ignore_ascii_case("unauthorized"),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .any(|v| v.as_str().is_some_and(|t| t.eq_ignore_ascii_case("unauthorized"))),
            _ => false,
        }
    }
}
