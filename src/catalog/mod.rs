//! Remote catalog: purchase keys, order documents and the trove.
//!
//! Everything here is read-only against the storefront. Deciding what to
//! download and writing files is the job of [`crate::sync`].

mod endpoints;
mod error;
mod filter;
mod library;
mod model;
mod trove;

pub use endpoints::{DEFAULT_BASE_URL, Endpoints};
pub use error::CatalogError;
pub use filter::{ExtensionFilter, FileFilter};
pub use library::{fetch_purchase_keys, parse_purchase_keys};
pub use model::{
    DownloadStruct, Order, OrderProduct, PlatformDownload, RawToken, SignedUrl, Subproduct,
    TroveDownload, TroveProduct,
};
pub use trove::TroveCatalog;

use tokio_util::sync::CancellationToken;

use crate::download::HttpClient;

/// Fetches the order document for one purchase key.
///
/// # Errors
///
/// Returns [`CatalogError::Fetch`] on transport or decode failure.
pub async fn fetch_order(
    client: &HttpClient,
    endpoints: &Endpoints,
    key: &str,
    cancel: &CancellationToken,
) -> Result<Order, CatalogError> {
    Ok(client.get_json(&endpoints.order(key), cancel).await?)
}
