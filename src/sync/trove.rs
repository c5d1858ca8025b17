//! Processes one trove product.

use tracing::{debug, info, instrument, warn};

use super::context::{FileOutcome, Target, UnitContext};
use super::error::SyncError;
use crate::cache::{CacheKey, TROVE_CONTAINER};
use crate::catalog::{TroveDownload, TroveProduct};
use crate::detect::{Change, RemoteState, detect};
use crate::download::{file_extension, filename_from_url};

/// Top-level folder for trove files.
pub const TROVE_FOLDER: &str = "Humble Trove";

/// Downloads every new or changed platform file of `product`.
///
/// # Errors
///
/// Returns [`SyncError::Authorization`] when the account can't sign trove
/// downloads. Every other failure is logged and counted.
#[instrument(skip(ctx, product), fields(product = %product.human_name))]
pub(crate) async fn process_trove_product(
    ctx: &UnitContext,
    product: &TroveProduct,
) -> Result<(), SyncError> {
    for (platform, download) in &product.downloads {
        if ctx.cancel.is_cancelled() {
            return Ok(());
        }
        if !ctx.filter.allows_platform(platform) {
            continue;
        }
        let outcome = process_file(ctx, product, download).await?;
        ctx.record(outcome);
    }
    Ok(())
}

async fn process_file(
    ctx: &UnitContext,
    product: &TroveProduct,
    download: &TroveDownload,
) -> Result<FileOutcome, SyncError> {
    let Some(web_path) = download.web_path() else {
        debug!(machine_name = %download.machine_name, "no web download");
        return Ok(FileOutcome::Filtered);
    };
    let Some(filename) = filename_from_url(web_path) else {
        warn!(machine_name = %download.machine_name, path = web_path, "cannot derive a file name");
        return Ok(FileOutcome::Failed);
    };
    if !ctx.filter.allows_extension(&file_extension(&filename)) {
        debug!(file = %filename, "skipped by extension filter");
        return Ok(FileOutcome::Filtered);
    }

    let key = CacheKey::new(TROVE_CONTAINER, &filename);
    if ctx.skip_cached(&key) {
        debug!(file = %filename, "already downloaded");
        return Ok(FileOutcome::Unchanged);
    }

    let token = download.revision_token(product);
    let hash = download.hash();
    let rename_hint = match detect(&RemoteState::new(Some(&token), hash), ctx.index.get(&key)) {
        Change::Unchanged => {
            debug!(file = %filename, "unchanged");
            return Ok(FileOutcome::Unchanged);
        }
        Change::Unavailable => return Ok(FileOutcome::Unavailable),
        Change::NewOrChanged { rename_hint } => rename_hint,
    };

    let signed_url = match ctx
        .trove
        .sign(&download.machine_name, &filename, &ctx.cancel)
        .await
    {
        Ok(url) => url,
        Err(e) if e.is_cancelled() => return Ok(FileOutcome::Cancelled),
        Err(e) if e.is_authorization() => return Err(SyncError::Authorization(e)),
        Err(e) => {
            warn!(container = TROVE_CONTAINER, file = %filename, error = %e, "cannot sign download");
            return Ok(FileOutcome::Failed);
        }
    };

    let response = match ctx.client.get(&signed_url, &ctx.cancel).await {
        Ok(response) => response,
        Err(e) if e.is_cancelled() => return Ok(FileOutcome::Cancelled),
        Err(e) => {
            info!(container = TROVE_CONTAINER, file = %filename, error = %e, "file no longer available");
            return Ok(FileOutcome::Unavailable);
        }
    };

    info!(file = %filename, update = rename_hint.is_some(), "downloading");
    let target = Target {
        key,
        container_name: TROVE_FOLDER,
        product_name: &product.human_name,
        remote_modified: Some(token),
        content_hash: hash.map(str::to_string),
    };
    Ok(ctx.store(target, response, rename_hint).await)
}
