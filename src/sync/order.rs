//! Processes one purchased order.

use tracing::{debug, info, instrument, warn};

use super::context::{FileOutcome, Target, UnitContext, last_modified};
use crate::cache::CacheKey;
use crate::catalog::{DownloadStruct, Order, Subproduct, fetch_order};
use crate::detect::{Change, RemoteState, detect};
use crate::download::{file_extension, filename_from_url};

/// Downloads every new or changed file of the order `key`.
///
/// Failures are logged and counted; nothing here ends the run.
#[instrument(skip(ctx), fields(order = %key))]
pub(crate) async fn process_order(ctx: &UnitContext, key: &str) {
    let order = match fetch_order(&ctx.client, &ctx.endpoints, key, &ctx.cancel).await {
        Ok(order) => order,
        Err(e) if e.is_cancelled() => return,
        Err(e) => {
            warn!(order = key, error = %e, "cannot fetch order");
            ctx.stats.increment_failed();
            return;
        }
    };
    debug!(order = key, bundle = %order.product.human_name, "order loaded");

    for subproduct in &order.subproducts {
        let platforms = subproduct
            .downloads
            .iter()
            .filter(|d| ctx.filter.allows_platform(&d.platform));
        for platform in platforms {
            for file in &platform.download_struct {
                for content_type in &ctx.content_types {
                    if ctx.cancel.is_cancelled() {
                        return;
                    }
                    let Some(url) = file.url_for(content_type) else {
                        if file.declares_content() {
                            warn!(
                                order = key,
                                product = %subproduct.human_name,
                                platform = %platform.platform,
                                content_type = %content_type,
                                "no URL offered for file"
                            );
                        }
                        continue;
                    };
                    let outcome = process_file(ctx, key, &order, subproduct, file, url).await;
                    ctx.record(outcome);
                }
            }
        }
    }
}

async fn process_file(
    ctx: &UnitContext,
    key: &str,
    order: &Order,
    subproduct: &Subproduct,
    file: &DownloadStruct,
    url: &str,
) -> FileOutcome {
    let Some(filename) = filename_from_url(url) else {
        warn!(order = key, url, "cannot derive a file name from URL");
        return FileOutcome::Failed;
    };
    if !ctx.filter.allows_extension(&file_extension(&filename)) {
        debug!(order = key, file = %filename, "skipped by extension filter");
        return FileOutcome::Filtered;
    }

    let cache_key = CacheKey::new(key, &filename);
    if ctx.skip_cached(&cache_key) {
        debug!(order = key, file = %filename, "already downloaded");
        return FileOutcome::Unchanged;
    }

    let listed_token = file.revision_token();
    let hash = file.hash();
    if ctx
        .index
        .contains_unchanged(&cache_key, &RemoteState::new(listed_token.as_deref(), hash))
    {
        debug!(order = key, file = %filename, "unchanged per catalog");
        return FileOutcome::Unchanged;
    }

    let response = match ctx.client.get(url, &ctx.cancel).await {
        Ok(response) => response,
        Err(e) if e.is_cancelled() => return FileOutcome::Cancelled,
        Err(e) => {
            info!(order = key, file = %filename, error = %e, "file no longer available");
            return FileOutcome::Unavailable;
        }
    };

    let token = listed_token.or_else(|| last_modified(&response));
    let remote = RemoteState::new(token.as_deref(), hash);
    match detect(&remote, ctx.index.get(&cache_key)) {
        Change::Unchanged => {
            debug!(order = key, file = %filename, "unchanged");
            FileOutcome::Unchanged
        }
        Change::Unavailable => FileOutcome::Unavailable,
        Change::NewOrChanged { rename_hint } => {
            info!(order = key, file = %filename, update = rename_hint.is_some(), "downloading");
            let target = Target {
                key: cache_key,
                container_name: &order.product.human_name,
                product_name: &subproduct.human_name,
                remote_modified: token,
                content_hash: hash.map(str::to_string),
            };
            ctx.store(target, response, rename_hint).await
        }
    }
}
