//! Wires configuration, credentials and interrupts around one sync run.

use anyhow::{Context, Result};
use hb_downloader_core::catalog::Endpoints;
use hb_downloader_core::{HttpClient, SessionCredentials, SyncCoordinator};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::config::{self, CredentialSource};
use crate::app::exit_handler::{self, ProcessExit};
use crate::app::terminal;
use crate::cli::Args;

pub(crate) async fn run_sync(args: Args) -> Result<ProcessExit> {
    terminal::init_tracing(
        terminal::default_log_level(&args),
        terminal::is_no_color_requested(&args),
    );
    debug!(
        library = ?args.library_path,
        update = args.update,
        trove = args.trove,
        "CLI arguments parsed"
    );

    let file_config = config::load_default_file_config()?;
    let resolved = config::resolve_config(&args, file_config.as_ref())?;
    info!(library = %resolved.sync.library_path.display(), trove = resolved.sync.trove, "hb-downloader starting");

    let credentials = load_credentials(&resolved.credentials)?;
    let client = HttpClient::new(Some(credentials), &resolved.http)
        .context("Failed to build HTTP client")?;

    let cancel = CancellationToken::new();
    spawn_interrupt_listener(cancel.clone());

    let mut coordinator = SyncCoordinator::new(resolved.sync, client);
    if let Some(base_url) = resolved.base_url {
        coordinator = coordinator.with_endpoints(Endpoints::new(base_url));
    }

    let report = coordinator.run(&cancel).await.context("Sync aborted")?;
    let exit = exit_handler::determine_exit_outcome(&report);
    if exit == ProcessExit::Interrupted {
        warn!(recorded = report.recorded, "Sync interrupted; completed downloads were recorded");
    }
    Ok(exit)
}

fn load_credentials(source: &CredentialSource) -> Result<SessionCredentials> {
    match source {
        CredentialSource::CookieFile(path) => SessionCredentials::from_cookie_file(path)
            .with_context(|| format!("Failed to load cookies from '{}'", path.display())),
        CredentialSource::SessionToken(token) => {
            SessionCredentials::from_session_token(token).context("Invalid session token")
        }
    }
}

fn spawn_interrupt_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after in-flight work is cleaned up");
            cancel.cancel();
        }
    });
}
