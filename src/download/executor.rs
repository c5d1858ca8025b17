//! Atomic file writes for downloaded content.
//!
//! Bytes are streamed into a hidden temp file beside the destination, flushed
//! and synced, and only then promoted to the canonical path with a rename.
//! A superseded file is moved aside to a dated name right before promotion,
//! so a failed download leaves the previous file untouched.

use std::path::{Path, PathBuf};

use futures_util::{Stream, StreamExt};
use rand::Rng;
use reqwest::Response;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::constants::PARTIAL_SUFFIX;
use super::error::DownloadError;
use super::filename::{dated_sibling_path, resolve_unique_path};
use super::progress::{FileProgress, Progress};

/// Result of a successful download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Canonical path now holding the new content.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
    /// Where the previous file was moved, if one was superseded.
    pub superseded: Option<PathBuf>,
}

/// Writes response bodies to the library.
#[derive(Debug, Clone, Default)]
pub struct DownloadExecutor {
    progress: Progress,
}

impl DownloadExecutor {
    /// Creates an executor reporting through `progress`.
    #[must_use]
    pub fn new(progress: Progress) -> Self {
        Self { progress }
    }

    /// Streams `response` to `destination`.
    ///
    /// When `rename_date` is set and a file already exists at `destination`,
    /// that file is renamed to `<stem> [<date>].<ext>` before the new one lands.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Network`] or [`DownloadError::Io`] when the
    /// transfer fails, and [`DownloadError::Cancelled`] on cancellation. No
    /// partial file is left behind in any of these cases.
    #[instrument(skip(self, response, cancel), fields(path = %destination.display()))]
    pub async fn download(
        &self,
        response: Response,
        destination: &Path,
        rename_date: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<DownloadedFile, DownloadError> {
        let url = response.url().to_string();
        let total = response.content_length();
        let stream = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| DownloadError::network(url.clone(), e)));
        self.write_stream(stream, total, destination, rename_date, cancel)
            .await
    }

    /// Writes any byte stream to `destination` with the same guarantees as
    /// [`download`](Self::download).
    ///
    /// # Errors
    ///
    /// Propagates the first stream error, any I/O failure, or cancellation.
    pub async fn write_stream<S, B>(
        &self,
        stream: S,
        total: Option<u64>,
        destination: &Path,
        rename_date: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<DownloadedFile, DownloadError>
    where
        S: Stream<Item = Result<B, DownloadError>>,
        B: AsRef<[u8]>,
    {
        let label = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = temp_path_for(destination);
        let bar = self.progress.file(&label, total);

        let written = match write_temp(stream, &temp_path, &bar, cancel).await {
            Ok(bytes) => bytes,
            Err(error) => {
                bar.fail();
                discard(&temp_path).await;
                return Err(error);
            }
        };

        let superseded = match rename_date {
            Some(date) => move_aside(destination, date).await,
            None => None,
        };

        if let Err(source) = tokio::fs::rename(&temp_path, destination).await {
            bar.fail();
            discard(&temp_path).await;
            if let Some(old) = &superseded {
                if let Err(e) = tokio::fs::rename(old, destination).await {
                    warn!(path = %old.display(), error = %e, "could not restore superseded file");
                }
            }
            return Err(DownloadError::io(destination, source));
        }

        bar.finish();
        info!(path = %destination.display(), bytes = written, "download complete");
        Ok(DownloadedFile {
            path: destination.to_path_buf(),
            bytes: written,
            superseded,
        })
    }
}

async fn write_temp<S, B>(
    stream: S,
    temp_path: &Path,
    bar: &FileProgress,
    cancel: &CancellationToken,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<B, DownloadError>>,
    B: AsRef<[u8]>,
{
    let file = File::create(temp_path)
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = std::pin::pin!(stream);
    let mut bytes_written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(DownloadError::cancelled(temp_path.display().to_string()));
            }
            next = stream.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk?;
        let chunk = chunk.as_ref();

        writer
            .write_all(chunk)
            .await
            .map_err(|e| DownloadError::io(temp_path, e))?;
        bytes_written += chunk.len() as u64;
        bar.advance(chunk.len() as u64);
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(|e| DownloadError::io(temp_path, e))?;

    Ok(bytes_written)
}

/// Best-effort rename of the current file to its dated name.
async fn move_aside(destination: &Path, date: &str) -> Option<PathBuf> {
    if !tokio::fs::try_exists(destination).await.unwrap_or(false) {
        return None;
    }
    let target = resolve_unique_path(&dated_sibling_path(destination, date));
    match tokio::fs::rename(destination, &target).await {
        Ok(()) => {
            info!(from = %destination.display(), to = %target.display(), "kept previous version");
            Some(target)
        }
        Err(e) => {
            warn!(path = %destination.display(), error = %e, "could not rename previous version, overwriting");
            None
        }
    }
}

async fn discard(temp_path: &Path) {
    match tokio::fs::remove_file(temp_path).await {
        Ok(()) => debug!(path = %temp_path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %temp_path.display(), error = %e, "could not remove partial file"),
    }
}

fn temp_path_for(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let nonce: u32 = rand::thread_rng().r#gen();
    destination.with_file_name(format!(".{name}.{nonce:08x}{PARTIAL_SUFFIX}"))
}
