//! Per-file progress bars shared by all workers.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{msg:40!} [{bar:30}] {bytes:>10}/{total_bytes:<10} {bytes_per_sec:>12} {eta:>4}";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:40!} {bytes:>10} {bytes_per_sec:>12}";

/// Progress reporting for a whole run.
///
/// Cloning is cheap; every clone draws into the same terminal area.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    multi: Option<MultiProgress>,
}

impl Progress {
    /// Creates a reporter that draws bars when `enabled` is true.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            multi: enabled.then(MultiProgress::new),
        }
    }

    /// A reporter that never draws.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Whether bars are drawn.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.multi.is_some()
    }

    /// Starts a bar for one file. `total` comes from `Content-Length` when known.
    #[must_use]
    pub fn file(&self, name: &str, total: Option<u64>) -> FileProgress {
        let Some(multi) = &self.multi else {
            return FileProgress { bar: None };
        };

        let bar = match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                bar.set_style(
                    ProgressStyle::with_template(BAR_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("=> "),
                );
                bar
            }
            None => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(
                    ProgressStyle::with_template(SPINNER_TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar
            }
        };
        bar.set_message(name.to_string());
        FileProgress {
            bar: Some(multi.add(bar)),
        }
    }
}

/// Byte counter for one in-flight file.
#[derive(Debug)]
pub struct FileProgress {
    bar: Option<ProgressBar>,
}

impl FileProgress {
    /// Records `bytes` more bytes written.
    pub fn advance(&self, bytes: u64) {
        if let Some(bar) = &self.bar {
            bar.inc(bytes);
        }
    }

    /// Bytes recorded so far (0 when not drawing).
    #[must_use]
    pub fn position(&self) -> u64 {
        self.bar.as_ref().map_or(0, ProgressBar::position)
    }

    /// Removes the bar after a successful write.
    pub fn finish(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }

    /// Leaves the bar in place, marked as failed.
    pub fn fail(self) {
        if let Some(bar) = self.bar {
            bar.abandon_with_message(format!("{} (failed)", bar.message()));
        }
    }
}
