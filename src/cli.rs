//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Keep a local folder in sync with your purchased library.
///
/// Only new or updated files are downloaded. Updated files keep their
/// previous version next to them under a dated name.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "hb-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// Folder the library is written to
    #[arg(short = 'l', long)]
    pub library_path: Option<PathBuf>,

    /// Browser cookie export (Netscape format, or a raw Cookie header)
    #[arg(short = 'c', long, conflicts_with = "session_auth")]
    pub cookie_file: Option<PathBuf>,

    /// Value of the `_simpleauth_sess` session cookie
    #[arg(short = 's', long)]
    pub session_auth: Option<String>,

    /// Show per-file progress bars
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// Only download these file extensions (comma separated)
    #[arg(short = 'i', long, num_args = 1.., value_delimiter = ',', conflicts_with = "exclude")]
    pub include: Vec<String>,

    /// Never download these file extensions (comma separated)
    #[arg(short = 'e', long, num_args = 1.., value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Only download these platforms, e.g. windows,ebook (`all` for every platform)
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub platform: Vec<String>,

    /// URL categories to fetch, in order (default: web)
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub content_types: Vec<String>,

    /// Re-check files that were already downloaded
    #[arg(short = 'u', long)]
    pub update: bool,

    /// Sync the Humble Trove catalog instead of purchases
    #[arg(short = 't', long)]
    pub trove: bool,

    /// Only sync these purchase keys (comma separated)
    #[arg(short = 'k', long = "keys", num_args = 1.., value_delimiter = ',', conflicts_with = "trove")]
    pub keys: Vec<String>,

    /// Orders processed in parallel (1-256, default: number of CPUs)
    #[arg(short = 'w', long, value_parser = clap::value_parser!(u16).range(1..=256))]
    pub workers: Option<u16>,

    /// Maximum retry attempts for transient failures (0-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: Option<u8>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored log output
    #[arg(long)]
    pub no_color: bool,

    /// Storefront origin override
    #[arg(long, hide = true)]
    pub base_url: Option<String>,
}
