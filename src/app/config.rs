//! File configuration and its merge with CLI arguments.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use hb_downloader_core::download::{CONNECT_TIMEOUT_SECS, DEFAULT_MAX_RETRIES, READ_TIMEOUT_SECS};
use hb_downloader_core::{ExtensionFilter, FileFilter, HttpSettings, RetryPolicy, SyncConfig};
use serde::Deserialize;
use url::Url;

use crate::cli::Args;

/// TOML-backed defaults. Every key is optional; CLI flags win.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) library_path: Option<PathBuf>,
    pub(crate) cookie_file: Option<PathBuf>,
    pub(crate) include: Option<Vec<String>>,
    pub(crate) exclude: Option<Vec<String>>,
    pub(crate) platform: Option<Vec<String>>,
    pub(crate) content_types: Option<Vec<String>>,
    pub(crate) update: Option<bool>,
    pub(crate) progress: Option<bool>,
    pub(crate) workers: Option<u16>,
    pub(crate) max_retries: Option<u8>,
    pub(crate) connect_timeout_secs: Option<u64>,
    pub(crate) read_timeout_secs: Option<u64>,
    pub(crate) base_url: Option<String>,
}

impl FileConfig {
    /// Validates config values against the same constraints as the CLI.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.include.as_ref().is_some_and(|v| !v.is_empty())
            && self.exclude.as_ref().is_some_and(|v| !v.is_empty())
        {
            bail!("Invalid config: `include` and `exclude` are mutually exclusive");
        }
        if let Some(workers) = self.workers
            && !(1..=256).contains(&workers)
        {
            bail!("Invalid config value for `workers`: {workers}. Expected range: 1..=256");
        }
        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 0..=10");
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/hb-downloader/config.toml`
/// 2. `$HOME/.config/hb-downloader/config.toml`
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("hb-downloader")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("hb-downloader")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file from the default path if one exists.
pub(crate) fn load_default_file_config() -> Result<Option<FileConfig>> {
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

pub(crate) fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Where the session comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CredentialSource {
    CookieFile(PathBuf),
    SessionToken(String),
}

/// Everything the runtime needs, after merging file and CLI values.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub(crate) sync: SyncConfig,
    pub(crate) http: HttpSettings,
    pub(crate) credentials: CredentialSource,
    pub(crate) base_url: Option<String>,
}

/// Merges CLI arguments over file values and validates the result.
pub(crate) fn resolve_config(args: &Args, file: Option<&FileConfig>) -> Result<ResolvedConfig> {
    let default_file = FileConfig::default();
    let file = file.unwrap_or(&default_file);

    let Some(library_path) = args
        .library_path
        .clone()
        .or_else(|| file.library_path.clone())
    else {
        bail!("No library path given. Pass --library-path or set `library_path` in the config file");
    };

    let credentials = if let Some(token) = &args.session_auth {
        CredentialSource::SessionToken(token.clone())
    } else if let Some(path) = args.cookie_file.clone().or_else(|| file.cookie_file.clone()) {
        CredentialSource::CookieFile(path)
    } else {
        bail!("No credentials given. Pass --cookie-file or --session-auth");
    };

    let include = cli_or_file(&args.include, file.include.as_ref());
    let exclude = cli_or_file(&args.exclude, file.exclude.as_ref());
    // A CLI list replaces the opposite list from the file.
    let (include, exclude) = if !args.include.is_empty() {
        (include, Vec::new())
    } else if !args.exclude.is_empty() {
        (Vec::new(), exclude)
    } else {
        (include, exclude)
    };
    let extensions = if include.is_empty() {
        ExtensionFilter::exclude(&exclude)
    } else {
        ExtensionFilter::include(&include)
    };
    let platforms = cli_or_file(&args.platform, file.platform.as_ref());

    let mut sync = SyncConfig::new(library_path);
    sync.filter = FileFilter::new(extensions, &platforms);
    let content_types = cli_or_file(&args.content_types, file.content_types.as_ref());
    if !content_types.is_empty() {
        sync.content_types = content_types;
    }
    sync.update = args.update || file.update.unwrap_or(false);
    sync.progress = args.progress || file.progress.unwrap_or(false);
    sync.trove = args.trove;
    sync.purchase_keys.clone_from(&args.keys);
    if let Some(workers) = args.workers.or(file.workers) {
        sync.workers = usize::from(workers);
    }

    let max_retries = args
        .max_retries
        .or(file.max_retries)
        .map_or(DEFAULT_MAX_RETRIES, u32::from);
    let http = HttpSettings {
        connect_timeout: Duration::from_secs(file.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS)),
        read_timeout: Duration::from_secs(file.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS)),
        retry: RetryPolicy::with_max_retries(max_retries),
    };

    let base_url = args.base_url.clone().or_else(|| file.base_url.clone());
    if let Some(base_url) = &base_url {
        let parsed = Url::parse(base_url)
            .with_context(|| format!("Invalid base URL '{base_url}'"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("Invalid base URL '{base_url}': expected http or https");
        }
    }

    Ok(ResolvedConfig {
        sync,
        http,
        credentials,
        base_url,
    })
}

fn cli_or_file(cli: &[String], file: Option<&Vec<String>>) -> Vec<String> {
    if cli.is_empty() {
        file.cloned().unwrap_or_default()
    } else {
        cli.to_vec()
    }
}
