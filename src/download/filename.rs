//! Folder and file naming for the local library tree.
//!
//! Files land at `<library>/<bundle>/<product>/<remote filename>`. Folder
//! names are cleaned of characters that are awkward on common filesystems;
//! remote filenames are taken verbatim from the download URL.

use std::path::{Component, Path, PathBuf};

use super::DownloadError;

/// Cleans a display name for use as a folder name.
///
/// `+` becomes `_`, `:` becomes ` -`, and anything other than alphanumerics,
/// space, `_`, `.`, `-`, `[` or `]` is dropped. Surrounding whitespace and
/// trailing dots are trimmed.
#[must_use]
pub fn clean_name(dirty: &str) -> String {
    let cleaned: String = dirty
        .replace('+', "_")
        .replace(':', " -")
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '.' | '-' | '[' | ']'))
        .collect();
    cleaned.trim().trim_end_matches('.').to_string()
}

/// Returns the last path segment of a download URL, ignoring the query string.
///
/// Returns `None` when the segment is empty or would escape the product folder.
#[must_use]
pub fn filename_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();
    (!name.is_empty() && is_safe_file_name(name)).then(|| name.to_string())
}

/// Lowercased text after the last `.`, or the whole name when there is none.
#[must_use]
pub fn file_extension(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or(filename)
        .to_lowercase()
}

/// Path a superseded file is moved to: `<stem> [<date>].<ext>`.
///
/// The extension is everything after the last dot in the file name.
#[must_use]
pub fn dated_sibling_path(path: &Path, date: &str) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let renamed = match file_name.rfind('.') {
        Some(pos) if pos > 0 => format!("{} [{date}]{}", &file_name[..pos], &file_name[pos..]),
        _ => format!("{file_name} [{date}]"),
    };
    path.with_file_name(renamed)
}

/// Returns `path` if free, otherwise the first `<stem>_<n>.<ext>` that is.
pub(crate) fn resolve_unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = match file_name.rfind('.') {
        Some(pos) if pos > 0 => (&file_name[..pos], &file_name[pos..]),
        _ => (file_name.as_str(), ""),
    };

    for i in 2..1000 {
        let candidate = path.with_file_name(format!("{stem}_{i}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
    }

    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    path.with_file_name(format!("{stem}_{timestamp}{ext}"))
}

fn is_safe_file_name(name: &str) -> bool {
    !name.contains('\\')
        && Path::new(name)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

/// Root of the local library tree.
#[derive(Debug, Clone)]
pub struct LibraryLayout {
    root: PathBuf,
}

impl LibraryLayout {
    /// Creates a layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Library root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder for one product of one bundle, without touching the disk.
    #[must_use]
    pub fn product_folder(&self, container_name: &str, product_name: &str) -> PathBuf {
        self.root
            .join(clean_name(container_name))
            .join(clean_name(product_name))
    }

    /// Creates (if needed) and returns the product folder.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] when the directory can't be created.
    pub async fn create_product_folder(
        &self,
        container_name: &str,
        product_name: &str,
    ) -> Result<PathBuf, DownloadError> {
        let folder = self.product_folder(container_name, product_name);
        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(|e| DownloadError::io(folder.clone(), e))?;
        Ok(folder)
    }
}
