//! Platform and file-extension filters.

/// Which file extensions to fetch. Matching is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExtensionFilter {
    /// Fetch every extension.
    #[default]
    All,
    /// Fetch only these extensions.
    Include(Vec<String>),
    /// Fetch everything except these extensions.
    Exclude(Vec<String>),
}

impl ExtensionFilter {
    /// Builds an include filter; an empty list means no filtering.
    pub fn include<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = normalize_extensions(extensions);
        if list.is_empty() { Self::All } else { Self::Include(list) }
    }

    /// Builds an exclude filter; an empty list means no filtering.
    pub fn exclude<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = normalize_extensions(extensions);
        if list.is_empty() { Self::All } else { Self::Exclude(list) }
    }

    /// Whether a file with this extension should be fetched.
    #[must_use]
    pub fn allows(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.').to_lowercase();
        match self {
            Self::All => true,
            Self::Include(list) => list.contains(&extension),
            Self::Exclude(list) => !list.contains(&extension),
        }
    }
}

fn normalize_extensions<I, S>(extensions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|e| e.as_ref().trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Combined platform and extension filter for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilter {
    extensions: ExtensionFilter,
    platforms: Vec<String>,
}

impl FileFilter {
    /// Creates a filter. An empty platform list, or one containing `all`,
    /// accepts every platform.
    #[must_use]
    pub fn new(extensions: ExtensionFilter, platforms: &[String]) -> Self {
        let platforms: Vec<String> = platforms
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        let platforms = if platforms.iter().any(|p| p == "all") {
            Vec::new()
        } else {
            platforms
        };
        Self {
            extensions,
            platforms,
        }
    }

    /// Whether files for `platform` should be considered.
    #[must_use]
    pub fn allows_platform(&self, platform: &str) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&platform.to_lowercase())
    }

    /// Whether a file with `extension` should be fetched.
    #[must_use]
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.extensions.allows(extension)
    }

    /// The extension part of the filter.
    #[must_use]
    pub fn extensions(&self) -> &ExtensionFilter {
        &self.extensions
    }
}
