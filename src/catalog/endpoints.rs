/// Production storefront origin.
pub const DEFAULT_BASE_URL: &str = "https://www.humblebundle.com";

/// URL builder for the storefront API.
///
/// The base is configurable so tests can point a run at a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl Endpoints {
    /// Uses `base` (scheme and host, optional path prefix) for every call.
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { base }
    }

    /// Origin in use.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Library page listing the account's purchase keys.
    #[must_use]
    pub fn library(&self) -> String {
        format!("{}/home/library", self.base)
    }

    /// Order document for one purchase key.
    #[must_use]
    pub fn order(&self, key: &str) -> String {
        format!("{}/api/v1/order/{key}?all_tpkds=true", self.base)
    }

    /// One page of the trove catalog.
    #[must_use]
    pub fn trove_page(&self, index: usize) -> String {
        format!("{}/client/catalog?index={index}", self.base)
    }

    /// Trove download signing endpoint.
    #[must_use]
    pub fn sign(&self) -> String {
        format!("{}/api/v1/user/download/sign", self.base)
    }
}
