use thiserror::Error;

use crate::download::DownloadError;

/// Failures while enumerating the remote catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The library page did not carry account data; the session is not valid.
    #[error("session is not valid: {reason}")]
    InvalidSession {
        /// What was missing.
        reason: String,
    },

    /// The account may not sign trove downloads.
    #[error("trove download signing refused for {machine_name}")]
    Unauthorized {
        /// File the signature was requested for.
        machine_name: String,
    },

    /// The signing reply carried neither a URL nor an error marker.
    #[error("signing reply for {machine_name} has no URL")]
    MissingSignedUrl {
        /// File the signature was requested for.
        machine_name: String,
    },

    /// Embedded account JSON could not be parsed.
    #[error("account data is malformed: {reason}")]
    Malformed {
        /// Parser message.
        reason: String,
    },

    /// Transport failure talking to the storefront.
    #[error(transparent)]
    Fetch(#[from] DownloadError),
}

impl CatalogError {
    /// True when the failure means the credentials can't be used for this run.
    #[must_use]
    pub fn is_authorization(&self) -> bool {
        match self {
            Self::InvalidSession { .. } | Self::Unauthorized { .. } => true,
            Self::Fetch(DownloadError::AuthRequired { .. }) => true,
            _ => false,
        }
    }

    /// True when the run was cancelled mid-request.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Fetch(e) if e.is_cancelled())
    }
}
