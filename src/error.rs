use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Diagnostic payload the catalog service attaches to a rejected call
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub details: Vec<serde_json::Value>,
}

impl ServiceErrorDetail {
    /// Detail for a body that could not be parsed as a service error
    pub fn raw(body: impl Into<String>) -> Self {
        Self {
            message: Some(body.into()),
            ..Self::default()
        }
    }
}

impl fmt::Display for ServiceErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{}: {}", code, message),
            (Some(code), None) => write!(f, "{}", code),
            (None, Some(message)) => write!(f, "{}", message),
            (None, None) => write!(f, "no detail"),
        }
    }
}

/// Envelope the service wraps errors in
#[derive(Debug, Deserialize)]
pub struct ServiceErrorEnvelope {
    pub error: ServiceErrorDetail,
}

/// Outcome of a single remote catalog call
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The service rejected this specific call (validation, duplicate, permission)
    #[error("Service rejected request ({status}): {detail}")]
    Service {
        status: u16,
        detail: ServiceErrorDetail,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl CatalogError {
    /// Domain errors are rejections of one call; everything else is unclassified
    pub fn is_domain(&self) -> bool {
        matches!(self, CatalogError::Service { .. })
    }

    /// Service diagnostic detail, if the error carries one
    pub fn detail(&self) -> Option<&ServiceErrorDetail> {
        match self {
            CatalogError::Service { detail, .. } => Some(detail),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            CatalogError::Decode(format!("HTTP response decode error: {:?}", error))
        } else {
            CatalogError::Transport(format!("HTTP request error: {:?}", error))
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(error: serde_json::Error) -> Self {
        CatalogError::Decode(format!("JSON error: {}", error))
    }
}

/// Top-level error type for a sync run
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Paging the source failed; the partial record set is discarded
    #[error("Extraction of {collection} aborted: {source}")]
    Extraction {
        collection: &'static str,
        #[source]
        source: CatalogError,
    },

    #[error("Record has no identifier: {0}")]
    MissingIdentifier(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl SyncError {
    pub fn is_domain(&self) -> bool {
        matches!(self, SyncError::Catalog(e) if e.is_domain())
    }

    pub fn detail(&self) -> Option<&ServiceErrorDetail> {
        match self {
            SyncError::Catalog(e) => e.detail(),
            _ => None,
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result type alias for the sync engine
pub type SyncResult<T> = Result<T, SyncError>;
