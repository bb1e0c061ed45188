//! Error types for the end-to-end harness.

use std::time::Duration;
use thiserror::Error;

/// Harness errors.
///
/// Non-2xx answers from TrustyAI or the inference endpoint are not errors:
/// they come back as [`crate::http::ServiceResponse`] and the caller decides.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A resource the caller depends on does not exist.
    #[error("{kind} '{name}' not found in namespace '{namespace}'")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    /// A bounded wait ran out of budget without converging.
    #[error("Timed out after {waited:?} waiting for {what}: {detail}")]
    Timeout {
        what: String,
        waited: Duration,
        detail: String,
    },

    #[error("Cluster connection failed: {0}")]
    Connection(String),

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The metrics service answered, but not with model metadata.
    #[error("Model metadata unavailable (status {status}): {body}")]
    MetadataUnavailable { status: u16, body: String },

    #[error("Token acquisition failed: {0}")]
    Token(String),

    #[error("Pod exec failed: {0}")]
    Exec(String),

    #[error("Unexpected resource shape: {0}")]
    InvalidResource(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl HarnessError {
    pub fn not_found(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        HarnessError::NotFound {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// True for lookups that missed, whether raised by the harness or by the API server.
    pub fn is_not_found(&self) -> bool {
        match self {
            HarnessError::NotFound { .. } => true,
            HarnessError::Kube(kube::Error::Api(response)) => response.code == 404,
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, HarnessError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, HarnessError>;
