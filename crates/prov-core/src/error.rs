//! Error types for prov-core

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Result type for prov-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors outside a single component's install: configuration, logging
/// setup, and failures bubbled up from lower layers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config at {path}: {message}")]
    ConfigParse {
        path: PathBuf,
        format: String,
        message: String,
    },

    #[error("Unsupported config format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Logging setup failed: {message}")]
    Logging { message: String },

    #[error(transparent)]
    Catalog(#[from] prov_catalog::Error),

    #[error(transparent)]
    Rollback(#[from] prov_rollback::Error),

    #[error(transparent)]
    Graph(#[from] Box<prov_graph::GraphError>),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why one component's installation failed. Always caught at the component
/// boundary, where it triggers that component's rollback.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InstallError {
    #[error("install handler failed: {message}")]
    HandlerFailure { message: String },

    #[error("verification failed: {}", .issues.join("; "))]
    VerificationFailure { issues: Vec<String> },

    #[error("integrity check failed for {url}: expected {expected}, got {actual}")]
    IntegrityFailure {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("fetch failed for {url}: {message}")]
    NetworkFailure { url: String, message: String },

    #[error("no install handler registered for method '{tag}'")]
    NoHandler { tag: String },

    #[error("transaction error: {error}")]
    TransactionFailure { error: prov_rollback::TransactionError },
}

impl From<prov_rollback::TransactionError> for InstallError {
    fn from(error: prov_rollback::TransactionError) -> Self {
        InstallError::TransactionFailure { error }
    }
}

/// Failure reported by a [`Fetcher`](crate::fetch::Fetcher).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("digest mismatch for {url}: expected {expected}, got {actual}")]
    Integrity {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("failed to fetch {url}: {message}")]
    Network { url: String, message: String },
}

impl From<FetchError> for InstallError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Integrity { url, expected, actual } => InstallError::IntegrityFailure { url, expected, actual },
            FetchError::Network { url, message } => InstallError::NetworkFailure { url, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_maps_to_install_error() {
        let err: InstallError = FetchError::Integrity {
            url: "file:///tmp/go.tar.gz".into(),
            expected: "aa".into(),
            actual: "bb".into(),
        }
        .into();
        assert!(matches!(err, InstallError::IntegrityFailure { .. }));
    }

    #[test]
    fn test_transaction_failure_keeps_its_cause() {
        let err: InstallError = prov_rollback::TransactionError::NotOpen {
            component_id: "go".into(),
        }
        .into();
        assert_eq!(err.to_string(), "transaction error: no transaction was started for 'go'");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!({
                "kind": "transaction-failure",
                "error": {"error": "not-open", "component_id": "go"}
            })
        );
    }

    #[test]
    fn test_verification_failure_display() {
        let err = InstallError::VerificationFailure {
            issues: vec!["missing /opt/go/bin/go".into(), "exit 1".into()],
        };
        assert_eq!(
            err.to_string(),
            "verification failed: missing /opt/go/bin/go; exit 1"
        );
    }
}
