//! Error types for prov-rollback

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Result type for prov-rollback operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by forward actions and undo operations.
#[derive(Debug, thiserror::Error)]
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

    #[error("Invalid config key '{key}': {reason}")]
    InvalidConfigKey { key: String, reason: String },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    #[error("Command '{program}' failed: {message}")]
    CommandFailed { program: String, message: String },

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionState::Open => "open",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled back",
        })
    }
}

/// Misuse of the transaction protocol. These indicate a caller bug.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "error", rename_all = "kebab-case")]
pub enum TransactionError {
    #[error("a transaction is already open for '{component_id}'")]
    AlreadyOpen { component_id: String },

    #[error("the transaction for '{component_id}' is already {state}")]
    AlreadyClosed {
        component_id: String,
        state: TransactionState,
    },

    #[error("no transaction was started for '{component_id}'")]
    NotOpen { component_id: String },

    #[error("the transaction for '{component_id}' was not rolled back")]
    NotRolledBack { component_id: String },
}

/// A single undo step that failed during unwind. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
pub enum RollbackError {
    #[error("undo step {step} ({description}) for '{component_id}' failed: {message}")]
    UndoStepFailed {
        component_id: String,
        step: usize,
        description: String,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_closed_display() {
        let err = TransactionError::AlreadyClosed {
            component_id: "node".into(),
            state: TransactionState::Committed,
        };
        assert_eq!(err.to_string(), "the transaction for 'node' is already committed");
    }

    #[test]
    fn test_transaction_error_converts() {
        let err: Error = TransactionError::NotOpen {
            component_id: "jdk".into(),
        }
        .into();
        assert!(matches!(err, Error::Transaction(_)));
    }
}
