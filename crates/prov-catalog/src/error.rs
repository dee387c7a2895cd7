//! Error types for prov-catalog

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building or querying a component catalog.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A version string could not be parsed.
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// A version constraint string could not be parsed.
    #[error("invalid version constraint '{constraint}': {reason}")]
    VersionConstraintParse { constraint: String, reason: String },

    /// Two catalog records share the same component id.
    #[error("duplicate component id in catalog: {0}")]
    DuplicateComponent(String),

    /// A component record is structurally invalid.
    #[error("invalid component '{id}': {reason}")]
    InvalidComponent { id: String, reason: String },

    /// The catalog document is not valid TOML for the component schema.
    #[error("failed to parse catalog: {0}")]
    CatalogParse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_error_display() {
        let err = Error::VersionConstraintParse {
            constraint: ">=abc".to_string(),
            reason: "invalid version: abc".to_string(),
        };
        assert!(err.to_string().contains(">=abc"));
        assert!(err.to_string().contains("invalid version"));
    }
}
