//! Muninn error types

/// Muninn error types
///
/// `Clone` because a single failed build is delivered to every caller that
/// coalesced onto it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MuninnError {
    // Construction errors
    #[error("tenant '{tenant_id}' context construction failed: {message}")]
    ConstructionFailed { tenant_id: String, message: String },

    /// The spawned build task panicked or the runtime dropped it.
    #[error("tenant '{tenant_id}' context construction aborted")]
    BuildAborted { tenant_id: String },

    // Lookup errors
    #[error("invalid tenant id: {0}")]
    InvalidTenantId(String),

    #[error("unknown static tenant: {0}")]
    UnknownStaticTenant(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MuninnError {
    /// Shorthand for builders reporting a failure for `tenant_id`.
    pub fn construction(tenant_id: impl Into<String>, message: impl Into<String>) -> Self {
        MuninnError::ConstructionFailed {
            tenant_id: tenant_id.into(),
            message: message.into(),
        }
    }

    /// Whether this error came out of a build the cache has already dropped,
    /// so the next call for the same tenant starts a fresh attempt.
    pub fn is_construction_failure(&self) -> bool {
        matches!(
            self,
            MuninnError::ConstructionFailed { .. } | MuninnError::BuildAborted { .. }
        )
    }
}

impl From<toml::de::Error> for MuninnError {
    fn from(err: toml::de::Error) -> Self {
        MuninnError::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for MuninnError {
    fn from(err: std::io::Error) -> Self {
        MuninnError::Configuration(err.to_string())
    }
}

/// Result type alias for Muninn operations
pub type Result<T> = std::result::Result<T, MuninnError>;
