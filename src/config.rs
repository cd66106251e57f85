//! Cache configuration.
//!
//! Can be assembled in code with the builder methods or loaded from TOML:
//!
//! ```toml
//! max_dynamic_tenants = 500
//! default_tenant_id = "Default"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::Result;

/// Tenant id reserved for the default static tenant.
pub const DEFAULT_TENANT_ID: &str = "Default";

/// Default bound on the ready dynamic population.
pub const DEFAULT_MAX_DYNAMIC_TENANTS: usize = 1_000;

/// Configuration for a [`TenantResolver`](crate::TenantResolver).
///
/// ```rust
/// # use muninn::CacheConfig;
/// let config = CacheConfig::new()
///     .max_dynamic_tenants(250)
///     .default_tenant_id("primary");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Maximum ready dynamic tenants after an eviction pass. Default: 1,000.
    #[serde(default = "default_max_dynamic_tenants")]
    pub max_dynamic_tenants: usize,
    /// Id of the default static tenant. Dynamic tenants may not use it.
    #[serde(default = "default_tenant_id")]
    pub default_tenant_id: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_dynamic_tenants: default_max_dynamic_tenants(),
            default_tenant_id: default_tenant_id(),
        }
    }
}

fn default_max_dynamic_tenants() -> usize {
    DEFAULT_MAX_DYNAMIC_TENANTS
}

fn default_tenant_id() -> String {
    DEFAULT_TENANT_ID.to_string()
}

impl CacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the dynamic population limit.
    pub fn max_dynamic_tenants(mut self, n: usize) -> Self {
        self.max_dynamic_tenants = n;
        self
    }

    /// Set the reserved default tenant id.
    pub fn default_tenant_id(mut self, id: impl Into<String>) -> Self {
        self.default_tenant_id = id.into();
        self
    }

    /// Parse a config from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CacheConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.default_tenant_id.is_empty() {
            return Err(crate::MuninnError::Configuration(
                "default_tenant_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = CacheConfig::from_toml_str("").unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn rejects_empty_default_tenant() {
        let err = CacheConfig::from_toml_str("default_tenant_id = \"\"").unwrap_err();
        assert!(matches!(err, crate::MuninnError::Configuration(_)));
    }
}
