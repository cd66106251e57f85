use std::io::Write;

use muninn::{CacheConfig, DEFAULT_MAX_DYNAMIC_TENANTS, DEFAULT_TENANT_ID, MuninnError};

#[test]
fn cache_config_defaults() {
    let config = CacheConfig::default();
    assert_eq!(config.max_dynamic_tenants, DEFAULT_MAX_DYNAMIC_TENANTS);
    assert_eq!(config.max_dynamic_tenants, 1_000);
    assert_eq!(config.default_tenant_id, DEFAULT_TENANT_ID);
}

#[test]
fn cache_config_builder() {
    let config = CacheConfig::new()
        .max_dynamic_tenants(3)
        .default_tenant_id("primary");
    assert_eq!(config.max_dynamic_tenants, 3);
    assert_eq!(config.default_tenant_id, "primary");
}

#[test]
fn parse_partial_toml() {
    let config = CacheConfig::from_toml_str("max_dynamic_tenants = 42").unwrap();
    assert_eq!(config.max_dynamic_tenants, 42);
    assert_eq!(config.default_tenant_id, "Default");
}

#[test]
fn unknown_keys_are_rejected() {
    let err = CacheConfig::from_toml_str("max_tenants = 5").unwrap_err();
    assert!(matches!(err, MuninnError::Configuration(_)));
}

#[test]
fn wrong_type_is_rejected() {
    let err = CacheConfig::from_toml_str("max_dynamic_tenants = \"many\"").unwrap_err();
    assert!(matches!(err, MuninnError::Configuration(_)));
}

#[test]
fn load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "max_dynamic_tenants = 250").unwrap();
    writeln!(file, "default_tenant_id = \"main\"").unwrap();

    let config = CacheConfig::load(file.path()).unwrap();
    assert_eq!(config.max_dynamic_tenants, 250);
    assert_eq!(config.default_tenant_id, "main");
}

#[test]
fn missing_file_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = CacheConfig::load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, MuninnError::Configuration(_)));
}
