use muninn::{MuninnError, Result};

#[test]
fn test_error_display() {
    let err = MuninnError::construction("acme", "jwks fetch timed out");
    let msg = err.to_string();
    assert!(msg.contains("acme"));
    assert!(msg.contains("jwks fetch timed out"));
}

#[test]
fn test_result_alias() {
    fn returns_error() -> Result<()> {
        Err(MuninnError::UnknownStaticTenant("hr".to_string()))
    }
    assert!(returns_error().is_err());
}

#[test]
fn construction_failures_are_retryable() {
    assert!(MuninnError::construction("a", "boom").is_construction_failure());
    assert!(
        MuninnError::BuildAborted {
            tenant_id: "a".into()
        }
        .is_construction_failure()
    );
}

#[test]
fn lookup_and_config_errors_are_not_construction_failures() {
    assert!(!MuninnError::InvalidTenantId("".into()).is_construction_failure());
    assert!(!MuninnError::UnknownStaticTenant("hr".into()).is_construction_failure());
    assert!(!MuninnError::Configuration("bad".into()).is_construction_failure());
}

#[test]
fn errors_clone_equal() {
    let err = MuninnError::construction("a", "boom");
    assert_eq!(err.clone(), err);
}

#[test]
fn io_errors_become_configuration_errors() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let err: MuninnError = io.into();
    assert!(matches!(err, MuninnError::Configuration(ref m) if m.contains("missing")));
}
