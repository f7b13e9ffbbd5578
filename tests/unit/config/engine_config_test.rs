//! Engine configuration loading and configured statements

use serial_test::serial;
use std::collections::HashMap;
use std::io::Write;
use velostream::velostream::config::{
    ConfigError, ConfiguredStatement, EngineConfig, ProcessingErrorPolicy, JOIN_GRACE_PROPERTY,
    WORKERS_PROPERTY,
};

#[test]
fn test_load_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
workers: 4
channel_capacity: 64
processing_error_policy: fail
join:
  grace_ms: 2000
  max_lateness_ms: 1000
  max_records_per_store: 50000
"#
    )
    .unwrap();

    let config = EngineConfig::from_file(file.path()).unwrap();
    assert_eq!(config.workers, 4);
    assert_eq!(config.channel_capacity, 64);
    assert_eq!(config.processing_error_policy, ProcessingErrorPolicy::Fail);
    assert_eq!(config.join.grace_ms, 2000);
    assert_eq!(config.join.max_lateness_ms, 1000);
    assert_eq!(config.join.max_records_per_store, Some(50_000));
    assert_eq!(config.join.warning_threshold_pct, 0.8);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = EngineConfig::from_file(dir.path().join("missing.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
#[serial]
fn test_from_env() {
    unsafe {
        std::env::set_var("VELOSTREAM_WORKERS", "8");
        std::env::set_var("VELOSTREAM_ERROR_POLICY", "fail");
        std::env::remove_var("VELOSTREAM_CHANNEL_CAPACITY");
    }

    let config = EngineConfig::from_env();
    assert_eq!(config.workers, 8);
    assert_eq!(config.processing_error_policy, ProcessingErrorPolicy::Fail);
    assert_eq!(config.channel_capacity, EngineConfig::default().channel_capacity);

    unsafe {
        std::env::remove_var("VELOSTREAM_WORKERS");
        std::env::remove_var("VELOSTREAM_ERROR_POLICY");
    }
}

#[test]
#[serial]
fn test_from_env_ignores_invalid_values() {
    unsafe {
        std::env::set_var("VELOSTREAM_WORKERS", "0");
    }
    assert_eq!(EngineConfig::from_env().workers, 1);
    unsafe {
        std::env::remove_var("VELOSTREAM_WORKERS");
    }
}

#[test]
fn test_configured_statement_overrides_are_all_or_nothing() {
    let statement = ConfiguredStatement::new(
        "plan",
        "SELECT * FROM orders EMIT CHANGES;",
        EngineConfig::default(),
    );

    let mut overrides = HashMap::new();
    overrides.insert(WORKERS_PROPERTY.to_string(), "3".to_string());
    overrides.insert(JOIN_GRACE_PROPERTY.to_string(), "not-a-number".to_string());

    assert!(statement.clone().with_overrides(overrides).is_err());

    let mut overrides = HashMap::new();
    overrides.insert(WORKERS_PROPERTY.to_string(), "3".to_string());
    let configured = statement.with_overrides(overrides).unwrap();
    assert_eq!(configured.config().workers, 3);
    assert_eq!(configured.statement_text(), "SELECT * FROM orders EMIT CHANGES;");
    assert_eq!(*configured.statement(), "plan");
}
