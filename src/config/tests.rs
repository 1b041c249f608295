//! Tests for config functionality.

use crate::config::types::{ENV_HEARTBEAT_INTERVAL_MS, ENV_LOCK_FILE_NAME, ENV_STALE_TIMEOUT_MS};
use crate::config::{CONFIG_FILE_NAME, LockConfig};
use crate::error::LockError;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;

fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_default_config() {
    let config = LockConfig::default();

    assert_eq!(config.lock_file_name, ".lock");
    assert_eq!(config.stale_timeout(), Duration::from_secs(30));
    assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
    assert_eq!(config.retry_backoff_min(), Duration::from_millis(250));
    assert_eq!(config.retry_backoff_max(), Duration::from_secs(2));
    assert_eq!(config.force_break_safety_factor, 3);
    assert_eq!(config.force_break_threshold(), Duration::from_secs(90));
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_minimal_yaml() {
    let config = LockConfig::from_yaml("").unwrap();
    assert_eq!(config, LockConfig::default());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
stale_timeout_ms: 60000
lock_file_name: employees.lock
"#;
    let config = LockConfig::from_yaml(yaml).unwrap();

    assert_eq!(config.stale_timeout_ms, 60_000);
    assert_eq!(config.lock_file_name, "employees.lock");

    // Unspecified values should use defaults
    assert_eq!(config.heartbeat_interval_ms, 5_000);
    assert_eq!(config.retry_backoff_max_ms, 2_000);
}

#[test]
fn test_unknown_fields_are_ignored() {
    let yaml = r#"
stale_timeout_ms: 30000
future_option: true
"#;
    assert!(LockConfig::from_yaml(yaml).is_ok());
}

#[test]
fn test_yaml_roundtrip() {
    let mut config = LockConfig::default();
    config.retry_backoff_min_ms = 100;
    let yaml = config.to_yaml().unwrap();
    assert_eq!(LockConfig::from_yaml(&yaml).unwrap(), config);
}

#[test]
fn test_heartbeat_must_fit_five_times_in_stale_timeout() {
    let yaml = r#"
stale_timeout_ms: 10000
heartbeat_interval_ms: 2001
"#;
    let err = LockConfig::from_yaml(yaml).unwrap_err();
    assert!(matches!(err, LockError::Config(_)));
    assert!(err.to_string().contains("heartbeat_interval_ms"));

    let yaml = r#"
stale_timeout_ms: 10000
heartbeat_interval_ms: 2000
"#;
    assert!(LockConfig::from_yaml(yaml).is_ok());
}

#[test]
fn test_huge_heartbeat_interval_is_rejected_not_overflowed() {
    let config = LockConfig {
        stale_timeout_ms: u64::MAX,
        heartbeat_interval_ms: u64::MAX / 2,
        ..LockConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("heartbeat_interval_ms"));

    let config = LockConfig {
        stale_timeout_ms: u64::MAX,
        heartbeat_interval_ms: u64::MAX / 5,
        ..LockConfig::default()
    };
    assert!(config.validate().is_ok());

    let mut config = LockConfig::default();
    config
        .apply_overrides_from(env_of(&[(
            ENV_HEARTBEAT_INTERVAL_MS,
            "9223372036854775807",
        )]))
        .unwrap();
    assert!(matches!(config.validate(), Err(LockError::Config(_))));
}

#[test]
fn test_lock_file_name_with_surrounding_whitespace_rejected() {
    for yaml in ["lock_file_name: ' .lock '", "lock_file_name: '.lock '", "lock_file_name: '   '"] {
        assert!(
            LockConfig::from_yaml(yaml).is_err(),
            "expected rejection for: {yaml}"
        );
    }
    assert!(LockConfig::from_yaml("lock_file_name: 'data store.lock'").is_ok());
}

#[test]
fn test_invalid_values_rejected() {
    for yaml in [
        "stale_timeout_ms: 0",
        "heartbeat_interval_ms: 0",
        "retry_backoff_min_ms: 0",
        "retry_backoff_min_ms: 3000\nretry_backoff_max_ms: 2000",
        "force_break_safety_factor: 0",
        "lock_file_name: ''",
        "lock_file_name: sub/dir.lock",
        "lock_file_name: '..'",
    ] {
        assert!(
            LockConfig::from_yaml(yaml).is_err(),
            "expected rejection for: {yaml}"
        );
    }
}

#[test]
fn test_env_overrides_apply() {
    let mut config = LockConfig::default();
    config
        .apply_overrides_from(env_of(&[
            (ENV_STALE_TIMEOUT_MS, "1000"),
            (ENV_HEARTBEAT_INTERVAL_MS, " 200 "),
            (ENV_LOCK_FILE_NAME, "db.lock"),
        ]))
        .unwrap();

    assert_eq!(config.stale_timeout_ms, 1000);
    assert_eq!(config.heartbeat_interval_ms, 200);
    assert_eq!(config.lock_file_name, "db.lock");
    assert!(config.validate().is_ok());
}

#[test]
fn test_env_override_rejects_garbage() {
    let mut config = LockConfig::default();
    let err = config
        .apply_overrides_from(env_of(&[(ENV_STALE_TIMEOUT_MS, "thirty seconds")]))
        .unwrap_err();
    assert!(err.to_string().contains(ENV_STALE_TIMEOUT_MS));
}

#[test]
fn test_resolve_reads_config_from_shared_folder() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join(CONFIG_FILE_NAME),
        "stale_timeout_ms: 45000\n",
    )
    .unwrap();

    let config = LockConfig::resolve(temp.path(), None).unwrap();
    assert_eq!(config.stale_timeout_ms, 45_000);
}

#[test]
fn test_resolve_prefers_explicit_path() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join(CONFIG_FILE_NAME),
        "stale_timeout_ms: 45000\n",
    )
    .unwrap();
    let explicit = temp.path().join("custom.yaml");
    std::fs::write(&explicit, "stale_timeout_ms: 50000\n").unwrap();

    let config = LockConfig::resolve(temp.path(), Some(&explicit)).unwrap();
    assert_eq!(config.stale_timeout_ms, 50_000);
}

#[test]
fn test_resolve_missing_explicit_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope.yaml");
    assert!(matches!(
        LockConfig::resolve(temp.path(), Some(&missing)),
        Err(LockError::Config(_))
    ));
}
