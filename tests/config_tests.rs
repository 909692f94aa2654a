//! Configuration loading and validation.

use std::io::Write;

use agentweave::config::WeaveConfig;
use agentweave::error::FailureKind;
use agentweave::session::CompactionConfig;
use tempfile::NamedTempFile;

const SAMPLE: &str = r#"
app_name = "banking"
model = "gemini-2.5-pro"
request_timeout_secs = 30

[retry]
max_attempts = 2
initial_backoff_ms = 250

[compaction]
max_turns = 40
retain_recent = 6
"#;

#[test]
fn toml_overrides_defaults_and_keeps_the_rest() {
    let config = WeaveConfig::from_toml_str(SAMPLE).unwrap();

    assert_eq!(config.app_name, "banking");
    assert_eq!(config.model, "gemini-2.5-pro");
    assert_eq!(config.request_timeout_secs, 30);
    assert_eq!(config.retry.max_attempts, 2);
    assert_eq!(config.retry.max_backoff_ms, 60_000);
    assert_eq!(config.retry.retry_statuses, vec![429, 500, 503, 504]);
    assert_eq!(
        config.compaction,
        Some(CompactionConfig::builder().max_turns(40).retain_recent(6).build())
    );
    assert!(config.validate().is_ok());
}

#[test]
fn defaults_are_ephemeral_and_valid() {
    let config = WeaveConfig::default();

    assert!(config.database_path.is_none());
    assert!(config.api_key().is_none());
    assert!(config.validate().is_ok());
    assert!(!config.session_service().unwrap().is_durable());
}

#[test]
fn load_reads_a_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"model = \"from-file\"\n").unwrap();

    let config = WeaveConfig::load(file.path()).unwrap();

    assert!(!config.model.is_empty());
}

#[test]
fn missing_file_is_a_configuration_error() {
    let err = WeaveConfig::load("/definitely/not/here.toml").unwrap_err();
    assert_eq!(err.kind(), FailureKind::Configuration);
}

#[test]
fn malformed_toml_is_a_configuration_error() {
    let err = WeaveConfig::from_toml_str("model = [").unwrap_err();
    assert_eq!(err.kind(), FailureKind::Configuration);
}

#[test]
fn invalid_combinations_are_rejected() {
    let mut zero_attempts = WeaveConfig::default();
    zero_attempts.retry.max_attempts = 0;
    assert!(zero_attempts.validate().is_err());

    let bad_compaction = WeaveConfig::default()
        .with_compaction(CompactionConfig::builder().max_turns(4).retain_recent(4).build());
    assert!(bad_compaction.validate().is_err());

    let mut bad_url = WeaveConfig::default();
    bad_url.base_url = "generativelanguage.googleapis.com".into();
    assert!(bad_url.validate().is_err());
}

#[cfg(feature = "sqlite")]
#[test]
fn database_path_selects_the_durable_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = WeaveConfig::default()
        .with_app_name("bank")
        .with_database_path(dir.path().join("s.db"));

    let service = config.session_service().unwrap();

    assert!(service.is_durable());
    assert_eq!(service.app_name(), "bank");
}
