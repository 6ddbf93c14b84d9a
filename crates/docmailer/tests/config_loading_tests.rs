//! Table-driven tests for loading a config file and resolving it into the
//! settings a run uses.

mod common;

use std::time::Duration;

use secrecy::ExposeSecret;
use serial_test::serial;

use docmailer::config::{load_config, load_config_from_str, resolve_config_path, CONFIG_ENV_VAR};
use docmailer::{ConfigError, OutputFormat, PipelineConfig};

use common::TestHarness;

struct ConfigTestCase {
    name: &'static str,
    config_json: &'static str,
    should_succeed: bool,
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        config_json: r#"{
            "version": "1.0",
            "watch": { "directory": "/srv/drop" },
            "log_directory": "/var/log/docmailer",
            "smtp": { "host": "smtp.example.com", "username": "u", "password": "p" },
            "sender": "mailer@example.com",
            "recipient": "accounts@example.com"
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_json: r#"{
            "version": "1.0",
            "format": "letter",
            "watch": {
                "directory": "/srv/drop",
                "filter": "*.dat",
                "poll_interval_ms": 200,
                "debounce_ms": 300,
                "stability_interval_ms": 100,
                "stability_checks": 5,
                "process_existing": true
            },
            "log_directory": "/var/log/docmailer",
            "log_file_name": "audit.txt",
            "log_format": "json",
            "worker_count": 3,
            "smtp": {
                "host": "smtp.example.com",
                "port": 465,
                "tls": "wrapper",
                "username": "u",
                "password_env_var": "SMTP_PASSWORD",
                "timeout_secs": 10
            },
            "sender": "Mailer <mailer@example.com>",
            "recipient": "accounts@example.com",
            "assets": { "left_logo": "/assets/ImLeft.png", "right_logo": "/assets/ImRight.png" },
            "letter": { "locality": "Colón" }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "not_json",
        config_json: "version = 1.0",
        should_succeed: false,
        expected_error: Some("JSON"),
    },
    ConfigTestCase {
        name: "unknown_format",
        config_json: r#"{
            "version": "1.0",
            "format": "csv",
            "watch": { "directory": "/srv/drop" },
            "log_directory": "/var/log/docmailer",
            "smtp": { "host": "smtp.example.com", "username": "u", "password": "p" },
            "sender": "mailer@example.com",
            "recipient": "accounts@example.com"
        }"#,
        should_succeed: false,
        expected_error: None,
    },
    ConfigTestCase {
        name: "zero_workers",
        config_json: r#"{
            "version": "1.0",
            "watch": { "directory": "/srv/drop" },
            "log_directory": "/var/log/docmailer",
            "worker_count": 0,
            "smtp": { "host": "smtp.example.com", "username": "u", "password": "p" },
            "sender": "mailer@example.com",
            "recipient": "accounts@example.com"
        }"#,
        should_succeed: false,
        expected_error: None,
    },
    ConfigTestCase {
        name: "log_file_name_with_directory",
        config_json: r#"{
            "version": "1.0",
            "watch": { "directory": "/srv/drop" },
            "log_directory": "/var/log/docmailer",
            "log_file_name": "sub/log.txt",
            "smtp": { "host": "smtp.example.com", "username": "u", "password": "p" },
            "sender": "mailer@example.com",
            "recipient": "accounts@example.com"
        }"#,
        should_succeed: false,
        expected_error: Some("log_file_name"),
    },
];

#[test]
fn test_config_cases() {
    for case in CONFIG_TESTS {
        let result = load_config_from_str(case.config_json);
        match (case.should_succeed, result) {
            (true, Ok(_)) => {}
            (true, Err(e)) => panic!("[{}] expected success, got: {}", case.name, e),
            (false, Ok(_)) => panic!("[{}] expected failure, got a config", case.name),
            (false, Err(e)) => {
                if let Some(expected) = case.expected_error {
                    let message = e.to_string();
                    assert!(
                        message.contains(expected),
                        "[{}] error '{}' does not mention '{}'",
                        case.name,
                        message,
                        expected
                    );
                }
            }
        }
    }
}

#[test]
fn test_load_from_file_and_resolve() {
    let harness = TestHarness::new();
    let path = harness.temp_path().join("config.json");
    let json = serde_json::json!({
        "version": "1.0",
        "watch": { "directory": harness.input_dir, "debounce_ms": 250 },
        "log_directory": harness.log_dir,
        "smtp": { "host": " smtp.example.com ", "username": "u", "password": "secret" },
        "sender": "mailer@example.com",
        "recipient": "accounts@example.com"
    });
    std::fs::write(&path, json.to_string()).unwrap();

    let config = load_config(&path).unwrap();
    let resolved = PipelineConfig::from_config(&config).unwrap();

    assert_eq!(resolved.format, OutputFormat::Tabular);
    assert_eq!(resolved.watch_directory, harness.input_dir);
    assert_eq!(resolved.log_path, harness.log_path());
    assert_eq!(resolved.debounce, Duration::from_millis(250));
    assert_eq!(resolved.smtp.host, "smtp.example.com");
    assert_eq!(resolved.smtp.password.expose_secret(), "secret");
}

#[test]
fn test_missing_file_reports_path() {
    let harness = TestHarness::new();
    let path = harness.temp_path().join("absent.json");

    match load_config(&path) {
        Err(ConfigError::ReadFile { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("Expected ReadFile error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_password_from_environment() {
    let harness = TestHarness::new();
    let json = serde_json::json!({
        "version": "1.0",
        "watch": { "directory": harness.input_dir },
        "log_directory": harness.log_dir,
        "smtp": { "host": "smtp.example.com", "username": "u", "password_env_var": "DOCMAILER_IT_PASSWORD" },
        "sender": "mailer@example.com",
        "recipient": "accounts@example.com"
    });
    let config = load_config_from_str(&json.to_string()).unwrap();

    std::env::remove_var("DOCMAILER_IT_PASSWORD");
    assert!(matches!(
        PipelineConfig::from_config(&config),
        Err(ConfigError::Secret { .. })
    ));

    std::env::set_var("DOCMAILER_IT_PASSWORD", "from-env");
    let resolved = PipelineConfig::from_config(&config).unwrap();
    assert_eq!(resolved.smtp.password.expose_secret(), "from-env");
    std::env::remove_var("DOCMAILER_IT_PASSWORD");
}

#[test]
#[serial]
fn test_config_path_resolution_order() {
    let explicit = std::path::PathBuf::from("/etc/docmailer/explicit.json");

    std::env::set_var(CONFIG_ENV_VAR, "/etc/docmailer/from-env.json");
    assert_eq!(resolve_config_path(Some(explicit.clone())).unwrap(), explicit);
    assert_eq!(
        resolve_config_path(None).unwrap(),
        std::path::PathBuf::from("/etc/docmailer/from-env.json")
    );
    std::env::remove_var(CONFIG_ENV_VAR);
}
