use std::path::{Path, PathBuf};

use lettre::message::Mailbox;

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::secrets::has_secret_source;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// Environment variable consulted when no `--config` flag is given.
pub const CONFIG_ENV_VAR: &str = "DOCMAILER_CONFIG";

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// `~/.config/docmailer/config.json` (or the platform equivalent).
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("docmailer").join("config.json"))
}

/// Picks the config file: explicit path first, then `DOCMAILER_CONFIG`,
/// then the platform default location.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    default_config_path().ok_or(ConfigError::NoConfigLocation)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn require_non_empty(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing {
            key: key.to_string(),
        });
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    require_non_empty("watch.directory", &config.watch.directory)?;
    require_non_empty("watch.filter", &config.watch.filter)?;
    require_non_empty("log_directory", &config.log_directory)?;
    require_non_empty("log_file_name", &config.log_file_name)?;
    require_non_empty("smtp.host", &config.smtp.host)?;
    require_non_empty("smtp.username", &config.smtp.username)?;
    require_non_empty("sender", &config.sender)?;
    require_non_empty("recipient", &config.recipient)?;

    if let Err(e) = glob::Pattern::new(&config.watch.filter) {
        return Err(ConfigError::Invalid {
            key: "watch.filter".to_string(),
            reason: e.to_string(),
        });
    }

    if config.log_file_name.contains('/') || config.log_file_name.contains('\\') {
        return Err(ConfigError::Invalid {
            key: "log_file_name".to_string(),
            reason: "must be a bare file name".to_string(),
        });
    }

    if config.worker_count == 0 {
        return Err(ConfigError::Invalid {
            key: "worker_count".to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    if config.watch.stability_checks == 0 {
        return Err(ConfigError::Invalid {
            key: "watch.stability_checks".to_string(),
            reason: "must be greater than 0".to_string(),
        });
    }

    if !has_secret_source(
        config.smtp.password.as_deref(),
        config.smtp.password_file.as_deref(),
        config.smtp.password_env_var.as_deref(),
    ) {
        return Err(ConfigError::Missing {
            key: "smtp.password | smtp.password_file | smtp.password_env_var".to_string(),
        });
    }

    for (key, value) in [("sender", &config.sender), ("recipient", &config.recipient)] {
        if let Err(e) = value.parse::<Mailbox>() {
            return Err(ConfigError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{OutputFormat, SmtpTls};

    fn minimal_json() -> serde_json::Value {
        serde_json::json!({
            "version": "1.0",
            "watch": { "directory": "/srv/drop" },
            "log_directory": "/var/log/docmailer",
            "smtp": {
                "host": "smtp.example.com",
                "username": "mailer@example.com",
                "password": "hunter2"
            },
            "sender": "mailer@example.com",
            "recipient": "Accounts <accounts@example.com>"
        })
    }

    #[test]
    fn test_load_minimal_config_applies_defaults() {
        let config = load_config_from_str(&minimal_json().to_string()).unwrap();
        assert_eq!(config.format, OutputFormat::Tabular);
        assert_eq!(config.log_file_name, "service_log.txt");
        assert_eq!(config.watch.filter, "*.txt");
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.smtp.tls, SmtpTls::Starttls);
        assert!(config.worker_count > 0);
        assert!(config.assets.left_logo.is_none());
    }

    #[test]
    fn test_load_letter_config_with_assets() {
        let mut json = minimal_json();
        json["format"] = "letter".into();
        json["assets"] = serde_json::json!({ "left_logo": "/assets/left.png", "footer": null });

        let config = load_config_from_str(&json.to_string()).unwrap();
        assert_eq!(config.format, OutputFormat::Letter);
        assert_eq!(config.assets.left_logo.as_deref(), Some("/assets/left.png"));
        assert!(config.assets.footer.is_none());
    }

    #[test]
    fn test_invalid_version() {
        let mut json = minimal_json();
        json["version"] = "2.0".into();
        assert!(matches!(
            load_config_from_str(&json.to_string()),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn test_missing_required_key_fails_schema() {
        let mut json = minimal_json();
        json.as_object_mut().unwrap().remove("recipient");
        assert!(matches!(
            load_config_from_str(&json.to_string()),
            Err(ConfigError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn test_unknown_key_fails_schema() {
        let mut json = minimal_json();
        json["smpt"] = serde_json::json!({});
        assert!(matches!(
            load_config_from_str(&json.to_string()),
            Err(ConfigError::SchemaValidation { .. })
        ));
    }

    #[test]
    fn test_empty_required_string_rejected() {
        let mut json = minimal_json();
        json["smtp"]["host"] = "  ".into();
        match load_config_from_str(&json.to_string()) {
            Err(ConfigError::Missing { key }) => assert_eq!(key, "smtp.host"),
            other => panic!("Expected Missing error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_password_source_rejected() {
        let mut json = minimal_json();
        json["smtp"].as_object_mut().unwrap().remove("password");
        assert!(matches!(
            load_config_from_str(&json.to_string()),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn test_malformed_recipient_rejected() {
        let mut json = minimal_json();
        json["recipient"] = "not an address".into();
        match load_config_from_str(&json.to_string()) {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, "recipient"),
            other => panic!("Expected Invalid error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let mut json = minimal_json();
        json["watch"]["filter"] = "[*.txt".into();
        assert!(matches!(
            load_config_from_str(&json.to_string()),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_log_file_name_with_separator_rejected() {
        let mut json = minimal_json();
        json["log_file_name"] = "../escape.txt".into();
        assert!(matches!(
            load_config_from_str(&json.to_string()),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            load_config_from_str("{ not json"),
            Err(ConfigError::ParseJson(_))
        ));
    }

    #[test]
    fn test_resolve_config_path_prefers_explicit() {
        let explicit = PathBuf::from("/etc/docmailer.json");
        assert_eq!(
            resolve_config_path(Some(explicit.clone())).unwrap(),
            explicit
        );
    }
}
