use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, LetterTemplate, OutputFormat};
use crate::error::ConfigError;
use crate::mail::SmtpSettings;
use crate::render::TemplateAssets;
use crate::secrets::{expand_home, resolve_secret};

/// Everything a run needs, resolved once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub format: OutputFormat,
    pub watch_directory: PathBuf,
    pub filter: String,
    pub poll_interval: Duration,
    pub debounce: Duration,
    pub stability_interval: Duration,
    pub stability_checks: u32,
    pub process_existing: bool,
    pub log_path: PathBuf,
    pub worker_count: usize,
    pub smtp: SmtpSettings,
    pub sender: String,
    pub recipient: String,
    pub assets: TemplateAssets,
    pub letter: LetterTemplate,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let password = resolve_secret(
            config.smtp.password.as_deref(),
            config.smtp.password_file.as_deref(),
            config.smtp.password_env_var.as_deref(),
        )
        .map_err(|e| ConfigError::Secret {
            key: "smtp.password".to_string(),
            source: e,
        })?;

        let log_directory = PathBuf::from(expand_home(&config.log_directory));

        Ok(Self {
            format: config.format,
            watch_directory: PathBuf::from(expand_home(&config.watch.directory)),
            filter: config.watch.filter.clone(),
            poll_interval: Duration::from_millis(config.watch.poll_interval_ms),
            debounce: Duration::from_millis(config.watch.debounce_ms),
            stability_interval: Duration::from_millis(config.watch.stability_interval_ms),
            stability_checks: config.watch.stability_checks,
            process_existing: config.watch.process_existing,
            log_path: log_directory.join(&config.log_file_name),
            worker_count: config.worker_count,
            smtp: SmtpSettings {
                host: config.smtp.host.trim().to_string(),
                port: config.smtp.port,
                tls: config.smtp.tls,
                username: config.smtp.username.clone(),
                password,
                timeout: Duration::from_secs(config.smtp.timeout_secs),
            },
            sender: config.sender.clone(),
            recipient: config.recipient.clone(),
            assets: TemplateAssets::from_config(&config.assets),
            letter: config.letter.clone(),
        })
    }
}
