pub mod audit;
pub mod config;
pub mod error;
pub mod logging;
pub mod mail;
pub mod parser;
pub mod pipeline;
pub mod render;
pub mod sanitize;
pub mod secrets;
pub mod service;
pub mod worker;

pub use audit::AuditLog;
pub use config::{load_config, Config, OutputFormat};
pub use error::{
    ConfigError, DocmailerError, LoggingError, ParseError, RenderError, Result, WorkerError,
};
pub use mail::{DeliveryResult, MailError, Mailer, SmtpMailer};
pub use parser::{parse, LetterRecord, ParsedRecord, TabularRecord};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext, PipelineError};
pub use render::{DocumentArtifact, DocumentRenderer, LetterRenderer, TabularRenderer, TemplateAssets};
pub use secrets::{resolve_secret, SecretError};
pub use service::{RunningService, Service};
pub use worker::{DirectoryScanner, JobResult, WatchedFile, WorkerPool};
