use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocmailerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Diagnostics error: {0}")]
    Diagnostics(#[from] crate::logging::DiagnosticsError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Required setting '{key}' is missing or empty")]
    Missing { key: String },

    #[error("Invalid setting '{key}': {reason}")]
    Invalid { key: String, reason: String },

    #[error("Failed to resolve secret for '{key}': {source}")]
    Secret {
        key: String,
        #[source]
        source: crate::secrets::SecretError,
    },

    #[error("No config file given and no default location could be determined")]
    NoConfigLocation,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Input is empty")]
    EmptyInput,

    #[error("Line {line}: expected at least {required} fields, found {found}")]
    InsufficientFields {
        line: usize,
        found: usize,
        required: usize,
    },
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to write document '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("Failed to build PDF: {0}")]
    Pdf(String),

    #[error("Record does not match the {expected} layout")]
    RecordMismatch { expected: &'static str },

    #[error("Source path has no file name: {0}")]
    InvalidSourcePath(PathBuf),
}

#[derive(Error, Debug)]
#[error("Failed to append to log '{path}': {source}")]
pub struct LoggingError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Directory scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Invalid watch filter '{pattern}': {reason}")]
    InvalidFilter { pattern: String, reason: String },
}

pub type Result<T> = std::result::Result<T, DocmailerError>;
