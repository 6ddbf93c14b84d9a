use std::path::PathBuf;

use thiserror::Error;

use crate::error::{LoggingError, ParseError, RenderError};

/// Why a single run stopped. Only [`PipelineError::Logging`] is fatal to
/// the service; everything else ends the one run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("Delivery failed: {reason}")]
    Delivery { reason: String },

    #[error("Audit log unavailable: {0}")]
    Logging(#[from] LoggingError),
}

impl PipelineError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Logging(_))
    }
}
