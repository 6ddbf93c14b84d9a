//! Outgoing mail error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while composing or submitting a message.
#[derive(Error, Debug)]
pub enum MailError {
    /// Sender or recipient does not parse as a mailbox.
    #[error("Invalid mail address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The rendered document could not be read back for attaching.
    #[error("Failed to read attachment '{path}': {source}")]
    AttachmentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Message could not be assembled.
    #[error("Failed to build message: {0}")]
    Build(String),

    /// Transport could not be set up for the configured relay.
    #[error("Failed to configure SMTP transport: {0}")]
    Transport(String),

    /// Connection, authentication or server rejection during submission.
    #[error("{0}")]
    Smtp(String),
}

impl MailError {
    /// True for failures raised by the SMTP exchange itself.
    pub fn is_protocol(&self) -> bool {
        matches!(self, MailError::Transport(_) | MailError::Smtp(_))
    }
}

impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        MailError::Smtp(err.to_string())
    }
}

impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        MailError::Build(err.to_string())
    }
}

/// Outcome of one delivery attempt. Never an error past the mailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    Sent,
    Failed { reason: String, protocol: bool },
}

impl DeliveryResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryResult::Sent)
    }

    pub fn from_error(err: &MailError) -> Self {
        DeliveryResult::Failed {
            reason: err.to_string(),
            protocol: err.is_protocol(),
        }
    }

    /// The audit-log line for this outcome.
    pub fn log_message(&self) -> String {
        match self {
            DeliveryResult::Sent => "Email sent successfully.".to_string(),
            DeliveryResult::Failed {
                reason,
                protocol: true,
            } => format!("SMTP Error: {}", reason),
            DeliveryResult::Failed {
                reason,
                protocol: false,
            } => format!("General Error: {}", reason),
        }
    }
}

pub type Result<T> = std::result::Result<T, MailError>;
