//! Outgoing mail.
//!
//! Each rendered document is sent as the single attachment of one message
//! over a fresh SMTP connection. Delivery is attempted once; the outcome is a
//! [`DeliveryResult`], never an error.

pub mod error;
pub mod mailer;

pub use error::{DeliveryResult, MailError};
pub use mailer::{build_message, parse_mailbox, Mailer, SmtpMailer, SmtpSettings};
