use std::path::Path;
use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, info_span, warn};

use crate::config::SmtpTls;
use crate::render::DocumentArtifact;
use crate::sanitize;

use super::error::{DeliveryResult, MailError, Result};

/// Delivers a rendered document. Implementations report failures through
/// [`DeliveryResult`] instead of returning errors.
pub trait Mailer: Send + Sync {
    fn send(&self, artifact: &DocumentArtifact) -> DeliveryResult;
}

/// Relay endpoint and resolved credentials.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub tls: SmtpTls,
    pub username: String,
    pub password: SecretString,
    pub timeout: Duration,
}

pub struct SmtpMailer {
    settings: SmtpSettings,
    sender: Mailbox,
    recipient: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings, sender: &str, recipient: &str) -> Result<Self> {
        Ok(Self {
            settings,
            sender: parse_mailbox(sender)?,
            recipient: parse_mailbox(recipient)?,
        })
    }

    fn transport(&self) -> Result<SmtpTransport> {
        let builder = match self.settings.tls {
            SmtpTls::Starttls => SmtpTransport::starttls_relay(&self.settings.host),
            SmtpTls::Wrapper => SmtpTransport::relay(&self.settings.host),
        }
        .map_err(|e| MailError::Transport(e.to_string()))?;

        let credentials = Credentials::new(
            self.settings.username.clone(),
            self.settings.password.expose_secret().to_string(),
        );

        Ok(builder
            .port(self.settings.port)
            .credentials(credentials)
            .timeout(Some(self.settings.timeout))
            .build())
    }

    fn try_send(&self, artifact: &DocumentArtifact) -> Result<()> {
        let message = build_message(&self.sender, &self.recipient, artifact)?;
        // A fresh transport per message; nothing is kept open between sends
        let transport = self.transport()?;
        transport.send(&message)?;
        Ok(())
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, artifact: &DocumentArtifact) -> DeliveryResult {
        let _span = info_span!(
            "mail.send",
            recipient = %sanitize::redact_address(&self.recipient.to_string()),
            attachment = %sanitize::redact_path(&artifact.path),
        )
        .entered();

        match self.try_send(artifact) {
            Ok(()) => {
                info!("Message accepted by {}", self.settings.host);
                DeliveryResult::Sent
            }
            Err(e) => {
                warn!(protocol = e.is_protocol(), "Delivery failed: {}", e);
                DeliveryResult::from_error(&e)
            }
        }
    }
}

pub fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| MailError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })
}

const OCTET_STREAM: &str = "application/octet-stream";

/// Content type of an attachment, guessed from its extension. Unknown or
/// unparseable types become `application/octet-stream`.
pub fn attachment_content_type(path: &Path) -> Result<ContentType> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    ContentType::parse(mime.essence_str())
        .or_else(|_| ContentType::parse(OCTET_STREAM))
        .map_err(|e| MailError::Build(e.to_string()))
}

/// Builds the message for `artifact`: the format's fixed subject and body
/// plus the document as the single attachment.
pub fn build_message(
    sender: &Mailbox,
    recipient: &Mailbox,
    artifact: &DocumentArtifact,
) -> Result<Message> {
    let content = std::fs::read(&artifact.path).map_err(|e| MailError::AttachmentRead {
        path: artifact.path.clone(),
        source: e,
    })?;

    let file_name = artifact
        .path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("document.{}", artifact.format.extension()));

    let attachment =
        Attachment::new(file_name).body(content, attachment_content_type(&artifact.path)?);

    let message = Message::builder()
        .from(sender.clone())
        .to(recipient.clone())
        .subject(artifact.format.mail_subject())
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(artifact.format.mail_body().to_string()))
                .singlepart(attachment),
        )?;

    Ok(message)
}
