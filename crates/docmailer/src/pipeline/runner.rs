use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info_span, warn};

use crate::audit::AuditLog;
use crate::error::ConfigError;
use crate::mail::{DeliveryResult, Mailer, SmtpMailer};
use crate::parser;
use crate::render::{renderer_for, DocumentRenderer};
use crate::sanitize;
use crate::worker::job::{JobResult, WatchedFile};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::stability::wait_until_stable;

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    renderer: Box<dyn DocumentRenderer>,
    mailer: Arc<dyn Mailer>,
    audit: Arc<AuditLog>,
}

impl Pipeline {
    /// Production constructor: renderer by configured format, SMTP mailer.
    pub fn from_config(config: Arc<PipelineConfig>, audit: Arc<AuditLog>) -> Result<Self, ConfigError> {
        let mailer = SmtpMailer::new(config.smtp.clone(), &config.sender, &config.recipient)
            .map_err(|e| ConfigError::Invalid {
                key: "sender/recipient".to_string(),
                reason: e.to_string(),
            })?;
        let renderer = renderer_for(config.format, &config.letter);

        Ok(Self::new(config, renderer, Arc::new(mailer), audit))
    }

    /// Assembles a pipeline from explicit parts.
    pub fn new(
        config: Arc<PipelineConfig>,
        renderer: Box<dyn DocumentRenderer>,
        mailer: Arc<dyn Mailer>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            config,
            renderer,
            mailer,
            audit,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    /// Runs one file through stability check, read, parse, render and
    /// delivery. Never panics or returns an error; the outcome is in the
    /// [`JobResult`] and the audit log.
    pub fn run(&self, file: WatchedFile) -> JobResult {
        let filename = sanitize::redact_path(&file.path);
        let _pipeline_span = info_span!("pipeline",
            job_id = %file.id,
            filename = %filename,
            format = %self.renderer.format(),
        )
        .entered();

        let mut ctx = PipelineContext::new(file);

        match self.execute(&mut ctx) {
            Ok(()) => match ctx.artifact.take() {
                Some(artifact) => JobResult::delivered(&ctx.file, artifact.path),
                None => JobResult::failure(&ctx.file, "No document was produced".to_string()),
            },
            Err(PipelineError::Delivery { reason }) => {
                let delivery = ctx.delivery.take().unwrap_or(DeliveryResult::Failed {
                    reason,
                    protocol: false,
                });
                match ctx.artifact.take() {
                    Some(artifact) => JobResult::undelivered(&ctx.file, artifact.path, delivery),
                    None => JobResult::failure(&ctx.file, delivery.log_message()),
                }
            }
            Err(e) if e.is_fatal() => {
                error!("{}", e);
                JobResult::fatal(&ctx.file, e.to_string())
            }
            Err(e) => {
                warn!("Run failed: {}", e);
                let entry = format!("Error processing {}: {}", ctx.file.path.display(), e);
                if let Err(log_err) = self.audit.append(&entry) {
                    error!("{}", log_err);
                    return JobResult::fatal(&ctx.file, log_err.to_string());
                }
                JobResult::failure(&ctx.file, e.to_string())
            }
        }
    }

    fn execute(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        self.audit
            .append(&format!("File detected: {}", ctx.file.path.display()))?;

        // Step 1: Wait for the writer to finish
        {
            let _step = info_span!("await_stable").entered();
            self.step_await_stable(ctx)?;
        }

        // Step 2: Read
        {
            let _step = info_span!("read_file").entered();
            self.step_read(ctx)?;
        }

        // Step 3: Parse
        {
            let _step = info_span!("parse").entered();
            self.step_parse(ctx)?;
        }

        // Step 4: Render
        {
            let _step = info_span!("render").entered();
            self.step_render(ctx)?;
        }

        // Step 5: Deliver
        {
            let _step = info_span!("deliver").entered();
            self.step_deliver(ctx)?;
        }

        Ok(())
    }

    fn step_await_stable(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let path = ctx.file.path.as_path();
        ctx.stable = wait_until_stable(
            path,
            self.config.stability_interval,
            self.config.stability_checks,
        )
        .map_err(|e| read_error(path, e))?;

        if !ctx.stable {
            warn!("File still changing or empty after all checks, processing as-is");
        }
        Ok(())
    }

    fn step_read(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let path = ctx.file.path.as_path();
        let bytes = std::fs::read(path).map_err(|e| read_error(path, e))?;

        let content = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!("File is not valid UTF-8, replacing invalid sequences");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        debug!(bytes = content.len(), "Read source file");
        ctx.content = Some(content);
        Ok(())
    }

    fn step_parse(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let content = ctx.content.as_deref().unwrap_or_default();
        let record = parser::parse(self.renderer.format(), content)?;
        ctx.record = Some(record);
        Ok(())
    }

    fn step_render(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let Some(record) = ctx.record.as_ref() else {
            return Err(PipelineError::Parse(crate::error::ParseError::EmptyInput));
        };

        let artifact = self
            .renderer
            .render(record, Some(&self.config.assets), &ctx.file.path)?;

        self.audit.append(&format!(
            "Created {} document: {}",
            artifact.format.label(),
            artifact.path.display()
        ))?;
        ctx.artifact = Some(artifact);
        Ok(())
    }

    fn step_deliver(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let Some(artifact) = ctx.artifact.as_ref() else {
            return Ok(());
        };

        let delivery = self.mailer.send(artifact);
        let entry = if delivery.is_sent() {
            delivery.log_message()
        } else {
            // The artifact stays on disk; name it so it can be resent by hand
            format!(
                "{} (source: {}, attachment: {})",
                delivery.log_message(),
                ctx.file.path.display(),
                artifact.path.display()
            )
        };
        self.audit.append(&entry)?;

        let failure = match &delivery {
            DeliveryResult::Sent => None,
            DeliveryResult::Failed { reason, .. } => Some(reason.clone()),
        };
        ctx.delivery = Some(delivery);

        match failure {
            None => Ok(()),
            Some(reason) => Err(PipelineError::Delivery { reason }),
        }
    }
}

fn read_error(path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::FileRead {
        path: path.to_path_buf(),
        source,
    }
}
