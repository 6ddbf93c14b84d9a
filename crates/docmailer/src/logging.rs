//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr through `tracing`; `log` records from the worker
//! threads are bridged in. The audit log in [`crate::audit`] is separate and
//! always written, whatever the filter says.

use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;

pub const DEFAULT_FILTER: &str = "docmailer=info";

#[derive(Error, Debug)]
pub enum DiagnosticsError {
    #[error("Failed to install log bridge: {0}")]
    LogBridge(#[from] log::SetLoggerError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// `RUST_LOG` if set and valid, otherwise [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber. Call once, before anything logs.
pub fn init_diagnostics(format: LogFormat) -> Result<(), DiagnosticsError> {
    LogTracer::init()?;

    let registry = tracing_subscriber::registry().with(env_filter());

    match format {
        LogFormat::Text => {
            tracing::subscriber::set_global_default(
                registry.with(fmt::layer().with_writer(std::io::stderr)),
            )?;
        }
        LogFormat::Json => {
            tracing::subscriber::set_global_default(
                registry.with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(false)
                        .with_writer(std::io::stderr),
                ),
            )?;
        }
    }

    Ok(())
}
