//! docmailer service binary.
//!
//! Usage:
//!     docmailer run [--config PATH]
//!     docmailer render <FILE> [--format tabular|letter]
//!     docmailer check-config [--config PATH]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use docmailer::config::{load_config, resolve_config_path, Config, LetterTemplate, LogFormat};
use docmailer::render::renderer_for;
use docmailer::{parse, DocmailerError, OutputFormat, PipelineConfig, Service, TemplateAssets};

#[derive(Parser, Debug)]
#[command(
    name = "docmailer",
    version,
    about = "Turns text files dropped into a directory into XLSX or PDF documents and mails them"
)]
struct Cli {
    /// Config file (defaults to $DOCMAILER_CONFIG, then the platform config dir)
    #[arg(short, long, global = true, env = "DOCMAILER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the configured directory until interrupted
    Run,

    /// Render one file next to itself without sending mail
    Render {
        /// Source text file
        file: PathBuf,

        /// Layout to use instead of the configured one
        #[arg(short, long)]
        format: Option<OutputFormat>,
    },

    /// Validate the configuration and exit
    CheckConfig,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    App(#[from] DocmailerError),

    #[error("Failed to install Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("Service stopped after an unrecoverable error")]
    Failed,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run => run_service(cli.config),
        Commands::Render { file, format } => {
            render_once(cli.config, &file, format).map_err(CliError::from)
        }
        Commands::CheckConfig => check_config(cli.config).map_err(CliError::from),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("docmailer: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load(explicit: Option<PathBuf>) -> docmailer::Result<(PathBuf, Config)> {
    let path = resolve_config_path(explicit)?;
    let config = load_config(&path)?;
    Ok((path, config))
}

fn run_service(config_path: Option<PathBuf>) -> Result<(), CliError> {
    let (path, config) = load(config_path)?;
    docmailer::logging::init_diagnostics(config.log_format).map_err(DocmailerError::from)?;

    info!("Starting docmailer v{}", env!("CARGO_PKG_VERSION"));
    info!("Using config {}", path.display());

    let pipeline_config =
        Arc::new(PipelineConfig::from_config(&config).map_err(DocmailerError::from)?);
    let service = Service::new(pipeline_config)?.start()?;

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })?;

    let mut failed = false;
    loop {
        match stop_rx.recv_timeout(Duration::from_millis(500)) {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if service.has_failed() {
                    error!("Unrecoverable error, shutting down");
                    failed = true;
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    service.stop().map_err(DocmailerError::from)?;

    if failed {
        return Err(CliError::Failed);
    }
    Ok(())
}

fn render_once(
    config_path: Option<PathBuf>,
    file: &Path,
    format: Option<OutputFormat>,
) -> docmailer::Result<()> {
    docmailer::logging::init_diagnostics(LogFormat::Text)?;

    let (configured_format, letter, assets) = match load(config_path) {
        Ok((_, config)) => (
            config.format,
            config.letter,
            TemplateAssets::from_config(&config.assets),
        ),
        // An explicit format is enough to render with the built-in template
        Err(e) if format.is_some() => {
            warn!("Rendering without configuration: {}", e);
            (
                OutputFormat::default(),
                LetterTemplate::default(),
                TemplateAssets::default(),
            )
        }
        Err(e) => return Err(e),
    };
    let format = format.unwrap_or(configured_format);

    let content = std::fs::read_to_string(file).map_err(|e| DocmailerError::ReadFile {
        path: file.to_path_buf(),
        source: e,
    })?;
    let record = parse(format, &content)?;
    let artifact = renderer_for(format, &letter).render(&record, Some(&assets), file)?;

    println!("{}", artifact.path.display());
    Ok(())
}

fn check_config(config_path: Option<PathBuf>) -> docmailer::Result<()> {
    docmailer::logging::init_diagnostics(LogFormat::Text)?;

    let (path, config) = load(config_path)?;
    let resolved = PipelineConfig::from_config(&config)?;

    println!("Configuration OK: {}", path.display());
    println!("  format:    {}", resolved.format);
    println!(
        "  watching:  {} ({})",
        resolved.watch_directory.display(),
        resolved.filter
    );
    println!("  log:       {}", resolved.log_path.display());
    println!(
        "  smtp:      {}:{} ({:?})",
        resolved.smtp.host, resolved.smtp.port, resolved.smtp.tls
    );
    println!("  mail:      {} -> {}", resolved.sender, resolved.recipient);
    println!("  workers:   {}", resolved.worker_count);

    if !resolved.watch_directory.is_dir() {
        warn!(
            "Watch directory {} does not exist yet",
            resolved.watch_directory.display()
        );
    }

    Ok(())
}
