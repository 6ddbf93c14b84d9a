//! Test harness for isolated pipeline and service runs.
//!
//! Each `TestHarness` owns a temporary directory with an `input/` drop
//! directory and a `logs/` directory for the audit log. Mail is captured by a
//! [`RecordingMailer`] instead of going to an SMTP server.

#![allow(dead_code)]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use secrecy::SecretString;
use tempfile::TempDir;

use docmailer::config::{LetterTemplate, OutputFormat, SmtpTls};
use docmailer::mail::SmtpSettings;
use docmailer::render::renderer_for;
use docmailer::{
    AuditLog, DeliveryResult, DocumentArtifact, Mailer, Pipeline, PipelineConfig, TemplateAssets,
};

/// Captures every attachment it is asked to send and answers with a fixed
/// outcome.
pub struct RecordingMailer {
    sent: Mutex<Vec<PathBuf>>,
    outcome: DeliveryResult,
}

impl RecordingMailer {
    pub fn accepting() -> Arc<Self> {
        Self::with_outcome(DeliveryResult::Sent)
    }

    pub fn with_outcome(outcome: DeliveryResult) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            outcome,
        })
    }

    pub fn sent(&self) -> Vec<PathBuf> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, artifact: &DocumentArtifact) -> DeliveryResult {
        self.sent.lock().unwrap().push(artifact.path.clone());
        self.outcome.clone()
    }
}

/// Isolated environment for integration tests.
pub struct TestHarness {
    temp_dir: TempDir,
    /// The watched drop directory.
    pub input_dir: PathBuf,
    /// Where the audit log lives.
    pub log_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let input_dir = temp_dir.path().join("input");
        let log_dir = temp_dir.path().join("logs");

        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");
        std::fs::create_dir_all(&log_dir).expect("Failed to create log dir");

        Self {
            temp_dir,
            input_dir,
            log_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write_input(&self, filename: &str, content: &str) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join("service_log.txt")
    }

    /// A resolved config with intervals short enough for tests.
    pub fn config(&self, format: OutputFormat) -> PipelineConfig {
        PipelineConfig {
            format,
            watch_directory: self.input_dir.clone(),
            filter: "*.txt".to_string(),
            poll_interval: Duration::from_millis(50),
            debounce: Duration::from_millis(100),
            stability_interval: Duration::from_millis(10),
            stability_checks: 3,
            process_existing: false,
            log_path: self.log_path(),
            worker_count: 2,
            smtp: SmtpSettings {
                host: "smtp.invalid".to_string(),
                port: 587,
                tls: SmtpTls::Starttls,
                username: "mailer@example.com".to_string(),
                password: SecretString::from("unused".to_string()),
                timeout: Duration::from_secs(1),
            },
            sender: "mailer@example.com".to_string(),
            recipient: "accounts@example.com".to_string(),
            assets: TemplateAssets::default(),
            letter: LetterTemplate::default(),
        }
    }

    pub fn pipeline(&self, config: PipelineConfig, mailer: Arc<RecordingMailer>) -> Arc<Pipeline> {
        let config = Arc::new(config);
        let audit = Arc::new(AuditLog::new(&config.log_path));
        let renderer = renderer_for(config.format, &config.letter);
        Arc::new(Pipeline::new(config, renderer, mailer, audit))
    }

    /// Audit entries with their timestamps stripped.
    pub fn audit_messages(&self) -> Vec<String> {
        let content = std::fs::read_to_string(self.log_path()).unwrap_or_default();
        content
            .lines()
            .map(|line| match line.split_once(": ") {
                Some((_, message)) => message.to_string(),
                None => line.to_string(),
            })
            .collect()
    }
}

/// Polls `condition` every 25 ms until it holds or `timeout` passes.
pub fn wait_for<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    condition()
}

/// Raw XML of the first worksheet in an XLSX package.
pub fn sheet_xml(path: &Path) -> String {
    let file = std::fs::File::open(path).expect("Failed to open workbook");
    let mut archive = zip::ZipArchive::new(file).expect("Workbook is not a zip archive");
    let mut xml = String::new();
    archive
        .by_name(docmailer::render::xlsx::SHEET_PART)
        .expect("Workbook has no first sheet")
        .read_to_string(&mut xml)
        .expect("Sheet is not UTF-8");
    xml
}
