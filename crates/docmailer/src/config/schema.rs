use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub format: OutputFormat,
    pub watch: WatchConfig,
    pub log_directory: String,
    #[serde(default = "default_log_file_name")]
    pub log_file_name: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    pub smtp: SmtpConfig,
    pub sender: String,
    pub recipient: String,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub letter: LetterTemplate,
}

fn default_log_file_name() -> String {
    "service_log.txt".to_string()
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

/// The two document layouts a source file can be rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Semicolon-delimited rows transcribed into an XLSX grid.
    #[default]
    Tabular,
    /// Fixed business letter rendered to PDF.
    Letter,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Tabular => "xlsx",
            OutputFormat::Letter => "pdf",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutputFormat::Tabular => "tabular",
            OutputFormat::Letter => "letter",
        }
    }

    pub fn mail_subject(&self) -> &'static str {
        match self {
            OutputFormat::Tabular => "New Excel File",
            OutputFormat::Letter => "New PDF File",
        }
    }

    pub fn mail_body(&self) -> &'static str {
        match self {
            OutputFormat::Tabular => "Please find the attached Excel file.",
            OutputFormat::Letter => "Please find the attached PDF file.",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tabular" | "xlsx" => Ok(OutputFormat::Tabular),
            "letter" | "pdf" => Ok(OutputFormat::Letter),
            other => Err(format!("unknown format '{}'", other)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub directory: String,
    /// Glob matched against the file name, e.g. `*.txt`.
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Quiet window the debouncer waits for before reporting a path.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Delay between two size/mtime samples of a detected file.
    #[serde(default = "default_stability_interval_ms")]
    pub stability_interval_ms: u64,
    /// Maximum number of samples before a file is processed as-is.
    #[serde(default = "default_stability_checks")]
    pub stability_checks: u32,
    #[serde(default)]
    pub process_existing: bool,
}

fn default_filter() -> String {
    "*.txt".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_stability_interval_ms() -> u64 {
    250
}

fn default_stability_checks() -> u32 {
    40
}

impl WatchConfig {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            filter: default_filter(),
            poll_interval_ms: default_poll_interval_ms(),
            debounce_ms: default_debounce_ms(),
            stability_interval_ms: default_stability_interval_ms(),
            stability_checks: default_stability_checks(),
            process_existing: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub tls: SmtpTls,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub password_file: Option<String>,
    #[serde(default)]
    pub password_env_var: Option<String>,
    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_timeout() -> u64 {
    30
}

/// How the SMTP session is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS (submission port 587).
    #[default]
    Starttls,
    /// TLS from the first byte (SMTPS, port 465).
    Wrapper,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetsConfig {
    #[serde(default)]
    pub left_logo: Option<String>,
    #[serde(default)]
    pub right_logo: Option<String>,
    #[serde(default)]
    pub footer: Option<String>,
}

/// Static boilerplate of the business letter. Nothing here comes from the
/// input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LetterTemplate {
    pub title: String,
    pub document_code: String,
    pub locality: String,
    pub address_lines: Vec<String>,
    pub reference_lines: Vec<String>,
    pub greeting: String,
    pub introduction: String,
    pub closing_lines: Vec<String>,
}

impl Default for LetterTemplate {
    fn default() -> Self {
        Self {
            title: "NOTA DE CRÉDITO".to_string(),
            document_code: "Código: FIN-NC-001".to_string(),
            locality: "Ciudad de Panamá".to_string(),
            address_lines: vec![
                "Señores".to_string(),
                "Departamento de Contabilidad".to_string(),
                "Presente".to_string(),
            ],
            reference_lines: vec!["Ref.: Ajuste de cuenta por servicio de taller".to_string()],
            greeting: "Estimados señores:".to_string(),
            introduction:
                "Por medio de la presente les informamos el detalle de la siguiente transacción:"
                    .to_string(),
            closing_lines: vec![
                "Sin otro particular, nos despedimos atentamente.".to_string(),
                String::new(),
                "Departamento de Finanzas".to_string(),
            ],
        }
    }
}
