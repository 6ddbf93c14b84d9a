//! Append-only audit log.
//!
//! This is the service's user-visible trail: one line per entry,
//! `"<timestamp>: <message>"`. Every append opens the file, writes, and closes
//! it again, so no handle outlives a call. Appends from concurrent pipeline
//! runs are serialized through a mutex.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;

use crate::error::LoggingError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub struct AuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AuditLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn in_directory<P: AsRef<Path>>(directory: P, file_name: &str) -> Self {
        Self::new(directory.as_ref().join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the log's parent directory if it is missing.
    pub fn ensure_directory(&self) -> Result<(), LoggingError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent).map_err(|e| LoggingError {
                    path: parent.to_path_buf(),
                    source: e,
                })
            }
            _ => Ok(()),
        }
    }

    /// Appends one timestamped line. Embedded line breaks are flattened so an
    /// entry never spans more than one line.
    pub fn append(&self, message: &str) -> Result<(), LoggingError> {
        let flattened = flatten(message);

        // A poisoned lock only means another writer panicked mid-append;
        // the file itself is still usable.
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());

        let line = format!("{}: {}\n", Local::now().format(TIMESTAMP_FORMAT), flattened);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.error(e))?;
        file.write_all(line.as_bytes()).map_err(|e| self.error(e))?;

        tracing::info!(target: "docmailer::audit", "{}", flattened);
        Ok(())
    }

    fn error(&self, source: std::io::Error) -> LoggingError {
        LoggingError {
            path: self.path.clone(),
            source,
        }
    }
}

fn flatten(message: &str) -> String {
    if message.contains(['\n', '\r']) {
        message
            .split(['\n', '\r'])
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" | ")
    } else {
        message.to_string()
    }
}
