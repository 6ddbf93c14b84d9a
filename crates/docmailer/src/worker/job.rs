use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::mail::DeliveryResult;

/// A file picked up by the watcher, waiting for its pipeline run.
#[derive(Debug, Clone)]
pub struct WatchedFile {
    pub id: String,
    pub path: PathBuf,
    pub detected_at: DateTime<Local>,
}

impl WatchedFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path,
            detected_at: Local::now(),
        }
    }
}

#[derive(Debug)]
pub struct JobResult {
    pub job_id: String,
    pub source_path: PathBuf,
    pub success: bool,
    /// Set whenever rendering succeeded, even if delivery then failed.
    pub artifact_path: Option<PathBuf>,
    pub delivery: Option<DeliveryResult>,
    pub error: Option<String>,
    /// The run could not write to the audit log.
    pub fatal: bool,
}

impl JobResult {
    pub fn delivered(file: &WatchedFile, artifact_path: PathBuf) -> Self {
        Self {
            job_id: file.id.clone(),
            source_path: file.path.clone(),
            success: true,
            artifact_path: Some(artifact_path),
            delivery: Some(DeliveryResult::Sent),
            error: None,
            fatal: false,
        }
    }

    pub fn undelivered(file: &WatchedFile, artifact_path: PathBuf, delivery: DeliveryResult) -> Self {
        let error = match &delivery {
            DeliveryResult::Failed { reason, .. } => Some(reason.clone()),
            DeliveryResult::Sent => None,
        };
        Self {
            job_id: file.id.clone(),
            source_path: file.path.clone(),
            success: delivery.is_sent(),
            artifact_path: Some(artifact_path),
            delivery: Some(delivery),
            error,
            fatal: false,
        }
    }

    pub fn failure(file: &WatchedFile, error: String) -> Self {
        Self {
            job_id: file.id.clone(),
            source_path: file.path.clone(),
            success: false,
            artifact_path: None,
            delivery: None,
            error: Some(error),
            fatal: false,
        }
    }

    pub fn fatal(file: &WatchedFile, error: String) -> Self {
        Self {
            fatal: true,
            ..Self::failure(file, error)
        }
    }
}
