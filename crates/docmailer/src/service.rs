//! Service lifecycle: wires the watcher to the worker pool and records
//! start and stop in the audit log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info, warn};

use crate::audit::AuditLog;
use crate::error::{LoggingError, Result, WorkerError};
use crate::pipeline::{Pipeline, PipelineConfig};
use crate::worker::{DirectoryScanner, JobResult, WatchedFile, WorkerPool};

pub struct Service {
    pipeline: Arc<Pipeline>,
}

impl Service {
    /// Builds the production pipeline (SMTP delivery) from resolved config.
    pub fn new(config: Arc<PipelineConfig>) -> Result<Self> {
        let audit = Arc::new(AuditLog::new(&config.log_path));
        let pipeline = Pipeline::from_config(config, audit)?;
        Ok(Self::with_pipeline(Arc::new(pipeline)))
    }

    pub fn with_pipeline(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    /// Starts watching. Files already in the directory are marked as seen,
    /// or queued once when `process_existing` is set.
    pub fn start(self) -> Result<RunningService> {
        let config = self.pipeline.config().clone();
        let audit = Arc::clone(self.pipeline.audit());

        audit.ensure_directory()?;

        let scanner = Arc::new(
            DirectoryScanner::new(&config.watch_directory, &config.filter)?
                .with_intervals(config.poll_interval, config.debounce)
                .ignoring(audit.path()),
        );
        let existing = scanner.prime()?;

        let pool = WorkerPool::new(Arc::clone(&self.pipeline), config.worker_count)?;

        if config.process_existing {
            info!("Queueing {} pre-existing files", existing.len());
            for path in existing {
                pool.submit(WatchedFile::new(path))?;
            }
        }

        let failed = Arc::new(AtomicBool::new(false));
        let collector = spawn_collector(pool.results(), Arc::clone(&failed))?;

        let watch_shutdown = Arc::new(AtomicBool::new(false));
        let watcher = spawn_watcher(
            Arc::clone(&scanner),
            pool.submitter(),
            Arc::clone(&watch_shutdown),
            Arc::clone(&failed),
        )?;

        audit.append("Service started")?;
        info!(
            "Service started: watching {} for '{}'",
            config.watch_directory.display(),
            config.filter
        );

        Ok(RunningService {
            scanner,
            pool,
            audit,
            failed,
            watch_shutdown,
            watcher: Some(watcher),
            collector: Some(collector),
        })
    }
}

pub struct RunningService {
    scanner: Arc<DirectoryScanner>,
    pool: WorkerPool,
    audit: Arc<AuditLog>,
    failed: Arc<AtomicBool>,
    watch_shutdown: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
    collector: Option<JoinHandle<()>>,
}

impl RunningService {
    /// Turns event handling on or off without tearing down the watcher.
    pub fn set_enabled(&self, enabled: bool) {
        self.scanner.set_enabled(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.scanner.is_enabled()
    }

    /// Queues a file directly, bypassing the watcher.
    pub fn submit(&self, file: WatchedFile) -> std::result::Result<(), WorkerError> {
        self.pool.submit(file)
    }

    /// True once the audit log has become unwritable or the watcher died.
    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Stops watching immediately, lets queued and in-flight runs finish,
    /// then records the stop.
    pub fn stop(mut self) -> std::result::Result<(), LoggingError> {
        self.scanner.set_enabled(false);
        self.watch_shutdown.store(true, Ordering::SeqCst);

        if let Some(watcher) = self.watcher.take() {
            if watcher.join().is_err() {
                error!("Watcher thread panicked");
            }
        }

        self.pool.wait();

        if let Some(collector) = self.collector.take() {
            if collector.join().is_err() {
                error!("Result collector panicked");
            }
        }

        self.audit.append("Service stopped")?;
        info!("Service stopped");
        Ok(())
    }
}

fn spawn_watcher(
    scanner: Arc<DirectoryScanner>,
    submitter: crossbeam_channel::Sender<WatchedFile>,
    shutdown: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
) -> std::result::Result<JoinHandle<()>, WorkerError> {
    thread::Builder::new()
        .name("docmailer-watcher".to_string())
        .spawn(move || {
            let submit = |path| {
                if submitter.send(WatchedFile::new(path)).is_err() {
                    warn!("Worker pool is gone, dropping event");
                }
            };
            if let Err(e) = scanner.watch(submit, shutdown) {
                error!("Watcher stopped: {}", e);
                failed.store(true, Ordering::SeqCst);
            }
        })
        .map_err(|e| WorkerError::SpawnFailed(e.to_string()))
}

fn spawn_collector(
    results: crossbeam_channel::Receiver<JobResult>,
    failed: Arc<AtomicBool>,
) -> std::result::Result<JoinHandle<()>, WorkerError> {
    thread::Builder::new()
        .name("docmailer-results".to_string())
        .spawn(move || {
            // Ends once every worker has exited
            for result in results.iter() {
                if result.success {
                    info!(
                        "Job {} completed: {} -> {:?}",
                        result.job_id,
                        result.source_path.display(),
                        result.artifact_path
                    );
                } else if result.fatal {
                    error!(
                        "Job {} could not be recorded: {:?}",
                        result.job_id, result.error
                    );
                    failed.store(true, Ordering::SeqCst);
                } else {
                    warn!(
                        "Job {} failed: {} - {:?}",
                        result.job_id,
                        result.source_path.display(),
                        result.error
                    );
                }
            }
            debug!("Result collector shutting down");
        })
        .map_err(|e| WorkerError::SpawnFailed(e.to_string()))
}
