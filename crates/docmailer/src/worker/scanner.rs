use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glob::{MatchOptions, Pattern};
use log::{debug, error, info, warn};
use notify::{Config as NotifyConfig, PollWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer_opt, Config as DebouncerConfig, DebouncedEventKind};
use walkdir::WalkDir;

use crate::error::WorkerError;
use crate::worker::claims::ClaimRegistry;

/// Extensions written by the renderers; never treated as input.
const ARTIFACT_EXTENSIONS: [&str; 2] = ["xlsx", "pdf"];

const FILTER_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Watches one directory (top level only) for files matching a glob filter
/// and reports each physical file at most once.
pub struct DirectoryScanner {
    directory: PathBuf,
    filter: Pattern,
    poll_interval: Duration,
    debounce: Duration,
    ignored: Vec<PathBuf>,
    claims: ClaimRegistry,
    enabled: Arc<AtomicBool>,
}

impl DirectoryScanner {
    pub fn new<P: AsRef<Path>>(directory: P, filter: &str) -> Result<Self, WorkerError> {
        let pattern = Pattern::new(filter).map_err(|e| WorkerError::InvalidFilter {
            pattern: filter.to_string(),
            reason: e.to_string(),
        })?;

        let directory = directory.as_ref();
        Ok(Self {
            directory: directory
                .canonicalize()
                .unwrap_or_else(|_| directory.to_path_buf()),
            filter: pattern,
            poll_interval: Duration::from_secs(1),
            debounce: Duration::from_millis(500),
            ignored: Vec::new(),
            claims: ClaimRegistry::new(),
            enabled: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn with_intervals(mut self, poll_interval: Duration, debounce: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.debounce = debounce;
        self
    }

    /// Never report this path, even if it matches the filter.
    pub fn ignoring<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.ignored.push(normalize(path.as_ref()));
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn claims(&self) -> &ClaimRegistry {
        &self.claims
    }

    /// Shared switch; while off, events are dropped without claiming.
    pub fn enabled_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.enabled)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        let is_artifact = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| ARTIFACT_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)))
            .unwrap_or(false);
        if is_artifact {
            return false;
        }

        if !self.ignored.is_empty() {
            let normalized = normalize(path);
            if self.ignored.contains(&normalized) {
                return false;
            }
        }

        self.filter.matches_with(name, FILTER_OPTIONS)
    }

    /// Matching files currently in the directory.
    pub fn scan(&self) -> Result<Vec<PathBuf>, WorkerError> {
        let mut found = Vec::new();

        for entry in WalkDir::new(&self.directory).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(WorkerError::ScanFailed {
                        path: self.directory.clone(),
                        source: e,
                    });
                }
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.matches(entry.path()) {
                found.push(entry.path().to_path_buf());
            }
        }

        found.sort();
        debug!(
            "Scanned {} matching files in {}",
            found.len(),
            self.directory.display()
        );
        Ok(found)
    }

    /// Claims every matching file already present, so only files created
    /// from now on are reported. Returns the claimed paths.
    pub fn prime(&self) -> Result<Vec<PathBuf>, WorkerError> {
        let existing = self.scan()?;
        for path in &existing {
            self.claims.claim(&normalize(path));
        }
        if !existing.is_empty() {
            info!("{} pre-existing files marked as seen", existing.len());
        }
        Ok(existing)
    }

    /// Decides what to do with one debounced change. Returns the path when it
    /// should get a pipeline run.
    pub fn on_event(&self, path: &Path) -> Option<PathBuf> {
        if !self.matches(path) {
            return None;
        }

        let key = normalize(path);
        if !path.exists() {
            if self.claims.release(&key) {
                debug!("Released claim on removed file {}", path.display());
            }
            return None;
        }

        if !path.is_file() || !self.is_enabled() {
            return None;
        }

        if self.claims.claim(&key) {
            info!("New file detected: {}", path.display());
            Some(path.to_path_buf())
        } else {
            debug!("Ignoring repeated event for {}", path.display());
            None
        }
    }

    /// Blocks until `shutdown` is set, calling `callback` once per new file.
    pub fn watch<F>(&self, callback: F, shutdown: Arc<AtomicBool>) -> Result<(), WorkerError>
    where
        F: Fn(PathBuf),
    {
        // PollWatcher also works on network shares and container mounts
        let poll_config = NotifyConfig::default().with_poll_interval(self.poll_interval);

        let debouncer_config = DebouncerConfig::default()
            .with_timeout(self.debounce)
            .with_notify_config(poll_config);

        let (tx, rx) = std::sync::mpsc::channel();

        let mut debouncer = new_debouncer_opt::<_, PollWatcher>(debouncer_config, tx)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        debouncer
            .watcher()
            .watch(&self.directory, RecursiveMode::NonRecursive)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        info!("Watching directory: {}", self.directory.display());

        // The poll watcher's baseline was taken just now; files created since
        // prime() are already in it and would never be reported
        for path in self.scan()? {
            if let Some(path) = self.on_event(&path) {
                callback(path);
            }
        }

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Watcher shutting down...");
                break;
            }

            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(events)) => {
                    for event in events {
                        if matches!(
                            event.kind,
                            DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
                        ) {
                            if let Some(path) = self.on_event(&event.path) {
                                callback(path);
                            }
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!("Watch error: {:?}", e);
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    continue;
                }
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    error!("Watch channel disconnected");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Canonical parent joined with the file name, so the same file compares
/// equal however the path was spelled. Falls back to the path as given.
fn normalize(path: &Path) -> PathBuf {
    match (
        path.parent().and_then(|p| p.canonicalize().ok()),
        path.file_name(),
    ) {
        (Some(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    fn scanner(dir: &Path) -> DirectoryScanner {
        DirectoryScanner::new(dir, "*.txt").unwrap()
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let tmp = TempDir::new().unwrap();
        let result = DirectoryScanner::new(tmp.path(), "[unclosed");
        assert!(matches!(result, Err(WorkerError::InvalidFilter { .. })));
    }

    #[test]
    fn test_matches_filter_case_insensitively() {
        let tmp = TempDir::new().unwrap();
        let scanner = scanner(tmp.path());

        assert!(scanner.matches(&tmp.path().join("orders.txt")));
        assert!(scanner.matches(&tmp.path().join("ORDERS.TXT")));
        assert!(!scanner.matches(&tmp.path().join("orders.csv")));
    }

    #[test]
    fn test_artifacts_never_match() {
        let tmp = TempDir::new().unwrap();
        let scanner = DirectoryScanner::new(tmp.path(), "*").unwrap();

        assert!(scanner.matches(&tmp.path().join("orders.txt")));
        assert!(!scanner.matches(&tmp.path().join("orders.xlsx")));
        assert!(!scanner.matches(&tmp.path().join("INV001.PDF")));
    }

    #[test]
    fn test_ignored_path_never_matches() {
        let tmp = TempDir::new().unwrap();
        let log_path = tmp.path().join("service_log.txt");
        let scanner = scanner(tmp.path()).ignoring(&log_path);

        assert!(!scanner.matches(&log_path));
        assert!(scanner.matches(&tmp.path().join("other.txt")));
    }

    #[test]
    fn test_scan_top_level_only() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"a;b").unwrap();
        std::fs::write(tmp.path().join("b.txt"), b"c;d").unwrap();
        std::fs::write(tmp.path().join("a.xlsx"), b"PK").unwrap();
        std::fs::write(tmp.path().join("notes.md"), b"#").unwrap();
        let nested = tmp.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("deep.txt"), b"x").unwrap();

        let found = scanner(tmp.path()).scan().unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_scan_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let result = scanner(&tmp.path().join("absent")).scan();
        assert!(matches!(result, Err(WorkerError::ScanFailed { .. })));
    }

    #[test]
    fn test_prime_marks_existing_files_as_seen() {
        let tmp = TempDir::new().unwrap();
        let existing = tmp.path().join("old.txt");
        std::fs::write(&existing, b"a;b").unwrap();

        let scanner = scanner(tmp.path());
        assert_eq!(scanner.prime().unwrap().len(), 1);

        // A later change to the old file is not a creation
        assert_eq!(scanner.on_event(&existing), None);
    }

    #[test]
    fn test_on_event_reports_each_file_once() {
        let tmp = TempDir::new().unwrap();
        let scanner = scanner(tmp.path());
        let path = tmp.path().join("new.txt");
        std::fs::write(&path, b"a;b").unwrap();

        assert_eq!(scanner.on_event(&path), Some(path.clone()));
        assert_eq!(scanner.on_event(&path), None);
        assert_eq!(scanner.on_event(&path), None);
    }

    #[test]
    fn test_on_event_after_delete_allows_recreate() {
        let tmp = TempDir::new().unwrap();
        let scanner = scanner(tmp.path());
        let path = tmp.path().join("cycle.txt");

        std::fs::write(&path, b"one").unwrap();
        assert!(scanner.on_event(&path).is_some());

        std::fs::remove_file(&path).unwrap();
        assert_eq!(scanner.on_event(&path), None);
        assert!(scanner.claims().is_empty());

        std::fs::write(&path, b"two").unwrap();
        assert!(scanner.on_event(&path).is_some());
    }

    #[test]
    fn test_on_event_ignored_while_disabled() {
        let tmp = TempDir::new().unwrap();
        let scanner = scanner(tmp.path());
        let path = tmp.path().join("late.txt");
        std::fs::write(&path, b"a").unwrap();

        scanner.set_enabled(false);
        assert_eq!(scanner.on_event(&path), None);
        assert!(!scanner.claims().is_claimed(&normalize(&path)));

        // Re-enabling picks the file up on its next event
        scanner.set_enabled(true);
        assert!(scanner.on_event(&path).is_some());
    }

    #[test]
    fn test_on_event_skips_directories() {
        let tmp = TempDir::new().unwrap();
        let scanner = DirectoryScanner::new(tmp.path(), "*").unwrap();
        let dir = tmp.path().join("folder.txt");
        std::fs::create_dir(&dir).unwrap();

        assert_eq!(scanner.on_event(&dir), None);
    }

    #[test]
    fn test_watch_reports_new_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("before.txt"), b"old").unwrap();

        let scanner = Arc::new(
            scanner(tmp.path())
                .with_intervals(Duration::from_millis(50), Duration::from_millis(100)),
        );
        scanner.prime().unwrap();

        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::unbounded();

        let handle = {
            let scanner = Arc::clone(&scanner);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                scanner
                    .watch(
                        move |path| {
                            let _ = tx.send(path);
                        },
                        shutdown,
                    )
                    .unwrap();
            })
        };

        // Give the poll watcher its initial scan
        thread::sleep(Duration::from_millis(300));
        let created = tmp.path().join("after.txt");
        std::fs::write(&created, b"a;b").unwrap();

        let reported = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(reported.file_name(), created.file_name());

        // Nothing else: the pre-existing file stays quiet
        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());

        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }

    #[test]
    fn test_watch_reports_file_created_before_registration() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("before.txt"), b"old").unwrap();

        let scanner = Arc::new(
            scanner(tmp.path())
                .with_intervals(Duration::from_millis(50), Duration::from_millis(50)),
        );
        scanner.prime().unwrap();

        // Lands after prime() but before the watcher is registered
        let late = tmp.path().join("race.txt");
        std::fs::write(&late, b"a;b").unwrap();

        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::unbounded();

        let handle = {
            let scanner = Arc::clone(&scanner);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                scanner
                    .watch(
                        move |path| {
                            let _ = tx.send(path);
                        },
                        shutdown,
                    )
                    .unwrap();
            })
        };

        let reported = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(reported.file_name(), late.file_name());
        assert!(scanner.claims().is_claimed(&normalize(&late)));

        // Reported once, and the primed file stays quiet
        assert!(rx.recv_timeout(Duration::from_millis(500)).is_err());

        shutdown.store(true, Ordering::Relaxed);
        handle.join().unwrap();
    }
}
