use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Paths that already have (or had) a pipeline run.
///
/// The first claim of a path wins; every later claim is refused until the
/// path is released.
#[derive(Debug, Default)]
pub struct ClaimRegistry {
    claimed: Mutex<HashSet<PathBuf>>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if this call claimed the path.
    pub fn claim(&self, path: &Path) -> bool {
        self.lock().insert(path.to_path_buf())
    }

    /// Returns true if the path was claimed.
    pub fn release(&self, path: &Path) -> bool {
        self.lock().remove(path)
    }

    pub fn is_claimed(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.claimed.lock().unwrap_or_else(|p| p.into_inner())
    }
}
