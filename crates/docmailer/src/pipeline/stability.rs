//! Write-completion check for freshly detected files.

use std::path::Path;
use std::thread;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sample {
    len: u64,
    modified: Option<SystemTime>,
}

fn sample(path: &Path) -> std::io::Result<Sample> {
    let metadata = std::fs::metadata(path)?;
    Ok(Sample {
        len: metadata.len(),
        modified: metadata.modified().ok(),
    })
}

/// Polls `path` every `interval` until two consecutive samples agree on a
/// non-zero size and modification time, at most `checks` times.
///
/// Returns `Ok(false)` when the checks run out first. An I/O error (the file
/// vanished, permissions) ends the wait immediately.
pub fn wait_until_stable(path: &Path, interval: Duration, checks: u32) -> std::io::Result<bool> {
    let mut previous = sample(path)?;

    for _ in 0..checks {
        thread::sleep(interval);
        let current = sample(path)?;
        if current == previous && current.len > 0 {
            return Ok(true);
        }
        previous = current;
    }

    Ok(false)
}
