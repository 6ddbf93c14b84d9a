//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Diagnostic traces are safe to share: no directory layout and no full mail
//! addresses end up in spans. The audit log is not affected by these helpers.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Masks the local part of a mail address.
///
/// - `jane.doe@example.com` → `j***@example.com`
/// - `Jane <jane@example.com>` → `j***@example.com`
/// - `not-an-address` → `***`
pub fn redact_address(address: &str) -> String {
    let bare = match (address.rfind('<'), address.rfind('>')) {
        (Some(start), Some(end)) if start < end => &address[start + 1..end],
        _ => address,
    };

    match bare.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            let first = local.chars().next().unwrap_or('*');
            format!("{}***@{}", first, domain)
        }
        _ => "***".to_string(),
    }
}
