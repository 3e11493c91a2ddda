//! Helpers for keeping uploaded content out of logs and span attributes.
//!
//! Uploads come from end users, so spans carry file names only and log
//! lines carry at most a short preview of extracted text.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// First `max_chars` characters of `text` on a single line, with an
/// ellipsis when truncated.
pub fn text_preview(text: &str, max_chars: usize) -> String {
    let flattened: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    let flattened = flattened.trim();

    match flattened.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flattened[..cut]),
        None => flattened.to_string(),
    }
}
