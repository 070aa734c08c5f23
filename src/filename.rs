//! Filename derivation and sanitization for downloaded media.

use url::Url;

/// Fallback name when a URL has no usable path segment.
const FALLBACK_FILENAME: &str = "download.bin";

/// Derives a filesystem-safe filename from the last path component of a URL.
///
/// Falls back to `download.bin` when the URL has no path segments or the
/// last segment is empty (e.g. a trailing slash).
#[must_use]
pub fn filename_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return FALLBACK_FILENAME.to_string();
    };

    let last_segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back().map(str::to_string))
        .unwrap_or_default();

    let sanitized = sanitize_filename(&last_segment);
    if sanitized.is_empty() || sanitized == "_" {
        FALLBACK_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Sanitizes a filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
