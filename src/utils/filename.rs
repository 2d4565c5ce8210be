// src/utils/filename.rs

//! Request path to bare file name.

/// Longest file name we hand to the filesystem, in bytes.
const MAX_NAME_BYTES: usize = 255;

/// Last segment of a URL path, with characters that are unsafe in a file
/// name removed.
///
/// Returns an empty string when nothing usable is left; callers treat that
/// as "not found".
pub fn sanitize_request_path(path: &str) -> String {
    let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    sanitize_filename(last)
}

/// Strip separators, control characters and reserved names from `input`.
pub fn sanitize_filename(input: &str) -> String {
    let cleaned: String = input.chars().filter(|c| !is_forbidden(*c)).collect();

    if cleaned == "." || cleaned == ".." || is_reserved_windows_name(&cleaned) {
        return String::new();
    }

    let trimmed = cleaned.trim_end_matches(['.', ' ']);
    truncate_bytes(trimmed, MAX_NAME_BYTES).to_string()
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}' | '\u{80}'..='\u{9F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM0", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6",
        "COM7", "COM8", "COM9", "LPT0", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7",
        "LPT8", "LPT9",
    ];
    let stem = name.split('.').next().unwrap_or_default();
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(stem))
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
