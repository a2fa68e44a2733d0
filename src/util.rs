//! Small helpers shared across the codebase.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Safe for multi-byte UTF-8 (emoji, CJK, accented characters): truncation
/// happens on character boundaries, never byte indices.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Return the greatest valid UTF-8 char boundary at or below `index`.
///
/// Mirrors `str::floor_char_boundary` while remaining compatible with stable
/// toolchains where that API is not available. Used when capping tool and
/// sandbox output by byte length.
pub fn floor_utf8_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }

    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Cap `text` at `max_bytes`, appending a truncation marker when cut.
pub fn cap_output_bytes(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let cut = floor_utf8_char_boundary(text, max_bytes);
    format!("{}\n...(truncated)", &text[..cut])
}
