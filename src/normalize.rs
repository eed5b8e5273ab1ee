//! Caption text normalization.
//!
//! Captions come in authored with mixed keyboard layouts (full-width
//! punctuation, stray spaces, newlines). Everything funnels through
//! [`normalize`] so that sidecar files, the tag index and the editor all agree
//! on one canonical comma-joined form.

use std::collections::HashSet;

/// Normalize raw caption text into the canonical comma-joined tag string.
///
/// Full-width and typographic punctuation is mapped to ASCII (comma-like
/// characters, including `/` and `\`, become `,`), every space and newline is
/// removed (tags carry no internal spaces), and the resulting tag list is
/// de-duplicated preserving first occurrence.
///
/// Idempotent: `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut mapped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '，' | '、' | '/' | '\\' => mapped.push(','),
            '（' => mapped.push('('),
            '）' => mapped.push(')'),
            '“' | '”' => mapped.push('"'),
            '‘' | '’' => mapped.push('\''),
            '；' => mapped.push(';'),
            '：' => mapped.push(':'),
            // All spaces and newlines are dropped, not just trimmed.
            ' ' | '\n' | '\r' => {}
            _ => mapped.push(ch),
        }
    }

    let mut seen = HashSet::new();
    let tags: Vec<&str> = mapped
        .trim()
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty() && seen.insert(tag.to_string()))
        .collect();

    tags.join(",")
}

/// Normalize and split into the ordered, de-duplicated tag list.
pub fn split_tags(text: &str) -> Vec<String> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return Vec::new();
    }
    normalized.split(',').map(str::to_string).collect()
}
