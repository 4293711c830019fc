//! Utility functions and helpers.

pub mod http;

use url::Url;

/// Reduce a raw record key to its canonical comparable form: digits only.
///
/// Returns an empty string when the input carries no digits. Used identically
/// by the accumulator and the diff engine so identity comparisons always
/// agree.
pub fn canonical_identity(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalize extracted cell text: strip NBSP/zero-width characters,
/// collapse runs of whitespace, trim.
pub fn normalize_text(raw: &str) -> String {
    let cleaned = raw.replace(['\u{a0}', '\u{200b}'], " ");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}
