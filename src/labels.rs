use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Merge key for a display label: diacritics stripped, case folded, trimmed,
/// inner whitespace collapsed.
pub fn normalize_label(label: &str) -> String {
    let stripped: String = label.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
