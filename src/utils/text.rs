// src/utils/text.rs

//! Text normalization helpers shared by the fragment and extraction layers.

use unicode_segmentation::UnicodeSegmentation;

/// Collapse all runs of whitespace into single spaces and trim the ends.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate a string to at most `max` grapheme clusters, appending an
/// ellipsis when anything was cut. Grapheme-aware so multi-byte text is
/// never split mid-character.
pub fn truncate_graphemes(s: &str, max: usize) -> String {
    let mut iter = s.grapheme_indices(true);
    match iter.nth(max) {
        Some((byte_idx, _)) => {
            let mut out = s[..byte_idx].to_string();
            out.push('…');
            out
        }
        None => s.to_string(),
    }
}

/// Case-insensitive containment check against a phrase table. Returns the
/// index of the first phrase found in `line`, if any.
pub fn find_phrase(line: &str, phrases: &[String]) -> Option<usize> {
    let lower = line.to_lowercase();
    phrases
        .iter()
        .position(|p| !p.is_empty() && lower.contains(&p.to_lowercase()))
}

/// Whether `line` contains any phrase from the table, case-insensitively.
pub fn contains_phrase(line: &str, phrases: &[String]) -> bool {
    find_phrase(line, phrases).is_some()
}
