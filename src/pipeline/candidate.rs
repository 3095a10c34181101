//! Recover a JSON payload from model output wrapped in prose.
//!
//! Models asked for "JSON only" still answer with `Sure, here it is: {...}`
//! or append a closing remark. The search here starts at the first `{` or
//! `[` and tries end positions from the end of the text backwards, returning
//! the longest substring that a real JSON parser accepts. Parse success is
//! the only acceptance test, so nested braces and braces inside strings need
//! no special handling.
//!
//! Worst case is one parse attempt per character after the opening bracket,
//! which is fine for prompt-bounded outputs of a few kilobytes.

use serde_json::Value;

/// The longest parseable JSON substring starting at the first `{` or `[`,
/// without trailing whitespace.
pub fn extract_json_candidate(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let tail = &text[start..];

    // End offsets on char boundaries, longest first; the opening bracket
    // alone can never parse, so stop just past it.
    let ends = tail
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .rev()
        .take_while(|&end| end > 1);

    for end in ends {
        let candidate = &tail[..end];
        if serde_json::from_str::<Value>(candidate).is_ok() {
            return Some(candidate.trim_end());
        }
    }
    None
}
