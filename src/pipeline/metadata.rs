//! Light, pattern-based metadata over `struct_text`.
//!
//! Nothing here is validated beyond the regex match: `31/02/2023` is reported
//! as a date. The values are hints for indexing and display, not ground truth.

use crate::output::DocumentMetadata;
use once_cell::sync::Lazy;
use regex::Regex;

/// `D/M/Y` (1–2 digit day and month, 2–4 digit year) or `Y-M-D`, `-` or `/`.
static RE_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[0-9]{1,2}[-/][0-9]{1,2}[-/][0-9]{2,4}\b|\b[0-9]{4}[-/][0-9]{1,2}[-/][0-9]{1,2}\b")
        .unwrap()
});

static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s<>"'`{}|\\^]+"#).unwrap());

pub fn extract_metadata(text: &str) -> DocumentMetadata {
    DocumentMetadata {
        title: text
            .split('\n')
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string),
        dates: find_all(&RE_DATE, text),
        emails: find_all(&RE_EMAIL, text),
        urls: find_all(&RE_URL, text),
        word_count: text.split_whitespace().count(),
        line_count: text.split('\n').count(),
    }
}

fn find_all(re: &Regex, text: &str) -> Vec<String> {
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}
