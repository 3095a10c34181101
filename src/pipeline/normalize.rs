//! Text normalisation: turn noisy recogniser output into [`CleanedText`].
//!
//! Recognisers (and the services relaying their output) sometimes hand us
//! *escaped* control sequences, i.e. a literal backslash followed by `n`,
//! instead of real newlines. These are rewritten first, in a fixed order so
//! that an escaped CRLF becomes one newline rather than two:
//!
//! 1. `\r\n` → newline
//! 2. `\n`   → newline
//! 3. `\r`   → newline
//! 4. `\t`   → space
//!
//! Two views are then derived from the result:
//!
//! * `struct_text` keeps line structure. Runs of two or more newlines become
//!   exactly one blank line and trailing spaces/tabs are stripped per line.
//!   Single newlines (intra-paragraph breaks) survive.
//! * `raw_text` collapses every whitespace run to one space and trims, so it
//!   never contains a newline.

use crate::output::CleanedText;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_NEWLINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").unwrap());
static RE_TRAILING_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)[ \t]+$").unwrap());
static RE_WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Normalise recogniser output. Never fails; `None` or `""` yields empty views.
pub fn clean_text(raw: Option<&str>) -> CleanedText {
    let Some(raw) = raw else {
        return CleanedText::default();
    };

    let original = unescape_control_sequences(raw);

    let struct_text = RE_NEWLINE_RUNS.replace_all(&original, "\n\n");
    let struct_text = RE_TRAILING_BLANKS.replace_all(&struct_text, "").into_owned();

    let raw_text = RE_WHITESPACE_RUNS
        .replace_all(&original, " ")
        .trim()
        .to_string();

    CleanedText {
        raw_text,
        struct_text,
        original,
    }
}

fn unescape_control_sequences(input: &str) -> String {
    input
        .replace("\\r\\n", "\n")
        .replace("\\n", "\n")
        .replace("\\r", "\n")
        .replace("\\t", " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_and_empty_yield_empty_views() {
        assert_eq!(clean_text(None), CleanedText::default());
        assert_eq!(clean_text(Some("")), CleanedText::default());
    }

    #[test]
    fn escaped_crlf_is_a_single_newline() {
        let out = clean_text(Some(r"a\r\nb"));
        assert_eq!(out.original, "a\nb");
    }

    #[test]
    fn escaped_sequences_become_whitespace() {
        let out = clean_text(Some(r"Name:\tJane\nGrade\r5"));
        assert_eq!(out.original, "Name: Jane\nGrade\n5");
    }

    #[test]
    fn struct_text_collapses_newline_runs_only() {
        let out = clean_text(Some("Title\n\n\n\nline one\nline two   \n"));
        assert_eq!(out.struct_text, "Title\n\nline one\nline two\n");
    }

    #[test]
    fn raw_text_is_single_line() {
        let out = clean_text(Some("  MATH:\n\n  Q1: 80 \t\n Q2: 90\r\n"));
        assert_eq!(out.raw_text, "MATH: Q1: 80 Q2: 90");
        assert!(!out.raw_text.contains('\n'));
    }

    #[test]
    fn raw_text_never_contains_newline() {
        let samples = [
            "\n",
            "a\r\nb",
            r"a\nb\n\n\nc",
            "\u{2028}x\u{2029}y\u{0085}",
            "tab\tsep\u{000B}vt\u{000C}ff",
        ];
        for s in samples {
            let out = clean_text(Some(s));
            assert!(!out.raw_text.contains('\n'), "newline survived in {s:?}");
        }
    }
}
