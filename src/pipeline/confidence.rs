//! Document-level recognition confidence.
//!
//! The recogniser emits one confidence per detected token, using negative
//! values for regions where it found no text. The document score is the
//! plain mean of every non-negative, finite value across *all* pages taken
//! together, so a page with many tokens weighs more than a sparse one. It is
//! not a mean of per-page means.
//!
//! When no usable score exists at all (e.g. a vision model did the reading),
//! the report falls back to a qualitative label based on how much text came
//! out: more than 100 characters of `raw_text` is `high`, otherwise `low`.

use crate::output::{RecognitionResult, RecognizedPage};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// `raw_text` length (in characters) above which an unscored document is `high`.
pub const HIGH_CONFIDENCE_MIN_CHARS: usize = 100;

/// Mean of all usable token confidences across pages, or `None` if there are none.
pub fn average_confidence<'a, I>(pages: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a RecognizedPage>,
{
    let (sum, count) = pages
        .into_iter()
        .flat_map(|p| p.token_confidences.iter().copied())
        .filter(|c| c.is_finite() && *c >= 0.0)
        .fold((0.0_f64, 0usize), |(s, n), c| (s + c, n + 1));

    (count > 0).then(|| sum / count as f64)
}

/// Join pages in order, separated by a blank line, and aggregate confidence.
pub fn combine_pages(pages: &[RecognizedPage]) -> RecognitionResult {
    let joined_text = pages
        .iter()
        .map(|p| p.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    RecognitionResult {
        joined_text,
        average_confidence: average_confidence(pages),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLabel {
    High,
    Low,
}

/// Confidence as reported in the extraction envelope.
///
/// Serialises as a string: the score with one decimal (`"87.3"`) or the label
/// (`"high"` / `"low"`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfidenceReport {
    Score(f64),
    Label(ConfidenceLabel),
}

impl ConfidenceReport {
    pub fn from_parts(average: Option<f64>, raw_text: &str) -> Self {
        match average {
            Some(score) => ConfidenceReport::Score(score),
            None if raw_text.chars().count() > HIGH_CONFIDENCE_MIN_CHARS => {
                ConfidenceReport::Label(ConfidenceLabel::High)
            }
            None => ConfidenceReport::Label(ConfidenceLabel::Low),
        }
    }
}

impl fmt::Display for ConfidenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceReport::Score(s) => write!(f, "{s:.1}"),
            ConfidenceReport::Label(ConfidenceLabel::High) => f.write_str("high"),
            ConfidenceReport::Label(ConfidenceLabel::Low) => f.write_str("low"),
        }
    }
}

impl Serialize for ConfidenceReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConfidenceReport {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "high" => Ok(ConfidenceReport::Label(ConfidenceLabel::High)),
            "low" => Ok(ConfidenceReport::Label(ConfidenceLabel::Low)),
            other => other
                .parse::<f64>()
                .map(ConfidenceReport::Score)
                .map_err(|_| serde::de::Error::custom(format!("invalid confidence '{other}'"))),
        }
    }
}
