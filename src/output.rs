//! Value types flowing between pipeline stages.
//!
//! Every stage builds a fresh value from its input and never mutates what an
//! earlier stage produced, so all of these are plain owned data.

use crate::pipeline::confidence::ConfidenceReport;
use crate::report::ReportCard;
use serde::{Deserialize, Serialize};

/// Text and per-token confidences for one recognised page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizedPage {
    pub text: String,
    /// Token confidences in `[0, 100]`; negative values mark "no text" regions.
    pub token_confidences: Vec<f64>,
}

impl RecognizedPage {
    pub fn new(text: impl Into<String>, token_confidences: Vec<f64>) -> Self {
        Self {
            text: text.into(),
            token_confidences,
        }
    }
}

/// All pages of a document, joined in page order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub joined_text: String,
    pub average_confidence: Option<f64>,
}

/// The three parallel views produced by the text normaliser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedText {
    /// Single-line view: every whitespace run collapsed to one space.
    pub raw_text: String,
    /// Paragraph-preserving view used for structure and metadata.
    pub struct_text: String,
    /// Input with escaped control sequences turned into real whitespace.
    pub original: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStructure {
    pub sections: Vec<String>,
    pub paragraphs: Vec<String>,
}

/// Best-effort metadata found by pattern matching. False positives are expected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub dates: Vec<String>,
    pub emails: Vec<String>,
    pub urls: Vec<String>,
    pub word_count: usize,
    pub line_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// Result of the extraction half of the pipeline for one document.
///
/// Built once, never mutated, serialised at the system boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionEnvelope {
    pub status: EnvelopeStatus,
    pub filename: String,
    pub file_type: String,
    /// The structure-preserving text (`CleanedText::struct_text`).
    pub text: String,
    pub raw_text: String,
    pub metadata: DocumentMetadata,
    pub structure: DocumentStructure,
    pub confidence: Option<ConfidenceReport>,
    pub error: Option<String>,
}

impl ExtractionEnvelope {
    pub fn success(
        filename: impl Into<String>,
        file_type: impl Into<String>,
        cleaned: CleanedText,
        metadata: DocumentMetadata,
        structure: DocumentStructure,
        confidence: ConfidenceReport,
    ) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            filename: filename.into(),
            file_type: file_type.into(),
            text: cleaned.struct_text,
            raw_text: cleaned.raw_text,
            metadata,
            structure,
            confidence: Some(confidence),
            error: None,
        }
    }

    /// An envelope reporting that extraction failed for this document.
    pub fn failed(
        filename: impl Into<String>,
        file_type: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            status: EnvelopeStatus::Error,
            filename: filename.into(),
            file_type: file_type.into(),
            text: String::new(),
            raw_text: String::new(),
            metadata: DocumentMetadata::default(),
            structure: DocumentStructure::default(),
            confidence: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }
}

/// Outcome of a full document-to-record run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub envelope: ExtractionEnvelope,
    pub report_card: ReportCard,
}
