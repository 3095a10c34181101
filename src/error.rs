//! Error types for the report2json library.
//!
//! Every failure the pipeline can produce is a [`ReportError`]. Variants are
//! grouped by the *kind* of failure ([`ErrorKind`]) so a boundary layer (HTTP
//! handler, CLI, job runner) can decide how to surface them without matching
//! every variant:
//!
//! | Kind | Typical cause | [`FailureClass`] |
//! |------|---------------|------------------|
//! | `Recognition` | OCR engine failed or timed out | `Upstream` |
//! | `ModelCall` | generative model transport failure or timeout | `Upstream` |
//! | `NoJsonCandidate` | model answered with no parseable JSON | `Upstream` |
//! | `SchemaValidation` | JSON parsed but does not fit the ReportCard shape | `Upstream` |
//! | `Input` | nothing to normalise, unsupported file, bad config | `BadInput` |
//! | `Internal` | task panicked, runtime could not be created | `Internal` |
//!
//! [`PipelineError`] wraps a `ReportError` together with the [`Stage`] the
//! orchestrator was trying to reach when it failed.

use crate::orchestrator::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the report2json library.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Recognition errors ────────────────────────────────────────────────
    /// The OCR collaborator failed on a page.
    #[error("Recognition failed on page {page}: {detail}")]
    Recognition { page: usize, detail: String },

    /// The OCR collaborator did not answer within the configured budget.
    #[error("Recognition of page {page} timed out after {secs}s")]
    RecognitionTimeout { page: usize, secs: u64 },

    /// The page could not be rasterised or decoded before recognition.
    #[error("Could not rasterise page {page}: {detail}")]
    Rasterisation { page: usize, detail: String },

    /// Could not bind to a pdfium library, so PDFs cannot be rasterised.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or its directory) to use an existing copy,\n\
or install pdfium where the system loader can find it.\n"
    )]
    PdfiumBinding(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The generative model call failed (transport, API or provider error).
    #[error("Model call failed: {detail}")]
    ModelCall { detail: String },

    /// The generative model did not answer within the configured budget.
    #[error("Model call timed out after {secs}s")]
    ModelTimeout { secs: u64 },

    /// The configured provider could not be constructed (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Model output contained no parseable JSON object or array anywhere.
    #[error("Model output is not valid JSON and no JSON candidate was found")]
    NoJsonCandidate,

    /// Parsed JSON does not conform to the ReportCard schema.
    #[error("Schema validation failed at '{path}': {reason}")]
    SchemaValidation { path: String, reason: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Neither text nor structured data was supplied, or the input is unusable.
    #[error("Invalid input: {0}")]
    Input(String),

    /// The uploaded document is of a kind we cannot route to OCR.
    #[error("Unsupported file type '{extension}' for '{filename}'")]
    UnsupportedFileType { filename: String, extension: String },

    /// Local input file does not exist or is not readable.
    #[error("Input file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// URL input could not be downloaded.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`ReportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Recognition,
    ModelCall,
    NoJsonCandidate,
    SchemaValidation,
    Input,
    Internal,
}

/// How a boundary layer should present a failure to its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// The caller sent something unusable (HTTP 400-ish).
    BadInput,
    /// A collaborator (OCR engine, model) misbehaved (HTTP 502-ish).
    Upstream,
    /// Our own fault (HTTP 500-ish).
    Internal,
}

impl ReportError {
    /// The kind of this error, stable across variants.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::Recognition { .. }
            | ReportError::RecognitionTimeout { .. }
            | ReportError::Rasterisation { .. }
            | ReportError::PdfiumBinding(_) => ErrorKind::Recognition,
            ReportError::ModelCall { .. }
            | ReportError::ModelTimeout { .. }
            | ReportError::ProviderNotConfigured { .. } => ErrorKind::ModelCall,
            ReportError::NoJsonCandidate => ErrorKind::NoJsonCandidate,
            ReportError::SchemaValidation { .. } => ErrorKind::SchemaValidation,
            ReportError::Input(_)
            | ReportError::UnsupportedFileType { .. }
            | ReportError::FileNotFound { .. }
            | ReportError::DownloadFailed { .. }
            | ReportError::InvalidConfig(_) => ErrorKind::Input,
            ReportError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for building a [`ReportError::SchemaValidation`].
    pub fn schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ReportError::SchemaValidation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl ErrorKind {
    pub fn failure_class(self) -> FailureClass {
        match self {
            ErrorKind::Input => FailureClass::BadInput,
            ErrorKind::Recognition
            | ErrorKind::ModelCall
            | ErrorKind::NoJsonCandidate
            | ErrorKind::SchemaValidation => FailureClass::Upstream,
            ErrorKind::Internal => FailureClass::Internal,
        }
    }
}

/// A [`ReportError`] annotated with the pipeline stage that could not be reached.
///
/// No partial record travels with it: a failed run produces only this value.
#[derive(Debug, Error)]
#[error("pipeline failed before reaching {stage}: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: ReportError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: ReportError) -> Self {
        Self { stage, source }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}
