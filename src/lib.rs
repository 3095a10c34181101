//! # report2json
//!
//! Turn scanned or photographed report cards into validated, schema-conformant
//! JSON records.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / image
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Render     rasterise pages (pdfium / image, spawn_blocking)
//!  ├─ 3. Recognise  OCR collaborator per page, concurrent, page order kept
//!  ├─ 4. Normalise  escape repair, struct_text + raw_text, confidence
//!  ├─ 5. Structure  sections / paragraphs, metadata
//!  │      └─▶ ExtractionEnvelope
//!  ├─ 6. Prompt     schema template + input text + meta line
//!  ├─ 7. Model      generative model call (timeout bounded)
//!  ├─ 8. Candidate  longest parseable JSON in the answer
//!  └─ 9. Validate   typed ReportCard with field-path errors
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use report2json::{load_document, Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let pipeline = Pipeline::from_config(PipelineConfig::default())?;
//!     let doc = load_document("report_card.pdf", 120).await?;
//!     let processed = pipeline.process(&doc).await?;
//!     println!("{}", serde_json::to_string_pretty(&processed.report_card)?);
//!     Ok(())
//! }
//! ```
//!
//! Both collaborators are traits ([`Recognizer`], [`TextModel`]), so tests and
//! alternative OCR engines plug in through [`Pipeline::new`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `report2json` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{ErrorKind, FailureClass, PipelineError, ReportError};
pub use orchestrator::{build_envelope, NormalizeInput, Pipeline, Stage};
pub use output::{
    CleanedText, DocumentMetadata, DocumentStructure, EnvelopeStatus, ExtractionEnvelope,
    ProcessedDocument, RecognitionResult, RecognizedPage,
};
pub use pipeline::confidence::{ConfidenceLabel, ConfidenceReport};
pub use pipeline::input::{load_document, FileKind, SourceDocument};
pub use pipeline::llm::{LlmTextModel, RetryingModel, TextModel};
pub use pipeline::ocr::{Recognizer, VisionRecognizer};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use prompts::{PromptInput, PromptTemplate};
pub use report::{Attendance, BehaviorNote, ReportCard, StudentInfo, SubjectGrade};
pub use stream::{extract_batch, extract_batch_stream, process_batch_stream};
