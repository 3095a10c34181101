//! The document-to-record state machine.
//!
//! ```text
//! RECEIVED ─▶ RECOGNIZED ─▶ NORMALIZED ─▶ STRUCTURED ─▶ PROMPTED
//!     ─▶ MODEL_CALLED ─▶ CANDIDATE_FOUND ─▶ VALIDATED ─▶ DONE
//! ```
//!
//! Every transition is one call on the previous stage's output. A failure
//! stops the run and is reported as a [`PipelineError`] naming the stage that
//! could not be reached; no partial record is returned.
//!
//! [`Pipeline::extract`] covers the first half (document → envelope),
//! [`Pipeline::normalize`] the second (text or fields → record) and
//! [`Pipeline::process`] chains both, feeding the envelope's `raw_text` to the
//! model with `source = "ocr"` and `raw_format` set to the file type (e.g.
//! `".pdf"`). These tags name the recogniser and the upload kind rather than
//! the producing service and a format field from extraction metadata, which
//! this crate does not carry.
//!
//! Text that is empty or whitespace-only counts as missing input, so a blank
//! scan fails at `PROMPTED` instead of reaching the model.
//!
//! A `Pipeline` holds its collaborators behind `Arc`s and no mutable state,
//! so clones are cheap and independent runs can proceed concurrently.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, ReportError};
use crate::output::{ExtractionEnvelope, ProcessedDocument, RecognizedPage};
use crate::pipeline::confidence::{combine_pages, ConfidenceReport};
use crate::pipeline::input::SourceDocument;
use crate::pipeline::llm::{resolve_provider, translate_to_english, LlmTextModel, TextModel};
use crate::pipeline::metadata::extract_metadata;
use crate::pipeline::normalize::clean_text;
use crate::pipeline::ocr::{recognize_pages, Recognizer, VisionRecognizer};
use crate::pipeline::render::{render_document, RenderOptions};
use crate::pipeline::structure::structure_text;
use crate::pipeline::validate::{parse_payload, validate_report_card};
use crate::prompts::{PromptInput, PromptTemplate};
use crate::report::ReportCard;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Pipeline stages, in the order a document passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Received,
    Recognized,
    Normalized,
    Structured,
    Prompted,
    ModelCalled,
    CandidateFound,
    Validated,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "RECEIVED",
            Stage::Recognized => "RECOGNIZED",
            Stage::Normalized => "NORMALIZED",
            Stage::Structured => "STRUCTURED",
            Stage::Prompted => "PROMPTED",
            Stage::ModelCalled => "MODEL_CALLED",
            Stage::CandidateFound => "CANDIDATE_FOUND",
            Stage::Validated => "VALIDATED",
            Stage::Done => "DONE",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to normalise into a [`ReportCard`].
///
/// At least one of `text` (non-blank) or `structured` must be present; when
/// both are, `text` wins. `source` and `raw_format` default to the pipeline config.
#[derive(Debug, Clone, Default)]
pub struct NormalizeInput {
    pub text: Option<String>,
    pub structured: Option<Map<String, Value>>,
    pub source: Option<String>,
    pub raw_format: Option<String>,
}

impl NormalizeInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn structured(fields: Map<String, Value>) -> Self {
        Self {
            structured: Some(fields),
            ..Default::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_raw_format(mut self, raw_format: impl Into<String>) -> Self {
        self.raw_format = Some(raw_format.into());
        self
    }
}

/// Build the extraction envelope for already-recognised pages.
///
/// Pure: joins pages in order, normalises, structures, extracts metadata and
/// reports confidence (score, or `high`/`low` when no page had scores).
pub fn build_envelope(filename: &str, file_type: &str, pages: &[RecognizedPage]) -> ExtractionEnvelope {
    let recognition = combine_pages(pages);
    let cleaned = clean_text(Some(&recognition.joined_text));
    let structure = structure_text(&cleaned.struct_text);
    let metadata = extract_metadata(&cleaned.struct_text);
    let confidence = ConfidenceReport::from_parts(recognition.average_confidence, &cleaned.raw_text);
    ExtractionEnvelope::success(filename, file_type, cleaned, metadata, structure, confidence)
}

/// Extraction pipeline bound to an OCR collaborator and a text model.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    recognizer: Arc<dyn Recognizer>,
    model: Arc<dyn TextModel>,
    template: Arc<PromptTemplate>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("model", &self.model.name())
            .finish()
    }
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators.
    ///
    /// The prompt template is resolved once here (config path, then
    /// environment, then built-in).
    pub fn new(config: PipelineConfig, recognizer: Arc<dyn Recognizer>, model: Arc<dyn TextModel>) -> Self {
        let template = PromptTemplate::resolve(config.prompt_template_path.as_deref());
        Self {
            config: Arc::new(config),
            recognizer,
            model,
            template: Arc::new(template),
        }
    }

    /// Assemble a pipeline with the vision recogniser and an `edgequake-llm`
    /// text model, both resolved from `config`.
    pub fn from_config(config: PipelineConfig) -> Result<Self, ReportError> {
        let text_provider = resolve_provider(&config, config.model_name())?;
        let vision_provider = resolve_provider(&config, config.vision_model_name())?;
        info!(
            "Using {} for normalisation and {} for recognition",
            config.model_name(),
            config.vision_model_name()
        );
        let model = Arc::new(LlmTextModel::new(text_provider, config.model_name()));
        let recognizer = Arc::new(VisionRecognizer::new(vision_provider, config.vision_model_name()));
        Ok(Self::new(config, recognizer, model))
    }

    /// Replace the prompt template.
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = Arc::new(template);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn reached(&self, label: &str, stage: Stage) {
        debug!("{}: {}", label, stage);
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_stage(label, stage);
        }
    }

    /// Document → envelope: rasterise, recognise, normalise, structure.
    pub async fn extract(&self, doc: &SourceDocument) -> Result<ExtractionEnvelope, PipelineError> {
        let start = Instant::now();
        let label = doc.filename.as_str();
        self.reached(label, Stage::Received);

        let options = RenderOptions {
            dpi: self.config.dpi,
            max_rendered_pixels: self.config.max_rendered_pixels,
            password: self.config.pdf_password.clone(),
        };
        let images = render_document(doc, &options)
            .await
            .map_err(|e| PipelineError::new(Stage::Recognized, e))?;
        let page_count = images.len();

        let pages = recognize_pages(
            Arc::clone(&self.recognizer),
            images,
            self.config.page_concurrency,
            self.config.ocr_timeout_secs,
        )
        .await
        .map_err(|e| PipelineError::new(Stage::Recognized, e))?;
        self.reached(label, Stage::Recognized);

        let envelope = build_envelope(label, doc.file_type(), &pages);
        self.reached(label, Stage::Normalized);
        self.reached(label, Stage::Structured);

        info!(
            "{}: {} page(s), {} words, confidence {} in {:?}",
            label,
            page_count,
            envelope.metadata.word_count,
            envelope
                .confidence
                .map(|c| c.to_string())
                .unwrap_or_default(),
            start.elapsed()
        );
        Ok(envelope)
    }

    /// Text or structured fields → validated [`ReportCard`].
    pub async fn normalize(&self, input: NormalizeInput) -> Result<ReportCard, PipelineError> {
        self.normalize_labeled("input", input).await
    }

    async fn normalize_labeled(&self, label: &str, input: NormalizeInput) -> Result<ReportCard, PipelineError> {
        let source = input.source.unwrap_or_else(|| self.config.source.clone());
        let raw_format = input.raw_format.unwrap_or_else(|| self.config.raw_format.clone());

        // Blank text counts as absent.
        let text = input.text.filter(|t| !t.trim().is_empty());
        let prompt_input = match (text, input.structured) {
            (Some(text), _) if self.config.translate => {
                PromptInput::Text(self.translate(&text, None).await)
            }
            (Some(text), _) => PromptInput::Text(text),
            (None, Some(fields)) => PromptInput::Structured(fields),
            (None, None) => {
                return Err(PipelineError::new(
                    Stage::Prompted,
                    ReportError::Input("provide either text or structured data".into()),
                ))
            }
        };

        let prompt = self.template.render(&prompt_input, &source, &raw_format);
        self.reached(label, Stage::Prompted);
        debug!("{}: prompt is {} chars", label, prompt.len());

        let budget = self.config.model_timeout_secs;
        let output = match tokio::time::timeout(
            Duration::from_secs(budget),
            self.model
                .complete(&prompt, self.config.temperature, self.config.max_tokens),
        )
        .await
        {
            Ok(result) => result.map_err(|e| PipelineError::new(Stage::ModelCalled, e))?,
            Err(_) => {
                return Err(PipelineError::new(
                    Stage::ModelCalled,
                    ReportError::ModelTimeout { secs: budget },
                ))
            }
        };
        self.reached(label, Stage::ModelCalled);
        debug!("{}: model answered with {} chars", label, output.len());

        let payload = parse_payload(&output).map_err(|e| PipelineError::new(Stage::CandidateFound, e))?;
        self.reached(label, Stage::CandidateFound);

        let card = validate_report_card(&payload).map_err(|e| PipelineError::new(Stage::Validated, e))?;
        self.reached(label, Stage::Validated);

        info!("{}: report card with {} subject(s)", label, card.subjects.len());
        Ok(card)
    }

    /// Document → envelope → record.
    pub async fn process(&self, doc: &SourceDocument) -> Result<ProcessedDocument, PipelineError> {
        let envelope = self.extract(doc).await?;
        let input = NormalizeInput::text(envelope.raw_text.clone())
            .with_source("ocr")
            .with_raw_format(envelope.file_type.clone());
        let report_card = self.normalize_labeled(&doc.filename, input).await?;
        self.reached(&doc.filename, Stage::Done);
        Ok(ProcessedDocument {
            envelope,
            report_card,
        })
    }

    /// Run [`Pipeline::process`] on a tokio worker task.
    pub fn spawn(&self, doc: SourceDocument) -> JoinHandle<Result<ProcessedDocument, PipelineError>> {
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.process(&doc).await })
    }

    /// Translate `text` to English with this pipeline's model.
    ///
    /// Bounded by `model_timeout_secs`; on timeout, as on any other failure,
    /// the original text is returned.
    pub async fn translate(&self, text: &str, source_language: Option<&str>) -> String {
        let budget = self.config.model_timeout_secs;
        match tokio::time::timeout(
            Duration::from_secs(budget),
            translate_to_english(self.model.as_ref(), text, source_language),
        )
        .await
        {
            Ok(translated) => translated,
            Err(_) => {
                warn!("Translation timed out after {}s; keeping original text", budget);
                text.to_string()
            }
        }
    }
}
