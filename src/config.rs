//! Configuration types for report card extraction.
//!
//! Everything a [`crate::Pipeline`] needs to know is held in
//! [`PipelineConfig`], built via its [`PipelineConfigBuilder`]. Setters
//! clamp out-of-range values; [`PipelineConfigBuilder::build`] rejects
//! combinations that cannot work at all.

use crate::error::ReportError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default text model used for normalisation when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default vision model used to transcribe page images.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4.1-nano";

/// Configuration for an extraction pipeline.
///
/// # Example
/// ```rust
/// use report2json::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .model("gpt-4o-mini")
///     .model_timeout_secs(120)
///     .page_concurrency(2)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_tokens, 4000);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Text model identifier for normalisation. If None, [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the environment decides.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Model used by the vision recogniser. If None, [`DEFAULT_VISION_MODEL`].
    pub vision_model: Option<String>,

    /// Sampling temperature for normalisation. Default: 0.0.
    pub temperature: f32,

    /// Output token budget for normalisation. Default: 4000.
    pub max_tokens: usize,

    /// Translate free text to English before prompting. Default: false.
    pub translate: bool,

    /// `source` tag for direct normalisation calls. Default: "unknown".
    pub source: String,

    /// `raw_format` tag for direct normalisation calls. Default: "text".
    pub raw_format: String,

    /// Prompt template override file. Falls back to
    /// [`crate::prompts::TEMPLATE_ENV_VAR`], then the built-in template.
    pub prompt_template_path: Option<PathBuf>,

    /// Per-page OCR budget in seconds. Default: 60.
    pub ocr_timeout_secs: u64,

    /// Model call budget in seconds. Default: 180.
    ///
    /// Normalisation prompts are long and answers are a few kilobytes of JSON,
    /// so this is deliberately much larger than the OCR budget.
    pub model_timeout_secs: u64,

    /// Rendering DPI used when rasterising PDF pages. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// Maximum rendered image dimension in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Concurrent page recognitions within one document. Default: 4.
    pub page_concurrency: usize,

    /// Concurrent documents in batch mode. Default: 4.
    pub document_concurrency: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub pdf_password: Option<String>,

    /// Receives stage and document events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            vision_model: None,
            temperature: 0.0,
            max_tokens: 4000,
            translate: false,
            source: "unknown".to_string(),
            raw_format: "text".to_string(),
            prompt_template_path: None,
            ocr_timeout_secs: 60,
            model_timeout_secs: 180,
            dpi: 300,
            max_rendered_pixels: 2000,
            page_concurrency: 4,
            document_concurrency: 4,
            download_timeout_secs: 120,
            pdf_password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("vision_model", &self.vision_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("translate", &self.translate)
            .field("source", &self.source)
            .field("raw_format", &self.raw_format)
            .field("prompt_template_path", &self.prompt_template_path)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("model_timeout_secs", &self.model_timeout_secs)
            .field("dpi", &self.dpi)
            .field("page_concurrency", &self.page_concurrency)
            .field("document_concurrency", &self.document_concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The text model name, falling back to [`DEFAULT_MODEL`].
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// The vision model name, falling back to [`DEFAULT_VISION_MODEL`].
    pub fn vision_model_name(&self) -> &str {
        self.vision_model.as_deref().unwrap_or(DEFAULT_VISION_MODEL)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn vision_model(mut self, model: impl Into<String>) -> Self {
        self.config.vision_model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn translate(mut self, v: bool) -> Self {
        self.config.translate = v;
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.config.source = source.into();
        self
    }

    pub fn raw_format(mut self, raw_format: impl Into<String>) -> Self {
        self.config.raw_format = raw_format.into();
        self
    }

    pub fn prompt_template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.prompt_template_path = Some(path.into());
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn model_timeout_secs(mut self, secs: u64) -> Self {
        self.config.model_timeout_secs = secs;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn page_concurrency(mut self, n: usize) -> Self {
        self.config.page_concurrency = n.max(1);
        self
    }

    pub fn document_concurrency(mut self, n: usize) -> Self {
        self.config.document_concurrency = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn pdf_password(mut self, pwd: impl Into<String>) -> Self {
        self.config.pdf_password = Some(pwd.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, ReportError> {
        let c = &self.config;
        if c.ocr_timeout_secs == 0 || c.model_timeout_secs == 0 {
            return Err(ReportError::InvalidConfig(
                "Timeouts must be at least one second".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(ReportError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.page_concurrency == 0 || c.document_concurrency == 0 {
            return Err(ReportError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.model_name(), "gpt-4o-mini");
        assert_eq!(c.vision_model_name(), "gpt-4.1-nano");
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.max_tokens, 4000);
        assert_eq!(c.ocr_timeout_secs, 60);
        assert_eq!(c.model_timeout_secs, 180);
        assert_eq!(c.source, "unknown");
        assert_eq!(c.raw_format, "text");
        assert!(!c.translate);
    }

    #[test]
    fn setters_clamp() {
        let c = PipelineConfig::builder()
            .temperature(5.0)
            .dpi(10)
            .page_concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.dpi, 72);
        assert_eq!(c.page_concurrency, 1);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = PipelineConfig::builder()
            .model_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ReportError::InvalidConfig(_)));
    }

    #[test]
    fn debug_hides_provider() {
        let s = format!("{:?}", PipelineConfig::default());
        assert!(s.contains("PipelineConfig"));
        assert!(s.contains("model_timeout_secs: 180"));
    }
}
