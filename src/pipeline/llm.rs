//! Generative model access: the extraction client and its helpers.
//!
//! [`TextModel`] is the seam the orchestrator talks to: one prompt in, raw
//! text out. [`LlmTextModel`] backs it with an `edgequake-llm` provider.
//! The pipeline never retries; callers that want retries wrap their model in
//! [`RetryingModel`] before handing it over.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 answers are transient under concurrent load. The wrapper
//! waits `backoff_ms * 2^(attempt-1)` between attempts: with 500 ms and three
//! retries that is 500 ms → 1 s → 2 s. A single wait never exceeds
//! [`MAX_BACKOFF_MS`].

use crate::config::PipelineConfig;
use crate::error::ReportError;
use crate::prompts::translation_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Upper bound for one retry wait.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Output budget for the translation step.
pub const TRANSLATION_MAX_TOKENS: usize = 2000;

/// A generative text model: `complete(prompt, temperature, max_tokens) -> text`.
///
/// Implementations return the response with surrounding whitespace removed
/// and report every transport or provider failure as
/// [`ReportError::ModelCall`]. They must not retry.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String, ReportError>;

    /// Short identifier for logs.
    fn name(&self) -> &str {
        "text-model"
    }
}

/// [`TextModel`] backed by an `edgequake-llm` provider.
#[derive(Clone)]
pub struct LlmTextModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl LlmTextModel {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl TextModel for LlmTextModel {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String, ReportError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user(prompt)];
        let options = CompletionOptions {
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ReportError::ModelCall {
                detail: e.to_string(),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.label,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content.trim().to_string())
    }

    fn name(&self) -> &str {
        &self.label
    }
}

/// Caller-level retry policy around any [`TextModel`].
///
/// Only [`ReportError::ModelCall`] failures are retried; anything else is
/// returned immediately.
pub struct RetryingModel<M> {
    inner: M,
    max_retries: u32,
    backoff_ms: u64,
}

impl<M: TextModel> RetryingModel<M> {
    pub fn new(inner: M, max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            inner,
            max_retries,
            backoff_ms,
        }
    }
}

#[async_trait]
impl<M: TextModel> TextModel for RetryingModel<M> {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String, ReportError> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let backoff = backoff_delay_ms(self.backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    self.inner.name(),
                    attempt,
                    self.max_retries,
                    backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.inner.complete(prompt, temperature, max_tokens).await {
                Err(e @ ReportError::ModelCall { .. }) if attempt < self.max_retries => {
                    warn!("{}: attempt {} failed: {}", self.inner.name(), attempt + 1, e);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Wait before retry `attempt` (1-based): `base_ms * 2^(attempt-1)`, saturating
/// at [`MAX_BACKOFF_MS`].
fn backoff_delay_ms(base_ms: u64, attempt: u32) -> u64 {
    2u64.checked_pow(attempt.saturating_sub(1))
        .and_then(|factor| base_ms.checked_mul(factor))
        .map_or(MAX_BACKOFF_MS, |ms| ms.min(MAX_BACKOFF_MS))
}

/// Translate `text` to English, returning it unchanged when empty or when
/// the model fails.
pub async fn translate_to_english(
    model: &dyn TextModel,
    text: &str,
    source_language: Option<&str>,
) -> String {
    if text.trim().is_empty() {
        return text.to_string();
    }
    let prompt = translation_prompt(text, source_language);
    match model.complete(&prompt, 0.0, TRANSLATION_MAX_TOKENS).await {
        Ok(translated) if !translated.is_empty() => translated,
        Ok(_) => {
            warn!("Translation returned nothing; keeping original text");
            text.to_string()
        }
        Err(e) => {
            warn!("Translation failed, keeping original text: {}", e);
            text.to_string()
        }
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ReportError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ReportError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider for `model`, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `model`.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when
///    both are set.
/// 4. **OpenAI** with `model` when `OPENAI_API_KEY` is present.
/// 5. **Auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_provider(
    config: &PipelineConfig,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ReportError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ReportError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}
