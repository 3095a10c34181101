//! Optical recognition: the OCR collaborator seam and multi-page driver.
//!
//! A [`Recognizer`] turns one page image into a [`RecognizedPage`]. The
//! built-in [`VisionRecognizer`] asks a vision model for a verbatim
//! transcription; it has no per-token scores, so its pages carry no
//! confidences and the document falls back to the qualitative label.
//!
//! [`recognize_pages`] runs pages concurrently, each under its own timeout,
//! and returns them in page order.

use crate::error::ReportError;
use crate::output::RecognizedPage;
use crate::pipeline::encode::encode_page;
use crate::prompts::TRANSCRIPTION_SYSTEM_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use futures::stream::{self, StreamExt, TryStreamExt};
use image::DynamicImage;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Output budget for one page transcription.
pub const TRANSCRIPTION_MAX_TOKENS: usize = 4096;

/// The OCR collaborator: `recognize(image) -> RecognizedPage`.
///
/// `page` is 1-based and only used for error reporting. Token confidences
/// use negative values for regions without text.
///
/// The numeric confidence score in the envelope exists only when a
/// recogniser reports per-token scores, as classic OCR engines do. The
/// built-in [`VisionRecognizer`] reports none, so with it every envelope
/// carries the `high`/`low` label instead. Plug in a scoring engine through
/// [`crate::Pipeline::new`] to get scores.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, page: usize, image: &DynamicImage) -> Result<RecognizedPage, ReportError>;
}

/// [`Recognizer`] that transcribes pages with a vision-capable model.
#[derive(Clone)]
pub struct VisionRecognizer {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl VisionRecognizer {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl Recognizer for VisionRecognizer {
    async fn recognize(&self, page: usize, image: &DynamicImage) -> Result<RecognizedPage, ReportError> {
        let start = Instant::now();
        let image_data = encode_page(page, image)?;

        let messages = vec![
            ChatMessage::system(TRANSCRIPTION_SYSTEM_PROMPT),
            ChatMessage::user_with_images("", vec![image_data]),
        ];
        let options = CompletionOptions {
            temperature: Some(0.0),
            max_tokens: Some(TRANSCRIPTION_MAX_TOKENS),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ReportError::Recognition {
                page,
                detail: e.to_string(),
            })?;

        debug!(
            "{} page {}: {} chars, {} output tokens, {:?}",
            self.label,
            page,
            response.content.len(),
            response.completion_tokens,
            start.elapsed()
        );
        Ok(RecognizedPage::new(clean_transcription(&response.content), Vec::new()))
    }
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-z]*\n(.*)\n```$").unwrap());

/// Undo the usual vision-model habits: an outer code fence and invisible
/// Unicode that would otherwise survive normalisation.
fn clean_transcription(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    };
    inner.replace(['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'], "")
}

/// Recognise `pages` with up to `concurrency` calls in flight.
///
/// Each call is bounded by `timeout_secs`; an expired budget becomes
/// [`ReportError::RecognitionTimeout`]. The first failure (in page order)
/// aborts the document. Results are in page order regardless of which call
/// finishes first.
pub async fn recognize_pages(
    recognizer: Arc<dyn Recognizer>,
    pages: Vec<DynamicImage>,
    concurrency: usize,
    timeout_secs: u64,
) -> Result<Vec<RecognizedPage>, ReportError> {
    let budget = Duration::from_secs(timeout_secs);

    stream::iter(pages.into_iter().enumerate().map(|(idx, image)| {
        let recognizer = Arc::clone(&recognizer);
        let page = idx + 1;
        async move {
            match tokio::time::timeout(budget, recognizer.recognize(page, &image)).await {
                Ok(result) => result,
                Err(_) => Err(ReportError::RecognitionTimeout {
                    page,
                    secs: timeout_secs,
                }),
            }
        }
    }))
    .buffered(concurrency.max(1))
    .try_collect()
    .await
}
