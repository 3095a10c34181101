//! Batch API: many documents at once, results streamed as they finish.
//!
//! Each document runs on its own tokio task, at most
//! `document_concurrency` at a time, so one slow scan never holds up the
//! others. Items arrive in completion order and carry the index of the input
//! they belong to; [`extract_batch`] restores input order.
//!
//! A failing document never aborts the batch: for extraction it becomes an
//! error envelope, for full processing the item carries the error.

use crate::error::{PipelineError, ReportError};
use crate::orchestrator::{Pipeline, Stage};
use crate::output::{ExtractionEnvelope, ProcessedDocument};
use crate::pipeline::input::load_document;
use futures::future;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};

/// `(input index, envelope)` in completion order.
pub type EnvelopeStream = Pin<Box<dyn Stream<Item = (usize, ExtractionEnvelope)> + Send>>;

/// `(input index, filename, outcome)` in completion order.
pub type ProcessedStream =
    Pin<Box<dyn Stream<Item = (usize, String, Result<ProcessedDocument, PipelineError>)> + Send>>;

/// Extract every input (path or URL), streaming envelopes as they complete.
pub fn extract_batch_stream(pipeline: &Pipeline, inputs: Vec<String>) -> EnvelopeStream {
    let total = inputs.len();
    let succeeded = Arc::new(AtomicUsize::new(0));
    let concurrency = pipeline.config().document_concurrency;
    let callback = pipeline.config().progress_callback.clone();
    info!("Starting batch extraction of {} document(s)", total);
    if let Some(ref cb) = callback {
        cb.on_batch_start(total);
    }

    let jobs = inputs.into_iter().enumerate().map({
        let pipeline = pipeline.clone();
        let succeeded = Arc::clone(&succeeded);
        move |(index, input)| {
            let pipeline = pipeline.clone();
            let succeeded = Arc::clone(&succeeded);
            async move {
                let name = display_name(&input);
                let task = tokio::spawn({
                    let pipeline = pipeline.clone();
                    async move { extract_one(&pipeline, &input).await }
                });
                let envelope = match task.await {
                    Ok(envelope) => envelope,
                    Err(e) => ExtractionEnvelope::failed(
                        name.clone(),
                        file_type_of(&name),
                        ReportError::Internal(format!("Extraction task panicked: {}", e)).to_string(),
                    ),
                };
                report_document(&pipeline, &envelope.filename, envelope.error.as_deref(), &succeeded);
                (index, envelope)
            }
        }
    });

    let body = stream::iter(jobs).buffer_unordered(concurrency).map(Some);
    Box::pin(body.chain(batch_tail(callback, total, succeeded)).filter_map(future::ready))
}

/// Extract every input and return envelopes in input order.
pub async fn extract_batch(pipeline: &Pipeline, inputs: Vec<String>) -> Vec<ExtractionEnvelope> {
    let mut items: Vec<(usize, ExtractionEnvelope)> = extract_batch_stream(pipeline, inputs).collect().await;
    items.sort_by_key(|(index, _)| *index);
    items.into_iter().map(|(_, envelope)| envelope).collect()
}

/// Fully process every input (document → record), streaming outcomes.
pub fn process_batch_stream(pipeline: &Pipeline, inputs: Vec<String>) -> ProcessedStream {
    let total = inputs.len();
    let succeeded = Arc::new(AtomicUsize::new(0));
    let concurrency = pipeline.config().document_concurrency;
    let callback = pipeline.config().progress_callback.clone();
    info!("Starting batch processing of {} document(s)", total);
    if let Some(ref cb) = callback {
        cb.on_batch_start(total);
    }

    let jobs = inputs.into_iter().enumerate().map({
        let pipeline = pipeline.clone();
        let succeeded = Arc::clone(&succeeded);
        move |(index, input)| {
            let pipeline = pipeline.clone();
            let succeeded = Arc::clone(&succeeded);
            async move {
                let name = display_name(&input);
                let outcome = match load_document(&input, pipeline.config().download_timeout_secs).await {
                    Ok(doc) => match pipeline.spawn(doc).await {
                        Ok(result) => result,
                        Err(e) => Err(PipelineError::new(
                            Stage::Done,
                            ReportError::Internal(format!("Processing task panicked: {}", e)),
                        )),
                    },
                    Err(e) => Err(PipelineError::new(Stage::Received, e)),
                };
                let error = outcome.as_ref().err().map(|e| e.to_string());
                report_document(&pipeline, &name, error.as_deref(), &succeeded);
                (index, name, outcome)
            }
        }
    });

    let body = stream::iter(jobs).buffer_unordered(concurrency).map(Some);
    Box::pin(body.chain(batch_tail(callback, total, succeeded)).filter_map(future::ready))
}

async fn extract_one(pipeline: &Pipeline, input: &str) -> ExtractionEnvelope {
    let name = display_name(input);
    let doc = match load_document(input, pipeline.config().download_timeout_secs).await {
        Ok(doc) => doc,
        Err(e) => {
            warn!("{}: {}", name, e);
            return ExtractionEnvelope::failed(name.clone(), file_type_of(&name), e.to_string());
        }
    };
    match pipeline.extract(&doc).await {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("{}: {}", doc.filename, e);
            ExtractionEnvelope::failed(doc.filename.clone(), doc.file_type(), e.source.to_string())
        }
    }
}

fn report_document(pipeline: &Pipeline, name: &str, error: Option<&str>, succeeded: &AtomicUsize) {
    match error {
        None => {
            succeeded.fetch_add(1, Ordering::SeqCst);
            if let Some(ref cb) = pipeline.config().progress_callback {
                cb.on_document_complete(name);
            }
        }
        Some(e) => {
            if let Some(ref cb) = pipeline.config().progress_callback {
                cb.on_document_error(name, e);
            }
        }
    }
}

/// A stream that yields nothing but fires `on_batch_complete` once the
/// batch before it is exhausted.
fn batch_tail<T: Send + 'static>(
    callback: Option<crate::progress::ProgressCallback>,
    total: usize,
    succeeded: Arc<AtomicUsize>,
) -> impl Stream<Item = Option<T>> + Send {
    stream::once(async move {
        let ok = succeeded.load(Ordering::SeqCst);
        info!("Batch finished: {}/{} succeeded", ok, total);
        if let Some(cb) = callback {
            cb.on_batch_complete(total, ok);
        }
        None
    })
}

/// Basename of a path or the last URL segment, for labelling results.
fn display_name(input: &str) -> String {
    let trimmed = input.split(['?', '#']).next().unwrap_or(input);
    Path::new(trimmed)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(input)
        .to_string()
}

fn file_type_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names() {
        assert_eq!(display_name("/tmp/scans/card.PDF"), "card.PDF");
        assert_eq!(display_name("https://x.org/a/b.png?sig=1"), "b.png");
        assert_eq!(display_name("card.jpg"), "card.jpg");
    }

    #[test]
    fn file_types() {
        assert_eq!(file_type_of("card.PDF"), ".pdf");
        assert_eq!(file_type_of("notes"), "");
    }
}
