//! Progress-callback trait for stage and document events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to observe a
//! document moving through the pipeline, or a batch moving through
//! [`crate::stream::process_batch_stream`].
//!
//! # Example
//!
//! ```rust
//! use report2json::{PipelineConfig, PipelineProgressCallback, Stage};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl PipelineProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, filename: &str) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{filename} done ({n} so far)");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::orchestrator::Stage;
use std::sync::Arc;

/// Called by the pipeline as documents move through it.
///
/// Documents in a batch run concurrently, so every method may be called from
/// several tasks at once. All methods default to no-ops.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once before any document in a batch is started.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called each time a document reaches a new [`Stage`].
    fn on_stage(&self, filename: &str, stage: Stage) {
        let _ = (filename, stage);
    }

    /// Called when a document finishes successfully.
    fn on_document_complete(&self, filename: &str) {
        let _ = filename;
    }

    /// Called when a document fails; `error` is the human-readable reason.
    fn on_document_error(&self, filename: &str, error: &str) {
        let _ = (filename, error);
    }

    /// Called once after every document in a batch has been attempted.
    fn on_batch_complete(&self, total_documents: usize, succeeded: usize) {
        let _ = (total_documents, succeeded);
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;
