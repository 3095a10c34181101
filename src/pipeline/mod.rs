//! Pipeline stages for report card extraction.
//!
//! Each submodule implements one step; the orchestrator in
//! [`crate::orchestrator`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ ocr ──▶ confidence ──▶ normalize ──▶ structure/metadata
//!                       │
//!                    (encode)
//!
//! text ──▶ prompts ──▶ llm ──▶ candidate ──▶ validate ──▶ ReportCard
//! ```
//!
//! 1. [`input`]    : path or URL to bytes, file kind routing
//! 2. [`render`]   : pages to images; `spawn_blocking` because pdfium and
//!    image decoding are CPU-bound
//! 3. [`ocr`]      : per-page recognition, concurrent but order-preserving
//! 4. [`confidence`]: join pages, pool token confidences
//! 5. [`normalize`], [`structure`], [`metadata`]: pure text passes
//! 6. [`llm`]      : the only stage besides OCR with network I/O
//! 7. [`candidate`], [`validate`]: recover and check the JSON record

pub mod candidate;
pub mod confidence;
pub mod encode;
pub mod input;
pub mod llm;
pub mod metadata;
pub mod normalize;
pub mod ocr;
pub mod render;
pub mod structure;
pub mod validate;
