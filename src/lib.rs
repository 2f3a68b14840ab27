//! # scanlate
//!
//! OCR scanned German PDFs with a hosted vision model, then translate the
//! text to English and Urdu, one page at a time, with every intermediate
//! result persisted as JSON.
//!
//! ## Why page-by-page with a snapshot after each page?
//!
//! Hosted models on free or low tiers fail often: quotas run out, requests
//! time out, the service returns 503 for a minute. A book of several hundred
//! pages takes hours at a safe request rate. Every page is therefore retried
//! with exponential backoff, a page that still fails is stored with a
//! failure marker instead of aborting the document, and the whole document is
//! rewritten to disk after each page so an interruption loses at most one.
//!
//! ## Pipeline Overview
//!
//! ```text
//! pdfs/book.pdf
//!  │
//!  ├─ ocr        render page (pdfium) → vision model → German paragraph
//!  │             output/book_ocr.json
//!  ├─ translate  German → English
//!  │             output/book_translated.json
//!  └─ urdu       English → Urdu
//!                output/book_urdu.json
//! ```
//!
//! Each call goes through [`RetryScheduler`]: wait for the shared
//! [`RateLimiter`], send, and on a transient error back off
//! (2 s, 4 s, 8 s … capped at 60 s) for up to 12 attempts.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scanlate::{Pipeline, PipelineConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GEMINI_API_KEY from the environment.
//!     let pipeline = Pipeline::from_config(PipelineConfig::default())?;
//!     let report = pipeline
//!         .ocr_directory(Path::new("pdfs"), Path::new("output"))
//!         .await?;
//!     eprintln!("{} file(s) done, {} failed", report.succeeded(), report.failed());
//!     pipeline.translate_directory(Path::new("output")).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scanlate` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod output;
pub mod pacing;
pub mod page;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod retry;
pub mod runner;
pub mod snapshot;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{ocr_directory, translate_directory, urdu_directory, BatchReport, FileOutcome, Pipeline};
pub use client::{InferenceClient, Payload, PayloadContent, ProviderClient};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{InferenceError, PageError, PipelineError, RetryError};
pub use output::{
    Document, OcrPage, ProcessedPage, RunOutput, RunStats, Snapshot, SourcePage, TranslatedPage,
    UrduPage, OCR_FAILED, TRANSLATION_FAILED, URDU_TRANSLATION_FAILED,
};
pub use pacing::RateLimiter;
pub use page::{EnglishToUrdu, GermanToEnglish, Inference, OcrProcessor, PageProcessor, TranslateProcessor};
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback};
pub use retry::{RetryPolicy, RetryScheduler, RetryState};
pub use runner::DocumentRunner;
pub use snapshot::SnapshotStore;
