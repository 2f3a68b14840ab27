//! Document and page types written to disk, plus per-run results.
//!
//! The on-disk layout is one JSON object per source document:
//!
//! ```json
//! { "document": { "total_pages": 2, "pages": [
//!     { "page_number": 1, "content": "…" },
//!     { "page_number": 2, "content": "…" } ] } }
//! ```
//!
//! Translation stages keep the same envelope and widen the page record
//! (`german` + `english`, then `urdu`).

use crate::error::PageError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Content stored for a page whose OCR failed.
pub const OCR_FAILED: &str = "[OCR failed]";

/// English text stored for a page whose translation failed.
pub const TRANSLATION_FAILED: &str = "[Translation failed]";

/// Urdu text stored for a page whose Urdu translation failed.
pub const URDU_TRANSLATION_FAILED: &str = "[Urdu translation failed]";

/// True when `text` is one of the failure markers written by a stage.
pub fn is_failure_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        OCR_FAILED | TRANSLATION_FAILED | URDU_TRANSLATION_FAILED
    )
}

/// A page record that can live inside a [`Document`].
pub trait PageRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// 1-indexed page number.
    fn page_number(&self) -> usize;
}

/// A document under construction or fully processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<P> {
    pub total_pages: usize,
    pub pages: Vec<P>,
}

impl<P> Document<P> {
    /// An empty document expecting `total_pages` pages.
    pub fn new(total_pages: usize) -> Self {
        Self {
            total_pages,
            pages: Vec::with_capacity(total_pages),
        }
    }

    /// True once every expected page has been appended.
    pub fn is_complete(&self) -> bool {
        self.pages.len() == self.total_pages
    }
}

/// The top-level JSON envelope: `{ "document": { … } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<P> {
    pub document: Document<P>,
}

/// One page of OCR output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrPage {
    pub page_number: usize,
    pub content: String,
}

impl PageRecord for OcrPage {
    fn page_number(&self) -> usize {
        self.page_number
    }
}

/// One page of German → English translation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedPage {
    pub page_number: usize,
    pub german: String,
    pub english: String,
}

impl PageRecord for TranslatedPage {
    fn page_number(&self) -> usize {
        self.page_number
    }
}

/// One page of English → Urdu translation output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrduPage {
    pub page_number: usize,
    pub german: String,
    pub english: String,
    pub urdu: String,
}

impl PageRecord for UrduPage {
    fn page_number(&self) -> usize {
        self.page_number
    }
}

/// A unit of work handed to the document runner.
#[derive(Debug, Clone)]
pub struct SourcePage<I> {
    pub page_number: usize,
    pub input: I,
}

impl<I> SourcePage<I> {
    pub fn new(page_number: usize, input: I) -> Self {
        Self { page_number, input }
    }
}

/// What a page processor hands back: always a well-formed page, plus the
/// error that forced a failure marker into it, if any.
#[derive(Debug, Clone)]
pub struct ProcessedPage<P> {
    pub page: P,
    pub error: Option<PageError>,
    /// Remote attempts spent on this page (0 when no call was needed).
    pub attempts: u32,
    /// Byte length of the text the page produced.
    pub output_len: usize,
}

impl<P> ProcessedPage<P> {
    pub fn ok(page: P, attempts: u32, output_len: usize) -> Self {
        Self {
            page,
            error: None,
            attempts,
            output_len,
        }
    }

    pub fn failed(page: P, error: PageError, attempts: u32) -> Self {
        Self {
            page,
            error: Some(error),
            attempts,
            output_len: 0,
        }
    }
}

/// Statistics for one document run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages processed in this run without a failure marker.
    pub processed_pages: usize,
    /// Pages stored with a failure marker in this run.
    pub failed_pages: usize,
    /// Pages taken over from an existing snapshot.
    pub resumed_pages: usize,
    /// Remote attempts spent across all pages.
    pub total_attempts: u64,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}

/// Result of [`crate::runner::DocumentRunner::run`].
#[derive(Debug, Clone)]
pub struct RunOutput<P> {
    /// The document exactly as last persisted.
    pub document: Document<P>,
    /// Errors of the pages that were stored with a failure marker.
    pub page_errors: Vec<PageError>,
    pub stats: RunStats,
}
