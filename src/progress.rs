//! Progress-callback trait for per-page pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as a [`crate::runner::DocumentRunner`] works through a document.
//!
//! Pages are processed strictly one after another, so events for a document
//! arrive in page order and never overlap. The trait is still `Send + Sync`
//! because the callback lives inside a cloneable config.
//!
//! # Example
//!
//! ```rust
//! use scanlate::{PipelineConfig, PipelineProgressCallback};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct FailureCounter(AtomicUsize);
//!
//! impl PipelineProgressCallback for FailureCounter {
//!     fn on_page_error(&self, page_number: usize, total_pages: usize, error: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_number}/{total_pages} failed: {error}");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(FailureCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the document runner as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called once per document, before the first page.
    ///
    /// # Arguments
    /// * `document`: display name of the document (usually the file name)
    /// * `total_pages`: number of pages in the document
    fn on_document_start(&self, document: &str, total_pages: usize) {
        let _ = (document, total_pages);
    }

    /// Called just before the remote request(s) for a page.
    fn on_page_start(&self, page_number: usize, total_pages: usize) {
        let _ = (page_number, total_pages);
    }

    /// Called when a page produced real output.
    ///
    /// `output_len` is the byte length of the text produced for the page.
    fn on_page_complete(&self, page_number: usize, total_pages: usize, output_len: usize) {
        let _ = (page_number, total_pages, output_len);
    }

    /// Called when a page was stored with a failure marker.
    fn on_page_error(&self, page_number: usize, total_pages: usize, error: &str) {
        let _ = (page_number, total_pages, error);
    }

    /// Called for each page taken over from an existing snapshot on resume.
    fn on_page_resumed(&self, page_number: usize, total_pages: usize) {
        let _ = (page_number, total_pages);
    }

    /// Called once after the last page of a document has been persisted.
    ///
    /// # Arguments
    /// * `total_pages`: pages in the document
    /// * `success_count`: pages stored without a failure marker
    fn on_document_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_document_start("scan.pdf", 5);
        cb.on_page_start(1, 5);
        cb.on_page_complete(1, 5, 42);
        cb.on_page_error(2, 5, "some error");
        cb.on_page_resumed(3, 5);
        cb.on_document_complete(5, 4);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_document_start("scan.pdf", 10);
        cb.on_page_complete(1, 10, 512);
    }
}
