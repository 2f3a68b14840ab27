//! Document runner: process pages in order, persist after every page.
//!
//! The runner owns the in-memory [`Document`] and its snapshot file. For
//! each source page, in ascending page-number order, it asks the
//! [`PageProcessor`] for a page record, appends it and rewrites the whole
//! snapshot before moving on. A crash therefore loses at most the page in
//! flight, and the file on disk always holds a prefix of the final result.
//!
//! ## Resume
//!
//! With resume enabled, an existing snapshot is reused when its
//! `total_pages` matches and its page numbers are exactly the first pages of
//! the sorted source list. Those pages are kept verbatim and skipped. Any
//! other snapshot is ignored and overwritten.

use crate::error::{PageError, PipelineError};
use crate::output::{Document, PageRecord, RunOutput, RunStats, SourcePage};
use crate::page::PageProcessor;
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::snapshot::SnapshotStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drives one document through one stage.
pub struct DocumentRunner<'a, P: PageProcessor> {
    processor: &'a P,
    store: SnapshotStore,
    progress: ProgressCallback,
    resume: bool,
}

impl<'a, P: PageProcessor> DocumentRunner<'a, P> {
    pub fn new(processor: &'a P, store: SnapshotStore) -> Self {
        Self {
            processor,
            store,
            progress: Arc::new(NoopProgressCallback),
            resume: false,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        if let Some(cb) = progress {
            self.progress = cb;
        }
        self
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Process `sources` and return the document as last persisted.
    ///
    /// Page failures are recorded in the output, never returned as errors.
    /// A snapshot that cannot be written is fatal.
    pub async fn run(
        &self,
        mut sources: Vec<SourcePage<P::Input>>,
    ) -> Result<RunOutput<P::Output>, PipelineError> {
        let start = Instant::now();
        sources.sort_by_key(|s| s.page_number);

        let total = sources.len();
        let name = self.document_name();
        let stage = self.processor.stage();

        let mut document = self.initial_document(&sources).await?;
        let resumed = document.pages.len();
        self.store.save(&document).await?;

        info!(
            "{}: {} '{}' ({} pages{})",
            stage,
            if resumed > 0 { "resuming" } else { "starting" },
            name,
            total,
            if resumed > 0 {
                format!(", {} already done", resumed)
            } else {
                String::new()
            }
        );
        self.progress.on_document_start(&name, total);

        let mut stats = RunStats {
            total_pages: total,
            resumed_pages: resumed,
            ..Default::default()
        };
        let mut page_errors: Vec<PageError> = Vec::new();

        for page in &document.pages {
            self.progress.on_page_resumed(page.page_number(), total);
        }

        for source in sources.iter().skip(resumed) {
            let n = source.page_number;
            self.progress.on_page_start(n, total);

            let processed = self.processor.process(n, &source.input).await;
            stats.total_attempts += u64::from(processed.attempts);

            match processed.error {
                Some(err) => {
                    warn!("{} '{}': {}", stage, name, err);
                    self.progress.on_page_error(n, total, &err.to_string());
                    stats.failed_pages += 1;
                    page_errors.push(err);
                }
                None => {
                    debug!(
                        "{} '{}': page {}/{} done after {} attempt(s)",
                        stage, name, n, total, processed.attempts
                    );
                    self.progress.on_page_complete(n, total, processed.output_len);
                    stats.processed_pages += 1;
                }
            }

            document.pages.push(processed.page);
            self.store.save(&document).await?;
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        self.progress
            .on_document_complete(total, stats.processed_pages + resumed);
        info!(
            "{}: finished '{}' ({} ok, {} failed, {} resumed) in {:.1}s → {}",
            stage,
            name,
            stats.processed_pages,
            stats.failed_pages,
            stats.resumed_pages,
            stats.duration_ms as f64 / 1000.0,
            self.store.path().display()
        );

        Ok(RunOutput {
            document,
            page_errors,
            stats,
        })
    }

    /// Fresh document, or the reusable part of an existing snapshot.
    async fn initial_document(
        &self,
        sources: &[SourcePage<P::Input>],
    ) -> Result<Document<P::Output>, PipelineError> {
        let fresh = Document::new(sources.len());
        if !self.resume {
            return Ok(fresh);
        }

        let existing = match self.store.load::<P::Output>().await {
            Ok(Some(doc)) => doc,
            Ok(None) => return Ok(fresh),
            Err(PipelineError::InvalidSnapshot { path, detail }) => {
                warn!(
                    "Ignoring unreadable snapshot '{}': {}",
                    path.display(),
                    detail
                );
                return Ok(fresh);
            }
            Err(e) => return Err(e),
        };

        if is_resumable(&existing, sources) {
            Ok(existing)
        } else {
            warn!(
                "Snapshot '{}' does not match the source ({} of {} pages); starting over",
                self.store.path().display(),
                existing.pages.len(),
                existing.total_pages
            );
            Ok(fresh)
        }
    }

    fn document_name(&self) -> String {
        self.store
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    }
}

/// True when `existing` holds exactly the first pages of `sources`.
fn is_resumable<P: PageRecord, I>(existing: &Document<P>, sources: &[SourcePage<I>]) -> bool {
    existing.total_pages == sources.len()
        && existing.pages.len() <= sources.len()
        && existing
            .pages
            .iter()
            .zip(sources)
            .all(|(page, source)| page.page_number() == source.page_number)
}
