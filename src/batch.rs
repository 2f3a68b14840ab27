//! Stage entry points: one file, or every matching file in a directory.
//!
//! A [`Pipeline`] binds one inference client to one retry scheduler, so
//! every request it sends, across pages and files, passes through the same
//! rate limiter.
//!
//! ## Failure scope
//!
//! | Failure | Effect |
//! |---------|--------|
//! | One page | failure marker stored, run continues |
//! | One file (bad PDF, unreadable input) | logged, recorded in [`BatchReport`], next file runs |
//! | Missing directory / credentials | returned as `Err`, nothing runs |

use crate::client::{InferenceClient, ProviderClient};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::{OcrPage, PageRecord, RunOutput, RunStats, SourcePage, TranslatedPage, UrduPage};
use crate::pacing::RateLimiter;
use crate::page::{
    EnglishToUrdu, GermanToEnglish, Inference, OcrProcessor, PageProcessor, TranslateProcessor,
    TranslationStage,
};
use crate::pipeline::input::{self, OCR_SUFFIX, TRANSLATED_SUFFIX, URDU_SUFFIX};
use crate::pipeline::render::{PageRasteriser, PdfRasteriser};
use crate::retry::RetryScheduler;
use crate::runner::DocumentRunner;
use crate::snapshot::SnapshotStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Outcome of one file in a directory run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Present when the file ran to completion (possibly with failed pages).
    pub stats: Option<RunStats>,
    /// Present when the file could not be processed at all.
    pub error: Option<String>,
}

/// Per-file outcomes of a directory run, in processing order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub files: Vec<FileOutcome>,
}

impl BatchReport {
    /// Files that ran to completion.
    pub fn succeeded(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_none()).count()
    }

    /// Files that could not be processed.
    pub fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }

    /// Pages stored with a failure marker, across all files.
    pub fn failed_pages(&self) -> usize {
        self.files
            .iter()
            .filter_map(|f| f.stats.as_ref())
            .map(|s| s.failed_pages)
            .sum()
    }

    fn record<P>(&mut self, input: &Path, output: &Path, result: Result<RunOutput<P>, PipelineError>) {
        let outcome = match result {
            Ok(run) => FileOutcome {
                input: input.to_path_buf(),
                output: output.to_path_buf(),
                stats: Some(run.stats),
                error: None,
            },
            Err(e) => {
                error!("Failed to process '{}': {}", input.display(), e);
                FileOutcome {
                    input: input.to_path_buf(),
                    output: output.to_path_buf(),
                    stats: None,
                    error: Some(e.to_string()),
                }
            }
        };
        self.files.push(outcome);
    }
}

/// A configured client + scheduler, ready to run any stage.
pub struct Pipeline {
    inference: Inference,
    config: PipelineConfig,
}

impl Pipeline {
    /// Resolve the configured provider and build the scheduler.
    ///
    /// Fails when the provider's credentials are missing.
    pub fn from_config(config: PipelineConfig) -> Result<Self, PipelineError> {
        let client = ProviderClient::from_config(&config)?;
        info!(
            "Using {} (interval {:?}, {} attempts max)",
            client.name(),
            config.request_interval,
            config.max_attempts
        );
        Ok(Self::with_client(Arc::new(client), config))
    }

    /// Use `client` instead of resolving a provider.
    pub fn with_client(client: Arc<dyn InferenceClient>, config: PipelineConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.request_interval));
        let scheduler = RetryScheduler::new(config.retry_policy(), limiter)
            .with_attempt_timeout(config.attempt_timeout());
        Self {
            inference: Inference::new(client, Arc::new(scheduler)),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn runner<'a, P: PageProcessor>(&self, processor: &'a P, output: &Path) -> DocumentRunner<'a, P> {
        DocumentRunner::new(processor, SnapshotStore::new(output))
            .with_progress(self.config.progress_callback.clone())
            .with_resume(self.config.resume)
    }

    // ── OCR ──────────────────────────────────────────────────────────────

    /// OCR every page of `pdf` into the snapshot at `output`.
    pub async fn ocr_pdf(&self, pdf: &Path, output: &Path) -> Result<RunOutput<OcrPage>, PipelineError> {
        input::validate_pdf(pdf)?;
        let rasteriser = PdfRasteriser::new(
            pdf,
            self.config.max_rendered_pixels,
            self.config.password.clone(),
        );
        let page_count = rasteriser.page_count().await?;
        self.ocr_pages(rasteriser, page_count, output).await
    }

    /// OCR `page_count` pages produced by `rasteriser` into `output`.
    pub async fn ocr_pages<R: PageRasteriser>(
        &self,
        rasteriser: R,
        page_count: usize,
        output: &Path,
    ) -> Result<RunOutput<OcrPage>, PipelineError> {
        let processor = OcrProcessor::new(self.inference.clone(), rasteriser);
        let sources = (0..page_count)
            .map(|index| SourcePage::new(index + 1, index))
            .collect();
        self.runner(&processor, output).run(sources).await
    }

    /// OCR every `*.pdf` in `input_dir` into `<output_dir>/<stem>_ocr.json`.
    ///
    /// A file that fails is recorded in the report and the batch moves on,
    /// except when pdfium itself cannot be loaded.
    pub async fn ocr_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Result<BatchReport, PipelineError> {
        let pdfs = input::list_pdfs(input_dir).await?;
        if pdfs.is_empty() {
            warn!("No PDF files found in '{}'", input_dir.display());
        }
        info!("OCR: {} PDF file(s) in '{}'", pdfs.len(), input_dir.display());

        let mut report = BatchReport::default();
        for pdf in &pdfs {
            let output = input::ocr_output_path(pdf, output_dir);
            match self.ocr_pdf(pdf, &output).await {
                // Every remaining file would fail the same way.
                Err(e @ PipelineError::PdfiumBindingFailed(_)) => return Err(e),
                result => report.record(pdf, &output, result),
            }
        }
        Ok(report)
    }

    // ── Translation ──────────────────────────────────────────────────────

    /// German → English: `<stem>_ocr.json` → `<stem>_translated.json`.
    pub async fn translate_file(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<RunOutput<TranslatedPage>, PipelineError> {
        self.stage_file::<GermanToEnglish>(input, output).await
    }

    /// English → Urdu: `<stem>_translated.json` → `<stem>_urdu.json`.
    pub async fn urdu_file(&self, input: &Path, output: &Path) -> Result<RunOutput<UrduPage>, PipelineError> {
        self.stage_file::<EnglishToUrdu>(input, output).await
    }

    /// Translate every `*_ocr.json` in `dir`.
    pub async fn translate_directory(&self, dir: &Path) -> Result<BatchReport, PipelineError> {
        self.stage_directory::<GermanToEnglish>(dir, OCR_SUFFIX, TRANSLATED_SUFFIX)
            .await
    }

    /// Translate every `*_translated.json` in `dir` into Urdu.
    pub async fn urdu_directory(&self, dir: &Path) -> Result<BatchReport, PipelineError> {
        self.stage_directory::<EnglishToUrdu>(dir, TRANSLATED_SUFFIX, URDU_SUFFIX)
            .await
    }

    async fn stage_file<S: TranslationStage>(
        &self,
        input: &Path,
        output: &Path,
    ) -> Result<RunOutput<S::Target>, PipelineError> {
        let source = SnapshotStore::new(input)
            .load::<S::Source>()
            .await?
            .ok_or_else(|| PipelineError::FileNotFound {
                path: input.to_path_buf(),
            })?;

        if !source.is_complete() {
            warn!(
                "'{}' holds {} of {} pages; translating the pages present",
                input.display(),
                source.pages.len(),
                source.total_pages
            );
        }

        let sources = source
            .pages
            .into_iter()
            .map(|page| SourcePage::new(page.page_number(), page))
            .collect();

        let processor = TranslateProcessor::<S>::new(self.inference.clone());
        self.runner(&processor, output).run(sources).await
    }

    async fn stage_directory<S: TranslationStage>(
        &self,
        dir: &Path,
        from: &str,
        to: &str,
    ) -> Result<BatchReport, PipelineError> {
        let inputs = input::list_with_suffix(dir, from).await?;
        if inputs.is_empty() {
            warn!("No *{} files found in '{}'", from, dir.display());
        }
        info!("{}: {} file(s) in '{}'", S::NAME, inputs.len(), dir.display());

        let mut report = BatchReport::default();
        for path in &inputs {
            let Some(output) = input::replace_suffix(path, from, to) else {
                continue;
            };
            let result = self.stage_file::<S>(path, &output).await;
            report.record(path, &output, result);
        }
        Ok(report)
    }
}

/// OCR every PDF in `input_dir` with a provider resolved from `config`.
pub async fn ocr_directory(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<BatchReport, PipelineError> {
    Pipeline::from_config(config.clone())?
        .ocr_directory(input_dir.as_ref(), output_dir.as_ref())
        .await
}

/// German → English for every OCR snapshot in `dir`.
pub async fn translate_directory(
    dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<BatchReport, PipelineError> {
    Pipeline::from_config(config.clone())?
        .translate_directory(dir.as_ref())
        .await
}

/// English → Urdu for every translated snapshot in `dir`.
pub async fn urdu_directory(
    dir: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<BatchReport, PipelineError> {
    Pipeline::from_config(config.clone())?
        .urdu_directory(dir.as_ref())
        .await
}
