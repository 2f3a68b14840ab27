//! Page processors: one page in, one well-formed page record out.
//!
//! A [`PageProcessor`] never fails. Whatever goes wrong (rendering, a
//! rejected request, an exhausted retry budget) the caller receives a page
//! whose text is the stage's failure marker, plus the [`PageError`] that put
//! it there. The document run continues with the next page.
//!
//! Three processors cover the three stages:
//!
//! | Stage | Processor | Input | Output |
//! |-------|-----------|-------|--------|
//! | OCR | [`OcrProcessor`] | 0-based page index | [`OcrPage`] |
//! | German → English | [`TranslateProcessor<GermanToEnglish>`] | [`OcrPage`] | [`TranslatedPage`] |
//! | English → Urdu | [`TranslateProcessor<EnglishToUrdu>`] | [`TranslatedPage`] | [`UrduPage`] |

use crate::client::{InferenceClient, Payload};
use crate::error::{InferenceError, PageError, RetryError};
use crate::output::{
    is_failure_marker, OcrPage, PageRecord, ProcessedPage, TranslatedPage, UrduPage, OCR_FAILED,
    TRANSLATION_FAILED, URDU_TRANSLATION_FAILED,
};
use crate::pipeline::postprocess::clean_text;
use crate::pipeline::render::PageRasteriser;
use crate::prompts::{ENGLISH_TO_URDU_PROMPT, GERMAN_TO_ENGLISH_PROMPT, OCR_PROMPT};
use crate::retry::RetryScheduler;
use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// One logical unit of work for a [`crate::runner::DocumentRunner`].
#[async_trait]
pub trait PageProcessor: Send + Sync {
    type Input: Send + Sync;
    type Output: PageRecord;

    /// Short stage name for log lines and progress output.
    fn stage(&self) -> &'static str;

    /// Process one page. Never fails: errors become a failure-marker page.
    async fn process(&self, page_number: usize, input: &Self::Input)
        -> ProcessedPage<Self::Output>;
}

/// Text returned by a successful [`Inference::complete`].
#[derive(Debug)]
struct Completion {
    text: String,
    attempts: u32,
}

/// Client + scheduler pair shared by all processors.
#[derive(Clone)]
pub struct Inference {
    client: Arc<dyn InferenceClient>,
    scheduler: Arc<RetryScheduler>,
}

impl Inference {
    pub fn new(client: Arc<dyn InferenceClient>, scheduler: Arc<RetryScheduler>) -> Self {
        Self { client, scheduler }
    }

    pub fn client(&self) -> &Arc<dyn InferenceClient> {
        &self.client
    }

    /// Send `payload` under the scheduler and clean the answer.
    ///
    /// With `reject_empty`, an answer that is empty after cleanup counts as a
    /// transient failure and is retried.
    async fn complete(
        &self,
        label: &str,
        payload: &Payload,
        reject_empty: bool,
    ) -> Result<Completion, RetryError> {
        let calls = AtomicU32::new(0);
        let client = &self.client;

        let text = self
            .scheduler
            .run(label, || {
                calls.fetch_add(1, Ordering::Relaxed);
                async move {
                    let raw = client.infer(payload).await?;
                    let cleaned = clean_text(&raw);
                    if reject_empty && cleaned.is_empty() {
                        return Err(InferenceError::transient("model returned empty output"));
                    }
                    Ok(cleaned)
                }
            })
            .await?;

        Ok(Completion {
            text,
            attempts: calls.load(Ordering::Relaxed),
        })
    }
}

// ── OCR ──────────────────────────────────────────────────────────────────────

/// Scanned page image → German paragraph.
pub struct OcrProcessor<R> {
    inference: Inference,
    rasteriser: R,
}

impl<R: PageRasteriser> OcrProcessor<R> {
    pub fn new(inference: Inference, rasteriser: R) -> Self {
        Self {
            inference,
            rasteriser,
        }
    }
}

#[async_trait]
impl<R: PageRasteriser> PageProcessor for OcrProcessor<R> {
    type Input = usize;
    type Output = OcrPage;

    fn stage(&self) -> &'static str {
        "ocr"
    }

    async fn process(&self, page_number: usize, index: &usize) -> ProcessedPage<OcrPage> {
        let failed = || OcrPage {
            page_number,
            content: OCR_FAILED.to_string(),
        };

        let image = match self.rasteriser.rasterise(*index).await {
            Ok(image) => image,
            Err(e) => {
                let error = PageError::RenderFailed {
                    page: page_number,
                    detail: e.to_string(),
                };
                return ProcessedPage::failed(failed(), error, 0);
            }
        };

        let label = format!("ocr page {}", page_number);
        let payload = Payload::image(OCR_PROMPT, image);
        match self.inference.complete(&label, &payload, false).await {
            Ok(done) => {
                let len = done.text.len();
                let page = OcrPage {
                    page_number,
                    content: done.text,
                };
                ProcessedPage::ok(page, done.attempts, len)
            }
            Err(e) => {
                let attempts = e.attempts();
                ProcessedPage::failed(failed(), PageError::from_retry(page_number, &e), attempts)
            }
        }
    }
}

// ── Translation ──────────────────────────────────────────────────────────────

/// One text-to-text stage: what it reads, what it writes, how it asks.
pub trait TranslationStage: Send + Sync + 'static {
    type Source: PageRecord;
    type Target: PageRecord;

    const NAME: &'static str;
    const INSTRUCTION: &'static str;
    /// Stored in place of the translation when it fails.
    const FAILED: &'static str;

    /// Text to translate.
    fn source_text(source: &Self::Source) -> &str;

    /// Widen the source record with the translated text.
    fn build(source: &Self::Source, translated: String) -> Self::Target;
}

/// German → English.
pub struct GermanToEnglish;

impl TranslationStage for GermanToEnglish {
    type Source = OcrPage;
    type Target = TranslatedPage;

    const NAME: &'static str = "translate";
    const INSTRUCTION: &'static str = GERMAN_TO_ENGLISH_PROMPT;
    const FAILED: &'static str = TRANSLATION_FAILED;

    fn source_text(source: &OcrPage) -> &str {
        &source.content
    }

    fn build(source: &OcrPage, translated: String) -> TranslatedPage {
        TranslatedPage {
            page_number: source.page_number,
            german: source.content.clone(),
            english: translated,
        }
    }
}

/// English → Urdu.
pub struct EnglishToUrdu;

impl TranslationStage for EnglishToUrdu {
    type Source = TranslatedPage;
    type Target = UrduPage;

    const NAME: &'static str = "urdu";
    const INSTRUCTION: &'static str = ENGLISH_TO_URDU_PROMPT;
    const FAILED: &'static str = URDU_TRANSLATION_FAILED;

    fn source_text(source: &TranslatedPage) -> &str {
        &source.english
    }

    fn build(source: &TranslatedPage, translated: String) -> UrduPage {
        UrduPage {
            page_number: source.page_number,
            german: source.german.clone(),
            english: source.english.clone(),
            urdu: translated,
        }
    }
}

/// Text page of one stage → text page of the next.
pub struct TranslateProcessor<S> {
    inference: Inference,
    _stage: PhantomData<S>,
}

impl<S: TranslationStage> TranslateProcessor<S> {
    pub fn new(inference: Inference) -> Self {
        Self {
            inference,
            _stage: PhantomData,
        }
    }
}

#[async_trait]
impl<S: TranslationStage> PageProcessor for TranslateProcessor<S> {
    type Input = S::Source;
    type Output = S::Target;

    fn stage(&self) -> &'static str {
        S::NAME
    }

    async fn process(&self, page_number: usize, source: &S::Source) -> ProcessedPage<S::Target> {
        let text = S::source_text(source).trim();

        if text.is_empty() {
            debug!("{} page {}: empty source, nothing to send", S::NAME, page_number);
            return ProcessedPage::ok(S::build(source, String::new()), 0, 0);
        }
        if is_failure_marker(text) {
            return ProcessedPage::failed(
                S::build(source, S::FAILED.to_string()),
                PageError::UpstreamFailed { page: page_number },
                0,
            );
        }

        let label = format!("{} page {}", S::NAME, page_number);
        let payload = Payload::text(S::INSTRUCTION, text);
        match self.inference.complete(&label, &payload, true).await {
            Ok(done) => {
                let len = done.text.len();
                ProcessedPage::ok(S::build(source, done.text), done.attempts, len)
            }
            Err(e) => {
                let attempts = e.attempts();
                ProcessedPage::failed(
                    S::build(source, S::FAILED.to_string()),
                    PageError::from_retry(page_number, &e),
                    attempts,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::PayloadContent;
    use crate::error::PipelineError;
    use crate::pacing::RateLimiter;
    use crate::retry::RetryPolicy;
    use edgequake_llm::ImageData;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays scripted outcomes; repeats the last one when the script runs out.
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<String, InferenceError>>>,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<String, InferenceError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl InferenceClient for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn infer(&self, payload: &Payload) -> Result<String, InferenceError> {
            let seen = match &payload.content {
                PayloadContent::Text(t) => t.clone(),
                PayloadContent::Image(_) => "<image>".to_string(),
            };
            self.seen.lock().unwrap().push(seen);
            let mut q = self.outcomes.lock().unwrap();
            if q.len() > 1 {
                q.pop_front().unwrap()
            } else {
                q.front().cloned().unwrap()
            }
        }
    }

    struct BlankImages;

    #[async_trait]
    impl PageRasteriser for BlankImages {
        async fn rasterise(&self, _index: usize) -> Result<ImageData, PipelineError> {
            Ok(ImageData::new("AAAA", "image/png"))
        }
    }

    struct BrokenPdf;

    #[async_trait]
    impl PageRasteriser for BrokenPdf {
        async fn rasterise(&self, index: usize) -> Result<ImageData, PipelineError> {
            Err(PipelineError::RasterisationFailed {
                page: index + 1,
                detail: "bad xref".into(),
            })
        }
    }

    fn inference(client: Arc<Scripted>, max_attempts: u32) -> Inference {
        let policy = RetryPolicy {
            max_attempts,
            backoff_base: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(60),
        };
        let scheduler = RetryScheduler::new(policy, Arc::new(RateLimiter::unlimited()));
        Inference::new(client, Arc::new(scheduler))
    }

    fn ocr_page(n: usize, content: &str) -> OcrPage {
        OcrPage {
            page_number: n,
            content: content.into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ocr_success_is_cleaned() {
        let client = Scripted::new(vec![Ok("```\nDer Motor läuft.\n```".into())]);
        let p = OcrProcessor::new(inference(client.clone(), 3), BlankImages);
        let out = p.process(1, &0).await;
        assert_eq!(out.page.content, "Der Motor läuft.");
        assert_eq!(out.attempts, 1);
        assert!(out.error.is_none());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ocr_render_failure_skips_request() {
        let client = Scripted::new(vec![Ok("unused".into())]);
        let p = OcrProcessor::new(inference(client.clone(), 3), BrokenPdf);
        let out = p.process(2, &1).await;
        assert_eq!(out.page.content, OCR_FAILED);
        assert!(matches!(out.error, Some(PageError::RenderFailed { page: 2, .. })));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ocr_exhaustion_stores_marker() {
        let client = Scripted::new(vec![Err(InferenceError::transient("503"))]);
        let p = OcrProcessor::new(inference(client.clone(), 3), BlankImages);
        let out = p.process(1, &0).await;
        assert_eq!(out.page.content, OCR_FAILED);
        assert_eq!(out.attempts, 3);
        assert!(matches!(
            out.error,
            Some(PageError::RetriesExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn translation_keeps_german_and_counts_attempts() {
        let client = Scripted::new(vec![
            Err(InferenceError::transient("429")),
            Ok("The engine runs.".into()),
        ]);
        let p = TranslateProcessor::<GermanToEnglish>::new(inference(client.clone(), 12));
        let out = p.process(1, &ocr_page(1, "Der Motor läuft.")).await;
        assert_eq!(out.page.german, "Der Motor läuft.");
        assert_eq!(out.page.english, "The engine runs.");
        assert_eq!(out.attempts, 2);
        assert_eq!(out.output_len, "The engine runs.".len());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_source_needs_no_call() {
        let client = Scripted::new(vec![Ok("unused".into())]);
        let p = TranslateProcessor::<GermanToEnglish>::new(inference(client.clone(), 12));
        let out = p.process(3, &ocr_page(3, "   ")).await;
        assert_eq!(out.page.english, "");
        assert!(out.error.is_none());
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_answer_is_retried() {
        let client = Scripted::new(vec![Ok("  ".into()), Ok("Clutch".into())]);
        let p = TranslateProcessor::<GermanToEnglish>::new(inference(client.clone(), 12));
        let out = p.process(1, &ocr_page(1, "Kupplung")).await;
        assert_eq!(out.page.english, "Clutch");
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_marker_is_not_sent() {
        let client = Scripted::new(vec![Ok("unused".into())]);
        let p = TranslateProcessor::<GermanToEnglish>::new(inference(client.clone(), 12));
        let out = p.process(2, &ocr_page(2, OCR_FAILED)).await;
        assert_eq!(out.page.english, TRANSLATION_FAILED);
        assert_eq!(out.error, Some(PageError::UpstreamFailed { page: 2 }));
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_not_retried() {
        let client = Scripted::new(vec![Err(InferenceError::permanent("API key not valid"))]);
        let p = TranslateProcessor::<GermanToEnglish>::new(inference(client.clone(), 12));
        let out = p.process(1, &ocr_page(1, "Zündkerze")).await;
        assert_eq!(out.page.english, TRANSLATION_FAILED);
        assert_eq!(out.attempts, 1);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn urdu_stage_reads_english() {
        let client = Scripted::new(vec![Ok("انجن چلتا ہے۔".into())]);
        let p = TranslateProcessor::<EnglishToUrdu>::new(inference(client.clone(), 12));
        let source = TranslatedPage {
            page_number: 1,
            german: "Der Motor läuft.".into(),
            english: "The engine runs.".into(),
        };
        let out = p.process(1, &source).await;
        assert_eq!(out.page.german, "Der Motor läuft.");
        assert_eq!(out.page.english, "The engine runs.");
        assert_eq!(out.page.urdu, "انجن چلتا ہے۔");
        assert_eq!(client.seen.lock().unwrap()[0], "The engine runs.");
    }

    #[tokio::test(start_paused = true)]
    async fn urdu_stage_skips_failed_translation() {
        let client = Scripted::new(vec![Ok("unused".into())]);
        let p = TranslateProcessor::<EnglishToUrdu>::new(inference(client.clone(), 12));
        let source = TranslatedPage {
            page_number: 4,
            german: "Text".into(),
            english: TRANSLATION_FAILED.into(),
        };
        let out = p.process(4, &source).await;
        assert_eq!(out.page.urdu, URDU_TRANSLATION_FAILED);
        assert_eq!(client.calls(), 0);
    }
}
