//! Remote inference: one request to a hosted LLM, one typed answer.
//!
//! [`InferenceClient`] is the narrow seam between the pipeline and the
//! outside world: `infer(payload) -> Result<String, InferenceError>`. The
//! production implementation, [`ProviderClient`], wraps an
//! `edgequake_llm::LLMProvider`; tests substitute scripted fakes.
//!
//! A client makes exactly one round trip per call. Pacing, timeouts and
//! retries belong to [`crate::retry::RetryScheduler`].
//!
//! ## Error classification
//!
//! [`classify_llm_error`] maps `edgequake_llm::LlmError` variants onto
//! [`InferenceError`]: rate limits, network failures and timeouts are
//! transient; authentication, malformed requests and unknown models are
//! permanent. Only the catch-all variants (`ApiError`, `ProviderError`,
//! `Unknown`) carry nothing but text; [`classify_error_message`] reads the
//! HTTP status from that text when present and falls back to word-bounded
//! markers. Failures nothing recognises are treated as transient.

use crate::config::PipelineConfig;
use crate::error::{InferenceError, PipelineError};
use async_trait::async_trait;
use edgequake_llm::{
    ChatMessage, CompletionOptions, ImageData, LLMProvider, LlmError, ProviderFactory,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// What is being sent: the task instruction plus the page content.
#[derive(Debug, Clone)]
pub struct Payload {
    pub instruction: String,
    pub content: PayloadContent,
}

/// Page content of a [`Payload`].
#[derive(Debug, Clone)]
pub enum PayloadContent {
    /// A rasterised page, base64 PNG.
    Image(ImageData),
    /// Text from an earlier stage.
    Text(String),
}

impl Payload {
    pub fn image(instruction: impl Into<String>, image: ImageData) -> Self {
        Self {
            instruction: instruction.into(),
            content: PayloadContent::Image(image),
        }
    }

    pub fn text(instruction: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            content: PayloadContent::Text(text.into()),
        }
    }
}

/// One call to a remote model.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Short name for log lines, e.g. `"gemini/gemini-flash-lite-latest"`.
    fn name(&self) -> &str;

    /// Send `payload` once and return the model's text.
    async fn infer(&self, payload: &Payload) -> Result<String, InferenceError>;
}

/// [`InferenceClient`] backed by an `edgequake_llm` provider.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    name: String,
}

impl ProviderClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        let name = match config.provider {
            Some(_) => config.model.clone(),
            None => format!("{}/{}", config.provider_name, config.model),
        };
        Self {
            provider,
            options: build_options(config),
            name,
        }
    }

    /// Resolve the provider described by `config` and wrap it.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }
}

#[async_trait]
impl InferenceClient for ProviderClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn infer(&self, payload: &Payload) -> Result<String, InferenceError> {
        let messages = build_messages(payload);
        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| classify_llm_error(&e))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.name, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Request layout: the instruction as a system message, then a user turn
/// carrying either the page image or the delimited source text.
fn build_messages(payload: &Payload) -> Vec<ChatMessage> {
    let user = match &payload.content {
        PayloadContent::Image(image) => ChatMessage::user_with_images("", vec![image.clone()]),
        PayloadContent::Text(text) => ChatMessage::user(format!("---\n{}\n---", text)),
    };
    vec![ChatMessage::system(payload.instruction.as_str()), user]
}

fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

/// API-key variable each well-known provider reads.
fn credential_var(provider: &str) -> Option<&'static str> {
    match provider {
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" => Some("ANTHROPIC_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        _ => None,
    }
}

/// Resolve the LLM provider: a pre-built one if the caller supplied it,
/// otherwise the named provider through `ProviderFactory`.
///
/// A missing credential is reported before the factory runs so the operator
/// sees which variable to set.
pub fn resolve_provider(config: &PipelineConfig) -> Result<Arc<dyn LLMProvider>, PipelineError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let name = config.provider_name.trim().to_lowercase();
    if let Some(var) = credential_var(&name) {
        let present = std::env::var(var).map(|v| !v.trim().is_empty()).unwrap_or(false);
        if !present {
            return Err(PipelineError::ProviderNotConfigured {
                provider: name,
                hint: format!("{var} is not set. Export it or add it to a .env file."),
            });
        }
    }

    ProviderFactory::create_llm_provider(&name, &config.model).map_err(|e| {
        PipelineError::ProviderNotConfigured {
            provider: name.clone(),
            hint: format!("{e}"),
        }
    })
}

// ── Error classification ─────────────────────────────────────────────────

static RE_RETRY_IN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)please retry in ([0-9]+(?:\.[0-9]+)?)s").unwrap());

static RE_RETRY_DELAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"retry_delay\W+seconds:\s*([0-9]+)").unwrap());

static RE_RETRY_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)retry[- ]after:?\s*([0-9]+(?:\.[0-9]+)?)").unwrap());

/// `Gemini API error (429 Too Many Requests): ...`, `HTTP 503`, `status: 500`,
/// or a bare code leading the message (`403 PERMISSION_DENIED: ...`).
static RE_STATUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:error:? \(?|\bhttp/?[0-9.]*\s+|\bstatus(?: code)?:?\s*|^\s*)([1-5][0-9]{2})\b",
    )
    .unwrap()
});

static RE_TRANSIENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:rate[ _]limit(?:ed)?|resource[ _]exhausted|quota|overloaded|unavailable|timed? ?out|connection (?:reset|refused|closed)|temporarily|internal error|try again)\b",
    )
    .unwrap()
});

static RE_PERMANENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:unauthori[sz]ed|unauthenticated|forbidden|permission[ _]denied|api key (?:not valid|expired)|invalid[ _]api[ _]key|invalid[ _]argument|bad request|content_filter|safety|not found|not supported)\b",
    )
    .unwrap()
});

/// Server-suggested delay embedded in an error message, plus a one-second
/// safety margin.
pub fn parse_retry_hint(message: &str) -> Option<Duration> {
    [&*RE_RETRY_IN, &*RE_RETRY_DELAY, &*RE_RETRY_AFTER]
        .iter()
        .find_map(|re| re.captures(message))
        .and_then(|caps| caps[1].parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| Duration::from_secs_f64(secs + 1.0))
}

/// Map a provider error onto a retry class.
pub fn classify_llm_error(err: &LlmError) -> InferenceError {
    match err {
        LlmError::AuthError(_)
        | LlmError::InvalidRequest(_)
        | LlmError::ModelNotFound(_)
        | LlmError::ConfigError(_)
        | LlmError::NotSupported(_)
        | LlmError::TokenLimitExceeded { .. } => InferenceError::permanent(err.to_string()),
        LlmError::RateLimited(msg) => InferenceError::Transient {
            message: err.to_string(),
            retry_after: parse_retry_hint(msg),
        },
        LlmError::NetworkError(_) | LlmError::Timeout | LlmError::SerializationError(_) => {
            InferenceError::transient(err.to_string())
        }
        LlmError::ApiError(_) | LlmError::ProviderError(_) | LlmError::Unknown(_) => {
            classify_error_message(&err.to_string())
        }
    }
}

/// Whether an HTTP status is worth retrying: 408, 429 and every 5xx.
fn status_is_transient(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

/// Sort a free-text provider error into transient or permanent.
///
/// An explicit HTTP status decides first. Without one, a retry hint or a
/// transient marker wins over a permanent marker: a quota error that also
/// says "invalid" is still a quota error.
pub fn classify_error_message(message: &str) -> InferenceError {
    let retry_after = parse_retry_hint(message);
    let status = RE_STATUS
        .captures(message)
        .and_then(|caps| caps[1].parse::<u16>().ok())
        .filter(|code| *code >= 400);

    let transient = match status {
        Some(code) => status_is_transient(code),
        None => {
            retry_after.is_some()
                || RE_TRANSIENT.is_match(message)
                || !RE_PERMANENT.is_match(message)
        }
    };

    if transient {
        InferenceError::Transient {
            message: message.to_string(),
            retry_after,
        }
    } else {
        InferenceError::permanent(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_transient() {
        let e = classify_error_message("API error 429: Resource has been exhausted (e.g. check quota).");
        assert!(e.is_retryable());
    }

    #[test]
    fn bad_key_is_permanent() {
        let e = classify_error_message("400 API key not valid. Please pass a valid API key.");
        assert!(matches!(e, InferenceError::Permanent { .. }));
        let e = classify_error_message("HTTP 401 Unauthorized");
        assert!(!e.is_retryable());
    }

    #[test]
    fn typed_auth_and_request_errors_are_permanent() {
        let auth = LlmError::AuthError("API key expired. Please renew the API key.".into());
        assert!(!classify_llm_error(&auth).is_retryable());
        let mime = LlmError::InvalidRequest("Unsupported MIME type: image/tiff".into());
        assert!(!classify_llm_error(&mime).is_retryable());
        let model = LlmError::ModelNotFound("gemini-9-ultra".into());
        assert!(!classify_llm_error(&model).is_retryable());
        let big = LlmError::TokenLimitExceeded { max: 1_048_576, got: 1_500_321 };
        assert!(!classify_llm_error(&big).is_retryable());
    }

    #[test]
    fn typed_transient_errors_are_retried() {
        assert!(classify_llm_error(&LlmError::Timeout).is_retryable());
        assert!(classify_llm_error(&LlmError::NetworkError("connection reset".into())).is_retryable());
        let limited = LlmError::RateLimited("Please retry in 9s.".into());
        assert_eq!(
            classify_llm_error(&limited).retry_after(),
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn gemini_status_in_parentheses_decides() {
        let quota = LlmError::ApiError(
            "Gemini API error (429): Resource has been exhausted (e.g. check quota).".into(),
        );
        assert!(classify_llm_error(&quota).is_retryable());
        let server = LlmError::ApiError("Gemini API error (503 Service Unavailable): {}".into());
        assert!(classify_llm_error(&server).is_retryable());
        let key = LlmError::ApiError(
            "Gemini API error (400): API key not valid. Please pass a valid API key.".into(),
        );
        assert!(matches!(classify_llm_error(&key), InferenceError::Permanent { .. }));
    }

    #[test]
    fn digits_inside_other_numbers_are_not_status_codes() {
        let e = classify_error_message(
            "403 PERMISSION_DENIED: Cloud Vision API has not been used in project 750429118 before",
        );
        assert!(matches!(e, InferenceError::Permanent { .. }));
        let e = classify_error_message(
            "400 INVALID_ARGUMENT: The input token count (1500321) exceeds the maximum",
        );
        assert!(matches!(e, InferenceError::Permanent { .. }));
    }

    #[test]
    fn unknown_error_is_transient() {
        let e = classify_error_message("something odd happened");
        assert_eq!(e, InferenceError::transient("something odd happened"));
    }

    #[test]
    fn retry_in_hint_parsed() {
        let hint = parse_retry_hint("429 quota exceeded. Please retry in 12.5s.");
        assert_eq!(hint, Some(Duration::from_secs_f64(13.5)));
    }

    #[test]
    fn retry_delay_block_parsed() {
        let msg = "429 ... retry_delay {\n  seconds: 7\n}";
        assert_eq!(parse_retry_hint(msg), Some(Duration::from_secs(8)));
    }

    #[test]
    fn retry_after_header_parsed() {
        assert_eq!(
            parse_retry_hint("503 Service Unavailable; Retry-After: 30"),
            Some(Duration::from_secs(31))
        );
        assert_eq!(parse_retry_hint("503 Service Unavailable"), None);
    }

    #[test]
    fn hint_makes_error_transient_and_carries_delay() {
        let e = classify_error_message("Please retry in 4s");
        assert_eq!(e.retry_after(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn missing_gemini_key_is_reported() {
        // Only meaningful when the variable is absent from the test environment.
        if std::env::var("GEMINI_API_KEY").is_ok() {
            return;
        }
        let config = PipelineConfig::default();
        match resolve_provider(&config) {
            Err(PipelineError::ProviderNotConfigured { provider, hint }) => {
                assert_eq!(provider, "gemini");
                assert!(hint.contains("GEMINI_API_KEY"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("provider should not resolve without a key"),
        }
    }

    #[test]
    fn text_payload_is_delimited() {
        let payload = Payload::text("Translate.", "Hallo Welt");
        match payload.content {
            PayloadContent::Text(ref t) => assert_eq!(t, "Hallo Welt"),
            PayloadContent::Image(_) => panic!("expected text"),
        }
        assert_eq!(build_messages(&payload).len(), 2);
    }
}
