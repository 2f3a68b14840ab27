//! Configuration types for the OCR and translation pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. The binary maps CLI flags and their
//! `SCANLATE_*` environment variables onto the builder; library callers set
//! only the knobs they care about and keep the documented defaults for the
//! rest.

use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use crate::retry::RetryPolicy;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default provider name passed to `ProviderFactory`.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Default model: cheap, fast, and good enough at German scans.
pub const DEFAULT_MODEL: &str = "gemini-flash-lite-latest";

/// Configuration for an OCR or translation run.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use scanlate::PipelineConfig;
/// use std::time::Duration;
///
/// let config = PipelineConfig::builder()
///     .request_interval(Duration::from_secs(2))
///     .max_attempts(5)
///     .model("gemini-2.0-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// LLM provider name (e.g. "gemini", "openai", "anthropic", "ollama").
    /// Default: "gemini". Ignored when `provider` is set.
    pub provider_name: String,

    /// LLM model identifier. Default: "gemini-flash-lite-latest".
    pub model: String,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Minimum spacing between two consecutive remote calls. Default: 5 s.
    ///
    /// Applies to every call made through one scheduler, retries included.
    /// 5 s keeps a single worker under 12 requests per minute, the free-tier
    /// quota of the default model.
    pub request_interval: Duration,

    /// Maximum number of attempts per page, the first one included. Default: 12.
    pub max_attempts: u32,

    /// First backoff delay after a transient failure. Default: 2 s.
    ///
    /// Doubles after each failed attempt: 2 s → 4 s → 8 s … up to `backoff_cap`.
    pub backoff_base: Duration,

    /// Upper bound on any single backoff sleep. Default: 60 s.
    pub backoff_cap: Duration,

    /// Per-attempt timeout in seconds; 0 disables it. Default: 60.
    ///
    /// A timed-out attempt counts as a transient failure and is retried.
    pub api_timeout_secs: u64,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Longest edge of a rendered page image in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Keep the pages of an existing compatible snapshot and continue after
    /// them instead of starting over. Default: false.
    pub resume: bool,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider: None,
            request_interval: Duration::from_secs(5),
            max_attempts: 12,
            backoff_base: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(60),
            api_timeout_secs: 60,
            temperature: 0.1,
            max_tokens: 4096,
            max_rendered_pixels: 2000,
            password: None,
            resume: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("request_interval", &self.request_interval)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base", &self.backoff_base)
            .field("backoff_cap", &self.backoff_cap)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("resume", &self.resume)
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// The retry policy described by this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff_base: self.backoff_base,
            backoff_cap: self.backoff_cap,
        }
    }

    /// Per-attempt timeout, `None` when disabled.
    pub fn attempt_timeout(&self) -> Option<Duration> {
        (self.api_timeout_secs > 0).then(|| Duration::from_secs(self.api_timeout_secs))
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn request_interval(mut self, interval: Duration) -> Self {
        self.config.request_interval = interval;
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.config.backoff_base = base;
        self
    }

    pub fn backoff_cap(mut self, cap: Duration) -> Self {
        self.config.backoff_cap = cap;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn resume(mut self, v: bool) -> Self {
        self.config.resume = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.max_attempts == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.backoff_base > c.backoff_cap {
            return Err(PipelineError::InvalidConfig(format!(
                "backoff base ({:?}) exceeds backoff cap ({:?})",
                c.backoff_base, c.backoff_cap
            )));
        }
        if c.provider.is_none() && c.provider_name.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "provider name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = PipelineConfig::default();
        assert_eq!(c.provider_name, "gemini");
        assert_eq!(c.model, "gemini-flash-lite-latest");
        assert_eq!(c.request_interval, Duration::from_secs(5));
        assert_eq!(c.max_attempts, 12);
        assert_eq!(c.backoff_base, Duration::from_secs(2));
        assert_eq!(c.backoff_cap, Duration::from_secs(60));
        assert_eq!(c.attempt_timeout(), Some(Duration::from_secs(60)));
        assert!(!c.resume);
    }

    #[test]
    fn zero_timeout_disables_it() {
        let c = PipelineConfig::builder().api_timeout_secs(0).build().unwrap();
        assert_eq!(c.attempt_timeout(), None);
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = PipelineConfig::builder().max_attempts(0).build().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn base_above_cap_rejected() {
        let err = PipelineConfig::builder()
            .backoff_base(Duration::from_secs(90))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("backoff"));
    }

    #[test]
    fn retry_policy_mirrors_config() {
        let c = PipelineConfig::builder()
            .max_attempts(3)
            .backoff_base(Duration::from_millis(500))
            .backoff_cap(Duration::from_secs(4))
            .build()
            .unwrap();
        let p = c.retry_policy();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.backoff_base, Duration::from_millis(500));
        assert_eq!(p.backoff_cap, Duration::from_secs(4));
    }

    #[test]
    fn temperature_is_clamped() {
        let c = PipelineConfig::builder().temperature(7.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }
}
