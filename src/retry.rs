//! Retry scheduling: pacing, per-attempt timeout, exponential backoff and a
//! bounded attempt budget around any fallible remote operation.
//!
//! ## State machine
//!
//! ```text
//!              ┌───────────── Waiting { next_attempt, delay } ◀──┐
//!              ▼                                                  │ transient,
//!   Attempting { attempt } ──ok──▶ Succeeded                       │ budget left
//!              │                                                  │
//!              ├──permanent──▶ PermanentFailure                   │
//!              ├──transient, budget spent──▶ Exhausted            │
//!              └──────────────────────────────────────────────────┘
//! ```
//!
//! Every transition is decided by [`RetryPolicy::after_attempt`], a pure
//! function, so the policy is testable without a network or a clock. The
//! [`RetryScheduler`] only drives the machine: it paces, calls, sleeps.
//!
//! ## Backoff
//!
//! After failed attempt `n` (1-based) the scheduler sleeps
//! `min(cap, base · 2^(n-1))`: with the defaults 2 s → 4 s → 8 s … 60 s.
//! When the service suggested a delay ("Please retry in 12s") that delay is
//! used instead, still capped. No sleep follows the final attempt.

use crate::error::{InferenceError, RetryError};
use crate::pacing::RateLimiter;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Attempt budget and backoff curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included. Always ≥ 1.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            backoff_base: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(60),
        }
    }
}

/// One state of a retry run. See the module docs for the transitions.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryState<T> {
    Attempting {
        attempt: u32,
    },
    Waiting {
        next_attempt: u32,
        delay: Duration,
        error: InferenceError,
    },
    Succeeded {
        value: T,
        attempts: u32,
    },
    PermanentFailure {
        attempts: u32,
        error: InferenceError,
    },
    Exhausted {
        attempts: u32,
        last_error: InferenceError,
    },
}

impl RetryPolicy {
    /// Backoff after failed attempt `attempt` (1-based), ignoring server hints.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.backoff_base
            .checked_mul(1u32 << exp)
            .unwrap_or(self.backoff_cap)
            .min(self.backoff_cap)
    }

    /// Delay before the attempt following a failed `attempt`.
    pub fn delay_after(&self, attempt: u32, error: &InferenceError) -> Duration {
        error
            .retry_after()
            .unwrap_or_else(|| self.backoff_for(attempt))
            .min(self.backoff_cap)
    }

    /// Decide the next state from the outcome of attempt `attempt`.
    pub fn after_attempt<T>(&self, attempt: u32, outcome: Result<T, InferenceError>) -> RetryState<T> {
        match outcome {
            Ok(value) => RetryState::Succeeded {
                value,
                attempts: attempt,
            },
            Err(error) if !error.is_retryable() => RetryState::PermanentFailure {
                attempts: attempt,
                error,
            },
            Err(error) if attempt >= self.max_attempts.max(1) => RetryState::Exhausted {
                attempts: attempt,
                last_error: error,
            },
            Err(error) => RetryState::Waiting {
                next_attempt: attempt + 1,
                delay: self.delay_after(attempt, &error),
                error,
            },
        }
    }
}

/// Drives the retry state machine against a live operation.
///
/// Cloning is cheap and keeps the same pacing gate.
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    policy: RetryPolicy,
    limiter: Arc<RateLimiter>,
    attempt_timeout: Option<Duration>,
}

impl RetryScheduler {
    pub fn new(policy: RetryPolicy, limiter: Arc<RateLimiter>) -> Self {
        Self {
            policy,
            limiter,
            attempt_timeout: None,
        }
    }

    /// Abort any single attempt that runs longer than `limit`.
    pub fn with_attempt_timeout(mut self, limit: Option<Duration>) -> Self {
        self.attempt_timeout = limit;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run `operation` until it succeeds, fails permanently, or the attempt
    /// budget is spent. `label` only appears in log lines.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, InferenceError>>,
    {
        let max = self.policy.max_attempts.max(1);
        let mut state = RetryState::Attempting { attempt: 1 };

        loop {
            state = match state {
                RetryState::Attempting { attempt } => {
                    self.limiter.acquire().await;
                    debug!("{}: attempt {}/{}", label, attempt, max);
                    let outcome = self.attempt(&mut operation).await;
                    self.policy.after_attempt(attempt, outcome)
                }
                RetryState::Waiting {
                    next_attempt,
                    delay,
                    error,
                } => {
                    warn!(
                        "{}: attempt {}/{} failed: {}; retrying in {:.1}s",
                        label,
                        next_attempt - 1,
                        max,
                        error,
                        delay.as_secs_f64()
                    );
                    sleep(delay).await;
                    RetryState::Attempting {
                        attempt: next_attempt,
                    }
                }
                RetryState::Succeeded { value, attempts } => {
                    if attempts > 1 {
                        debug!("{}: succeeded after {} attempts", label, attempts);
                    }
                    return Ok(value);
                }
                RetryState::PermanentFailure { attempts, error } => {
                    warn!("{}: not retrying: {}", label, error);
                    return Err(RetryError::Permanent {
                        attempts,
                        source: error,
                    });
                }
                RetryState::Exhausted {
                    attempts,
                    last_error,
                } => {
                    warn!(
                        "{}: giving up after {} attempts: {}",
                        label, attempts, last_error
                    );
                    return Err(RetryError::RetriesExhausted {
                        attempts,
                        last_error,
                    });
                }
            };
        }
    }

    async fn attempt<T, F, Fut>(&self, operation: &mut F) -> Result<T, InferenceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, InferenceError>>,
    {
        match self.attempt_timeout {
            Some(limit) => match timeout(limit, operation()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(InferenceError::Timeout { limit }),
            },
            None => operation().await,
        }
    }
}
