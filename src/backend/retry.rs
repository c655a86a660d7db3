//! Opt-in bounded retry around another backend.
use super::ModelBackend;
use crate::config::RetryConfig;
use crate::error::BackendError;
use std::thread;
use std::time::Duration;

/// Cap on the backoff exponent so the shift cannot overflow.
const MAX_BACKOFF_EXPONENT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms.max(config.base_delay_ms),
        }
    }

    /// Delay after the given failed attempt (1-based): base, base*2, base*4, ... capped.
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        let backoff_ms = self
            .base_delay_ms
            .saturating_mul(1_u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(backoff_ms)
    }
}

/// Retries transient failures of the wrapped backend.
///
/// Only errors for which [`BackendError::is_transient`] holds are retried; the
/// last error is returned once attempts run out.
pub struct RetryingBackend {
    inner: Box<dyn ModelBackend>,
    policy: RetryPolicy,
}

impl RetryingBackend {
    pub fn new(inner: Box<dyn ModelBackend>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl ModelBackend for RetryingBackend {
    fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let mut attempt = 1;
        loop {
            match self.inner.generate(prompt) {
                Ok(text) => return Ok(text),
                Err(err) if err.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "model call failed; retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}
