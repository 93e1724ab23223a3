//! Retry-with-timeout policy for language-model calls.
//!
//! Every attempt gets its own timeout. Retryable failures (timeouts, transport errors,
//! 429/5xx, malformed replies) are retried up to `max_attempts` in total; anything else
//! fails immediately. Once the budget is spent the last error is classified as either
//! `Unavailable` (the provider never produced a usable answer in time) or `Protocol`.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::config::ModelSettings;
use crate::llm_client::LlmError;

/// Terminal outcome of a model call after the retry budget is exhausted.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelFailure {
    #[error("model unavailable after {attempts} attempt(s): {message}")]
    Unavailable { attempts: u32, message: String },

    #[error("model reply unusable after {attempts} attempt(s): {message}")]
    Protocol { attempts: u32, message: String },
}

impl ModelFailure {
    fn from_last_error(attempts: u32, err: &LlmError) -> Self {
        let message = err.to_string();
        if err.is_unavailable() {
            ModelFailure::Unavailable { attempts, message }
        } else {
            ModelFailure::Protocol { attempts, message }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    /// Fixed pause after transport-level failures. Malformed replies retry immediately.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ModelSettings::default())
    }
}

impl From<&ModelSettings> for RetryPolicy {
    fn from(settings: &ModelSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            attempt_timeout: settings.attempt_timeout,
            retry_delay: settings.retry_delay,
        }
    }
}

impl RetryPolicy {
    /// Runs `attempt` until it succeeds, fails with a non-retryable error, or the budget runs out.
    ///
    /// `operation` only labels log lines.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> Result<T, ModelFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt_no = 0;

        loop {
            attempt_no += 1;

            let outcome = match tokio::time::timeout(self.attempt_timeout, attempt()).await {
                Ok(result) => result,
                Err(_) => Err(LlmError::Timeout(self.attempt_timeout)),
            };

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt_no >= max_attempts {
                warn!("{operation} failed on attempt {attempt_no}/{max_attempts}: {err}");
                return Err(ModelFailure::from_last_error(attempt_no, &err));
            }

            warn!("{operation} attempt {attempt_no}/{max_attempts} failed, retrying: {err}");

            if err.is_unavailable() && !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
    }
}
