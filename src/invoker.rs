//! Resilient provider invoker
//!
//! Delivers one logical chat request to the first model in a priority-ordered list that
//! answers. Each model gets `max_retries + 1` attempts with escalating timeouts; a rate
//! limit abandons the model immediately. The invoker keeps no state between calls.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::clients::traits::{BackendError, ChatBackend, ChatRequest};

/// Injectable resilience policy: model order, timeout ladder and retry budget
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRegistry {
    pub models: Vec<String>,
    pub timeout_tiers: Vec<Duration>,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl ProviderRegistry {
    /// Timeout for the given zero-based attempt on one model, capped at the last tier
    pub fn timeout_for(&self, attempt_index: usize) -> Duration {
        self.timeout_tiers
            .get(attempt_index)
            .or_else(|| self.timeout_tiers.last())
            .copied()
            .unwrap_or(Duration::from_secs(30))
    }

    pub fn attempts_per_model(&self) -> usize {
        self.max_retries as usize + 1
    }

    /// Upper bound on one `invoke` call that ends in exhaustion: every attempt on every
    /// model runs to its timeout, with the retry delay between attempts on a model
    pub fn worst_case(&self) -> Duration {
        let attempts = self.attempts_per_model();
        let per_model = (0..attempts).map(|i| self.timeout_for(i)).sum::<Duration>()
            + self.retry_delay * (attempts - 1) as u32;
        per_model * self.models.len() as u32
    }
}

/// One failed attempt, recorded while walking the model list
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{model} attempt {attempt_index}: {cause}")]
pub struct ProviderAttemptError {
    pub model: String,
    pub attempt_index: usize,
    pub cause: String,
}

#[derive(Debug, Error)]
pub enum InvokerError {
    #[error("no models configured")]
    NoModels,
    #[error("all models exhausted after {attempts} attempts; last error: {last}")]
    Exhausted {
        attempts: usize,
        last: ProviderAttemptError,
    },
}

/// Successful delivery
#[derive(Debug, Clone)]
pub struct Invocation {
    pub content: String,
    pub model: String,
    /// Total attempts made across all models, including the successful one
    pub attempts: usize,
}

#[derive(Clone)]
pub struct ResilientInvoker {
    backend: Arc<dyn ChatBackend>,
    registry: ProviderRegistry,
}

impl ResilientInvoker {
    pub fn new(backend: Arc<dyn ChatBackend>, registry: ProviderRegistry) -> Self {
        Self { backend, registry }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &Arc<dyn ChatBackend> {
        &self.backend
    }

    pub async fn invoke(&self, request: &ChatRequest) -> Result<Invocation, InvokerError> {
        if self.registry.models.is_empty() {
            return Err(InvokerError::NoModels);
        }

        let mut failures: Vec<ProviderAttemptError> = Vec::new();

        for model in &self.registry.models {
            for attempt_index in 0..self.registry.attempts_per_model() {
                if attempt_index > 0 && !self.registry.retry_delay.is_zero() {
                    tokio::time::sleep(self.registry.retry_delay).await;
                }

                let timeout = self.registry.timeout_for(attempt_index);
                debug!(
                    backend = self.backend.name(),
                    model = %model,
                    attempt = attempt_index,
                    timeout_ms = timeout.as_millis() as u64,
                    "invoking model"
                );

                let outcome =
                    match tokio::time::timeout(timeout, self.backend.complete(model, request, timeout))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(BackendError::Timeout {
                            timeout_ms: timeout.as_millis() as u64,
                        }),
                    };

                match outcome {
                    Ok(content) => {
                        debug!(
                            model = %model,
                            attempt = attempt_index,
                            prior_failures = failures.len(),
                            "model answered"
                        );
                        return Ok(Invocation {
                            content,
                            model: model.clone(),
                            attempts: failures.len() + 1,
                        });
                    }
                    Err(err) => {
                        warn!(model = %model, attempt = attempt_index, error = %err, "model attempt failed");
                        let retryable = err.is_retryable();
                        failures.push(ProviderAttemptError {
                            model: model.clone(),
                            attempt_index,
                            cause: err.to_string(),
                        });
                        if !retryable {
                            // Rate limits skip straight to the next model
                            break;
                        }
                    }
                }
            }
        }

        let attempts = failures.len();
        let last = failures.pop().unwrap_or_else(|| ProviderAttemptError {
            model: String::new(),
            attempt_index: 0,
            cause: "no attempts made".to_string(),
        });
        error!(attempts, last = %last, "all models exhausted");
        Err(InvokerError::Exhausted { attempts, last })
    }
}
