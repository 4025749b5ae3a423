//! Capability-keyed provider routing with ordered fallback.
//!
//! Providers are registered per capability and tried in priority order.
//! Each candidate is gated by its circuit breaker and invoked under its
//! configured timeout; the first success wins and no further candidates
//! are tried. The fallback loop is deliberately sequential: candidates
//! tend to fail for shared root causes, and a parallel fan-out would burn
//! quota without improving first-success latency.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::breaker::{BreakerStatus, CircuitBreaker, DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT};
use super::endpoint::ProviderEndpoint;
use super::openai::OpenAiEndpoint;
use super::types::{Capability, ChatRequest, ProviderConfig};
use crate::core::config::CoreConfig;
use crate::core::errors::CoreError;

struct Registered {
    config: ProviderConfig,
    endpoint: Arc<dyn ProviderEndpoint>,
    breaker: CircuitBreaker,
}

/// Records a breaker failure when a routed call is dropped mid-flight,
/// e.g. by a caller-side deadline racing the router's own timeout. The
/// provider hung against a real caller either way, and that signal must
/// reach the breaker. Disarmed once the call resolves and its outcome is
/// recorded directly.
struct AbandonGuard<'a> {
    breaker: &'a CircuitBreaker,
    provider: &'a str,
    armed: bool,
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.on_failure();
            tracing::warn!(
                provider = %self.provider,
                "provider call abandoned before completion, recording breaker failure"
            );
        }
    }
}

/// Router over all configured providers.
///
/// Explicitly constructed and passed by handle; owns one breaker per
/// provider and no other mutable state. Construct once at startup,
/// share via `Arc`.
pub struct ProviderRouter {
    failure_threshold: u32,
    reset_timeout: Duration,
    providers: HashMap<Capability, Vec<Registered>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::with_breaker_settings(DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT)
    }

    /// Breaker settings applied to every provider registered afterwards.
    pub fn with_breaker_settings(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            providers: HashMap::new(),
        }
    }

    /// Register a provider with a custom endpoint implementation.
    ///
    /// Validates the configuration up front; a rejected config never
    /// enters the candidate list.
    pub fn register(
        &mut self,
        config: ProviderConfig,
        endpoint: Arc<dyn ProviderEndpoint>,
    ) -> Result<(), CoreError> {
        config.validate()?;
        let breaker = CircuitBreaker::new(self.failure_threshold, self.reset_timeout);
        let list = self.providers.entry(config.capability).or_default();
        list.push(Registered {
            config,
            endpoint,
            breaker,
        });
        list.sort_by_key(|registered| registered.config.priority);
        Ok(())
    }

    /// Register a provider backed by an OpenAI-compatible HTTP endpoint.
    pub fn register_openai(&mut self, config: ProviderConfig) -> Result<(), CoreError> {
        let endpoint = Arc::new(OpenAiEndpoint::new(&config));
        self.register(config, endpoint)
    }

    /// Build a router from a loaded configuration: breaker settings from
    /// `config.breaker`, every `[[providers]]` entry registered as an
    /// OpenAI-compatible endpoint.
    pub fn from_config(config: &CoreConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let mut router = Self::with_breaker_settings(
            config.breaker.failure_threshold,
            config.breaker.reset_timeout(),
        );
        for provider in &config.providers {
            router.register_openai(provider.clone())?;
        }
        Ok(router)
    }

    /// Chat completion through the fallback chain.
    pub async fn chat(
        &self,
        capability: Capability,
        request: &ChatRequest,
    ) -> Result<String, CoreError> {
        self.route(capability, |endpoint| async move { endpoint.chat(request).await })
            .await
    }

    /// Embeddings through the fallback chain.
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        self.route(Capability::Embedding, |endpoint| async move {
            endpoint.embed(inputs).await
        })
        .await
    }

    /// Breaker snapshot for one provider, for diagnostics.
    pub fn breaker_status(&self, provider_id: &str) -> Option<BreakerStatus> {
        self.providers
            .values()
            .flatten()
            .find(|registered| registered.config.id == provider_id)
            .map(|registered| registered.breaker.status())
    }

    pub fn provider_count(&self, capability: Capability) -> usize {
        self.providers
            .get(&capability)
            .map(Vec::len)
            .unwrap_or(0)
    }

    async fn route<T, Fut>(
        &self,
        capability: Capability,
        op: impl Fn(Arc<dyn ProviderEndpoint>) -> Fut,
    ) -> Result<T, CoreError>
    where
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let candidates = self
            .providers
            .get(&capability)
            .filter(|list| !list.is_empty())
            .ok_or(CoreError::NoProviderConfigured(capability))?;

        let mut last_error: Option<CoreError> = None;
        for registered in candidates {
            if !registered.breaker.can_execute() {
                tracing::debug!(
                    provider = %registered.config.id,
                    "skipping provider, circuit breaker open"
                );
                continue;
            }

            let timeout = registered.config.timeout();
            let attempt = op(Arc::clone(&registered.endpoint));
            let mut guard = AbandonGuard {
                breaker: &registered.breaker,
                provider: &registered.config.id,
                armed: true,
            };
            let outcome = tokio::time::timeout(timeout, attempt).await;
            guard.armed = false;
            match outcome {
                Ok(Ok(value)) => {
                    registered.breaker.on_success();
                    return Ok(value);
                }
                Ok(Err(err)) => {
                    registered.breaker.on_failure();
                    tracing::warn!(
                        provider = %registered.config.id,
                        error = %err,
                        "provider call failed, trying next candidate"
                    );
                    last_error = Some(err);
                }
                Err(_) => {
                    // The timeout is a true reliability signal; record it
                    // even though the in-flight request was abandoned.
                    registered.breaker.on_failure();
                    tracing::warn!(
                        provider = %registered.config.id,
                        timeout_ms = timeout.as_millis() as u64,
                        "provider call timed out, trying next candidate"
                    );
                    last_error = Some(CoreError::Timeout(timeout));
                }
            }
        }

        Err(CoreError::AllProvidersExhausted {
            capability,
            last_error: last_error
                .map(|err| err.to_string())
                .unwrap_or_else(|| "all circuit breakers open".to_string()),
        })
    }
}

impl Default for ProviderRouter {
    fn default() -> Self {
        Self::new()
    }
}
