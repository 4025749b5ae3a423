use std::time::Duration;

use thiserror::Error;

use crate::provider::types::Capability;

/// Error taxonomy for the retrieval and generation core.
///
/// Configuration errors (`NoProviderConfigured`, `InvalidConfig`) are fatal
/// and never retried. `AllProvidersExhausted` and
/// `SchemaValidationExhausted` are terminal per-call outcomes that callers
/// may surface as degraded service. Transient sub-retrieval failures are
/// recovered inside the components that encounter them and never reach this
/// type.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no provider configured for capability '{0}'")]
    NoProviderConfigured(Capability),

    #[error("all providers exhausted for capability '{capability}': {last_error}")]
    AllProvidersExhausted {
        capability: Capability,
        last_error: String,
    },

    #[error("generation did not match schema after {attempts} attempts: {last_error}")]
    SchemaValidationExhausted { attempts: u32, last_error: String },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("index error: {0}")]
    Index(String),
}

impl CoreError {
    pub fn provider<E: std::fmt::Display>(err: E) -> Self {
        CoreError::Provider(err.to_string())
    }

    pub fn index<E: std::fmt::Display>(err: E) -> Self {
        CoreError::Index(err.to_string())
    }
}
