//! AI provider layer: typed provider configuration, per-provider circuit
//! breakers, priority-ordered fallback routing, and schema-validated
//! structured generation.

pub mod breaker;
pub mod endpoint;
pub mod openai;
pub mod router;
pub mod structured;
pub mod types;

pub use breaker::{BreakerStatus, CircuitBreaker, CircuitState};
pub use endpoint::ProviderEndpoint;
pub use openai::OpenAiEndpoint;
pub use router::ProviderRouter;
pub use structured::StructuredGenerator;
pub use types::{Capability, ChatMessage, ChatRequest, ProviderConfig};
