//! Resilient retrieval and generation core.
//!
//! Routes AI model calls across multiple providers with per-provider
//! circuit breakers and ordered fallback, and turns raw user queries into
//! ranked, token-budgeted context: query rewriting, hybrid
//! vector-plus-lexical retrieval, and sentence-extractive compression.
//! Schema-shaped generation goes through [`provider::StructuredGenerator`],
//! which retries with corrective feedback until the output validates.
//!
//! The router is explicitly constructed and passed by handle; there are no
//! process-wide registries. Index and store backends are trait
//! collaborators; in-memory implementations live in [`retrieval::memory`].

pub mod core;
pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod retrieval;

pub use crate::core::config::CoreConfig;
pub use crate::core::errors::CoreError;
pub use crate::ingest::{Chunk, Ingestor, SemanticChunker, SourceRef};
pub use crate::pipeline::RetrievalPipeline;
pub use crate::provider::{
    Capability, ChatMessage, ChatRequest, CircuitBreaker, CircuitState, ProviderConfig,
    ProviderEndpoint, ProviderRouter, StructuredGenerator,
};
pub use crate::retrieval::{
    CompressedContext, ContentStore, HybridSearch, LexicalIndex, SearchFilters, SearchResult,
    VectorIndex,
};
