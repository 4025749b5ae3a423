//! Collaborator contracts for the retrieval path.
//!
//! The core does not prescribe a concrete index implementation; it only
//! requires these contracts from one. In-memory implementations live in
//! [`memory`](super::memory) and back the tests.

use async_trait::async_trait;

use crate::core::errors::CoreError;
use crate::ingest::chunker::Chunk;

/// Constraints applied to both sub-retrievals of a hybrid search.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Restrict results to chunks from these sources. None means no
    /// restriction.
    pub source_ids: Option<Vec<String>>,
}

impl SearchFilters {
    pub fn matches(&self, chunk: &Chunk) -> bool {
        match &self.source_ids {
            Some(ids) => ids.iter().any(|id| id == &chunk.source.source_id),
            None => true,
        }
    }
}

/// A raw candidate from one retrieval signal, before normalization.
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// Similarity lookup over embedding vectors (cosine distance).
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<IndexHit>, CoreError>;

    async fn upsert(&self, chunks: &[Chunk]) -> Result<(), CoreError>;

    async fn remove_source(&self, source_id: &str) -> Result<(), CoreError>;
}

/// Full-text lookup over chunk text.
#[async_trait]
pub trait LexicalIndex: Send + Sync {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<IndexHit>, CoreError>;

    async fn upsert(&self, chunks: &[Chunk]) -> Result<(), CoreError>;

    async fn remove_source(&self, source_id: &str) -> Result<(), CoreError>;
}

/// Store of raw source text, keyed by stable source identifier.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn fetch(&self, source_id: &str) -> Result<Option<String>, CoreError>;

    async fn put(&self, source_id: &str, text: &str) -> Result<(), CoreError>;

    async fn remove(&self, source_id: &str) -> Result<(), CoreError>;
}
