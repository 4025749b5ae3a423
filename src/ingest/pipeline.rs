//! Ingestion pipeline: raw source text in, indexed chunks out.
//!
//! Runs independently of the query path, typically at document save or
//! import time. Embedding failures degrade per document rather than
//! aborting it: chunks are still stored and lexically searchable, and can
//! be re-embedded later.

use std::sync::Arc;

use crate::core::errors::CoreError;
use crate::ingest::chunker::SemanticChunker;
use crate::provider::router::ProviderRouter;
use crate::retrieval::index::{ContentStore, LexicalIndex, VectorIndex};

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestReport {
    pub chunks: usize,
    pub embedded: usize,
}

pub struct Ingestor {
    chunker: SemanticChunker,
    router: Arc<ProviderRouter>,
    store: Arc<dyn ContentStore>,
    vector: Arc<dyn VectorIndex>,
    lexical: Arc<dyn LexicalIndex>,
}

impl Ingestor {
    pub fn new(
        chunker: SemanticChunker,
        router: Arc<ProviderRouter>,
        store: Arc<dyn ContentStore>,
        vector: Arc<dyn VectorIndex>,
        lexical: Arc<dyn LexicalIndex>,
    ) -> Self {
        Self {
            chunker,
            router,
            store,
            vector,
            lexical,
        }
    }

    /// Ingest `text` under `source_id`: store the raw text, chunk it,
    /// embed the chunks, and index them. Replaces any previous chunks for
    /// the same source.
    pub async fn ingest_text(&self, source_id: &str, text: &str) -> Result<IngestReport, CoreError> {
        self.store.put(source_id, text).await?;

        let mut chunks = self.chunker.chunk(text, source_id);
        if chunks.is_empty() {
            return Ok(IngestReport::default());
        }

        let inputs: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let mut embedded = 0;
        match self.router.embed(&inputs).await {
            Ok(vectors) if vectors.len() == chunks.len() => {
                for (chunk, vector) in chunks.iter_mut().zip(vectors) {
                    chunk.embedding = Some(vector);
                    embedded += 1;
                }
            }
            Ok(vectors) => {
                tracing::warn!(
                    source = source_id,
                    expected = chunks.len(),
                    got = vectors.len(),
                    "embedding count mismatch, storing chunks without embeddings"
                );
            }
            Err(err) => {
                tracing::warn!(
                    source = source_id,
                    error = %err,
                    "embedding unavailable, storing chunks without embeddings"
                );
            }
        }

        // Old chunks for this source are superseded wholesale; spans and
        // positions from a previous version must not linger.
        self.vector.remove_source(source_id).await?;
        self.lexical.remove_source(source_id).await?;
        self.vector.upsert(&chunks).await?;
        self.lexical.upsert(&chunks).await?;

        tracing::debug!(
            source = source_id,
            chunks = chunks.len(),
            embedded,
            "source ingested"
        );
        Ok(IngestReport {
            chunks: chunks.len(),
            embedded,
        })
    }

    /// Ingest a source already present in the content store.
    pub async fn ingest_source(&self, source_id: &str) -> Result<IngestReport, CoreError> {
        let text = self
            .store
            .fetch(source_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("source '{source_id}'")))?;
        self.ingest_text(source_id, &text).await
    }

    /// Remove a deleted source and all chunks derived from it.
    pub async fn remove_source(&self, source_id: &str) -> Result<(), CoreError> {
        self.vector.remove_source(source_id).await?;
        self.lexical.remove_source(source_id).await?;
        self.store.remove(source_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::ingest::chunker::ChunkerConfig;
    use crate::provider::endpoint::ProviderEndpoint;
    use crate::provider::types::{Capability, ChatRequest, ProviderConfig};
    use crate::retrieval::index::SearchFilters;
    use crate::retrieval::memory::{MemoryContentStore, MemoryLexicalIndex, MemoryVectorIndex};

    struct EmbedEndpoint {
        fail: bool,
    }

    #[async_trait]
    impl ProviderEndpoint for EmbedEndpoint {
        fn id(&self) -> &str {
            "embed"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<String, CoreError> {
            Err(CoreError::Provider("not a chat endpoint".to_string()))
        }

        async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
            if self.fail {
                return Err(CoreError::Provider("embedding down".to_string()));
            }
            Ok(inputs.iter().map(|text| vec![text.len() as f32, 1.0]).collect())
        }
    }

    fn ingestor(embed_fails: bool) -> (Ingestor, Arc<MemoryVectorIndex>, Arc<MemoryLexicalIndex>) {
        let mut router = ProviderRouter::new();
        router
            .register(
                ProviderConfig {
                    id: "embed".to_string(),
                    capability: Capability::Embedding,
                    priority: 0,
                    timeout_ms: 1000,
                    max_tokens: 16,
                    base_url: "http://localhost:9999".to_string(),
                    model: "mock".to_string(),
                    api_key: None,
                },
                Arc::new(EmbedEndpoint { fail: embed_fails }),
            )
            .expect("register");

        let vector = Arc::new(MemoryVectorIndex::new());
        let lexical = Arc::new(MemoryLexicalIndex::new());
        let ingestor = Ingestor::new(
            SemanticChunker::new(ChunkerConfig {
                max_chunk_bytes: 100,
                min_chunk_bytes: 10,
            }),
            Arc::new(router),
            Arc::new(MemoryContentStore::new()),
            vector.clone(),
            lexical.clone(),
        );
        (ingestor, vector, lexical)
    }

    #[tokio::test]
    async fn ingests_chunks_with_embeddings() {
        let (ingestor, vector, _) = ingestor(false);
        let report = ingestor
            .ingest_text("doc", "First paragraph right here.\n\nSecond paragraph over there.")
            .await
            .expect("ingest");

        assert!(report.chunks > 0);
        assert_eq!(report.chunks, report.embedded);
        let hits = vector
            .search(&[30.0, 1.0], 10, &SearchFilters::default())
            .await
            .expect("search");
        assert_eq!(hits.len(), report.chunks);
    }

    #[tokio::test]
    async fn embedding_failure_still_stores_lexical_chunks() {
        let (ingestor, vector, lexical) = ingestor(true);
        let report = ingestor
            .ingest_text("doc", "Searchable paragraph about rust ownership.")
            .await
            .expect("ingest");

        assert!(report.chunks > 0);
        assert_eq!(report.embedded, 0);

        let vector_hits = vector
            .search(&[1.0, 1.0], 10, &SearchFilters::default())
            .await
            .expect("search");
        assert!(vector_hits.is_empty());

        let lexical_hits = lexical
            .search("rust ownership", 10, &SearchFilters::default())
            .await
            .expect("search");
        assert_eq!(lexical_hits.len(), report.chunks);
    }

    #[tokio::test]
    async fn empty_source_yields_empty_report() {
        let (ingestor, _, _) = ingestor(false);
        let report = ingestor.ingest_text("doc", "   ").await.expect("ingest");
        assert_eq!(report.chunks, 0);
    }

    #[tokio::test]
    async fn reingest_replaces_previous_chunks() {
        let (ingestor, _, lexical) = ingestor(false);
        ingestor
            .ingest_text("doc", "Original text about gardening.")
            .await
            .expect("ingest");
        ingestor
            .ingest_text("doc", "Replacement text about sailing.")
            .await
            .expect("ingest");

        let old = lexical
            .search("gardening", 10, &SearchFilters::default())
            .await
            .expect("search");
        assert!(old.is_empty());
        let new = lexical
            .search("sailing", 10, &SearchFilters::default())
            .await
            .expect("search");
        assert!(!new.is_empty());
    }

    #[tokio::test]
    async fn missing_source_is_not_found() {
        let (ingestor, _, _) = ingestor(false);
        let err = ingestor.ingest_source("ghost").await.expect_err("must fail");
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn remove_source_clears_everything() {
        let (ingestor, _, lexical) = ingestor(false);
        ingestor
            .ingest_text("doc", "Text about volcanoes erupting.")
            .await
            .expect("ingest");
        ingestor.remove_source("doc").await.expect("remove");

        let hits = lexical
            .search("volcanoes", 10, &SearchFilters::default())
            .await
            .expect("search");
        assert!(hits.is_empty());
        let err = ingestor.ingest_source("doc").await.expect_err("must fail");
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
