//! End-to-end flow over in-memory backends: ingest documents, then answer
//! queries through the full rewrite -> hybrid search -> compress pipeline,
//! with providers mocked at the endpoint seam.

use std::sync::Arc;

use async_trait::async_trait;

use ragkit::core::config::CoreConfig;
use ragkit::ingest::chunker::{ChunkerConfig, SemanticChunker};
use ragkit::ingest::pipeline::Ingestor;
use ragkit::provider::endpoint::ProviderEndpoint;
use ragkit::provider::router::ProviderRouter;
use ragkit::provider::types::{Capability, ChatRequest, ProviderConfig};
use ragkit::retrieval::memory::{MemoryContentStore, MemoryLexicalIndex, MemoryVectorIndex};
use ragkit::{CoreError, RetrievalPipeline};

/// Embedding endpoint with a tiny fixed vocabulary: each dimension counts
/// occurrences of one topic word, so related texts land near each other.
struct VocabEmbedder;

const VOCAB: [&str; 4] = ["rust", "ownership", "garden", "soil"];

#[async_trait]
impl ProviderEndpoint for VocabEmbedder {
    fn id(&self) -> &str {
        "vocab-embed"
    }

    async fn chat(&self, _request: &ChatRequest) -> Result<String, CoreError> {
        Err(CoreError::Provider("not a chat endpoint".to_string()))
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        Ok(inputs
            .iter()
            .map(|text| {
                let lower = text.to_lowercase();
                VOCAB
                    .iter()
                    .map(|word| lower.matches(word).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Fast-chat endpoint that echoes the query portion of the prompt back,
/// standing in for a rewriter model that leaves the query alone.
struct EchoRewriter;

#[async_trait]
impl ProviderEndpoint for EchoRewriter {
    fn id(&self) -> &str {
        "echo-rewriter"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String, CoreError> {
        let prompt = &request.messages.last().expect("user message").content;
        let query = prompt
            .rsplit("Query: ")
            .next()
            .unwrap_or(prompt)
            .to_string();
        Ok(query)
    }

    async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        Err(CoreError::Provider("not an embedding endpoint".to_string()))
    }
}

/// Embedding endpoint that is permanently down.
struct DeadEmbedder;

#[async_trait]
impl ProviderEndpoint for DeadEmbedder {
    fn id(&self) -> &str {
        "dead-embed"
    }

    async fn chat(&self, _request: &ChatRequest) -> Result<String, CoreError> {
        Err(CoreError::Provider("down".to_string()))
    }

    async fn embed(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        Err(CoreError::Provider("embedding backend offline".to_string()))
    }
}

fn provider(id: &str, capability: Capability) -> ProviderConfig {
    ProviderConfig {
        id: id.to_string(),
        capability,
        priority: 0,
        timeout_ms: 1000,
        max_tokens: 256,
        base_url: "http://localhost:9999".to_string(),
        model: "mock".to_string(),
        api_key: None,
    }
}

struct Harness {
    ingestor: Ingestor,
    pipeline: RetrievalPipeline,
    router: Arc<ProviderRouter>,
}

fn harness(embedder: Arc<dyn ProviderEndpoint>) -> anyhow::Result<Harness> {
    let mut router = ProviderRouter::with_breaker_settings(3, std::time::Duration::from_secs(60));
    router.register(provider("embed", Capability::Embedding), embedder)?;
    router.register(
        provider("rewriter", Capability::FastChat),
        Arc::new(EchoRewriter),
    )?;
    let router = Arc::new(router);

    let vector = Arc::new(MemoryVectorIndex::new());
    let lexical = Arc::new(MemoryLexicalIndex::new());
    let store = Arc::new(MemoryContentStore::new());

    let config = CoreConfig::default();
    let ingestor = Ingestor::new(
        SemanticChunker::new(ChunkerConfig {
            max_chunk_bytes: 200,
            min_chunk_bytes: 20,
        }),
        Arc::clone(&router),
        store,
        vector.clone(),
        lexical.clone(),
    );
    let pipeline = RetrievalPipeline::new(&config, Arc::clone(&router), vector, lexical)?;
    Ok(Harness {
        ingestor,
        pipeline,
        router,
    })
}

const RUST_DOC: &str = "Rust ownership moves values between bindings. The borrow checker \
     enforces aliasing rules at compile time.\n\nOwnership transfers happen on assignment and \
     on function calls. A moved-from binding cannot be used again.";

const GARDEN_DOC: &str = "Garden soil needs compost in the spring. Healthy soil drains well \
     and holds moisture.\n\nRaised garden beds warm up earlier in the season.";

#[tokio::test]
async fn ingest_then_retrieve_returns_relevant_context() -> anyhow::Result<()> {
    let harness = harness(Arc::new(VocabEmbedder))?;

    let report = harness.ingestor.ingest_text("rust-doc", RUST_DOC).await?;
    assert!(report.chunks > 0);
    assert_eq!(report.chunks, report.embedded);
    harness.ingestor.ingest_text("garden-doc", GARDEN_DOC).await?;

    let context = harness
        .pipeline
        .retrieve("how does rust ownership work", None, 200)
        .await;

    assert!(!context.is_empty());
    assert!(context.total_tokens <= 200);
    // The top excerpt comes from the ownership document, not the garden one.
    assert_eq!(context.excerpts[0].source.source_id, "rust-doc");
    assert!(context.as_text().to_lowercase().contains("ownership"));
    Ok(())
}

#[tokio::test]
async fn tiny_budget_is_respected() -> anyhow::Result<()> {
    let harness = harness(Arc::new(VocabEmbedder))?;
    harness.ingestor.ingest_text("rust-doc", RUST_DOC).await?;

    let context = harness
        .pipeline
        .retrieve("rust ownership", None, 6)
        .await;

    assert!(context.total_tokens <= 6);
    assert!(context.excerpts.len() <= 1);
    Ok(())
}

#[tokio::test]
async fn dead_embedding_provider_degrades_to_lexical_retrieval() -> anyhow::Result<()> {
    let harness = harness(Arc::new(DeadEmbedder))?;

    // Ingestion stores chunks without embeddings.
    let report = harness.ingestor.ingest_text("rust-doc", RUST_DOC).await?;
    assert!(report.chunks > 0);
    assert_eq!(report.embedded, 0);

    // Retrieval still surfaces lexical matches.
    let context = harness
        .pipeline
        .retrieve("borrow checker aliasing", None, 200)
        .await;
    assert!(!context.is_empty());
    assert!(context.as_text().contains("borrow checker"));

    // A third failed embed call trips the breaker.
    harness
        .pipeline
        .retrieve("moved-from binding", None, 200)
        .await;

    // Repeated failures opened the embedding breaker; later queries skip
    // the dead provider instead of waiting on it, and still succeed.
    let status = harness.router.breaker_status("embed").expect("status");
    assert_eq!(status.state, ragkit::CircuitState::Open);
    let context = harness
        .pipeline
        .retrieve("ownership transfers", None, 200)
        .await;
    assert!(!context.is_empty());
    Ok(())
}

#[tokio::test]
async fn unknown_topic_yields_empty_context() -> anyhow::Result<()> {
    let harness = harness(Arc::new(VocabEmbedder))?;
    harness.ingestor.ingest_text("garden-doc", GARDEN_DOC).await?;

    let context = harness
        .pipeline
        .retrieve("quantum chromodynamics lattice", None, 200)
        .await;
    assert!(context.is_empty());
    Ok(())
}
