//! Query-path orchestration.
//!
//! The caller-facing composition of the retrieval components: the query is
//! rewritten, retrieved against both signals, and compressed to the
//! caller's token budget. Every stage degrades rather than fails, so the
//! pipeline itself is infallible; the worst case is an empty context.

use std::sync::Arc;

use crate::core::config::CoreConfig;
use crate::core::errors::CoreError;
use crate::provider::router::ProviderRouter;
use crate::retrieval::compressor::{CompressedContext, ContextCompressor};
use crate::retrieval::hybrid::HybridSearch;
use crate::retrieval::index::{LexicalIndex, SearchFilters, VectorIndex};
use crate::retrieval::rewriter::QueryRewriter;

pub struct RetrievalPipeline {
    rewriter: QueryRewriter,
    search: HybridSearch,
    compressor: ContextCompressor,
    top_k: usize,
}

impl RetrievalPipeline {
    /// Wire the pipeline from a validated config and shared collaborators.
    pub fn new(
        config: &CoreConfig,
        router: Arc<ProviderRouter>,
        vector: Arc<dyn VectorIndex>,
        lexical: Arc<dyn LexicalIndex>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            rewriter: QueryRewriter::new(Arc::clone(&router), config.rewriter.clone()),
            search: HybridSearch::new(router, vector, lexical, config.search.clone()),
            compressor: ContextCompressor::new(config.compressor.clone()),
            top_k: config.retrieval.top_k,
        })
    }

    /// Turn a raw query into ranked, budget-constrained context.
    pub async fn retrieve(
        &self,
        query: &str,
        conversation_context: Option<&str>,
        token_budget: usize,
    ) -> CompressedContext {
        self.retrieve_filtered(query, conversation_context, token_budget, &SearchFilters::default())
            .await
    }

    pub async fn retrieve_filtered(
        &self,
        query: &str,
        conversation_context: Option<&str>,
        token_budget: usize,
        filters: &SearchFilters,
    ) -> CompressedContext {
        let rewritten = self.rewriter.rewrite(query, conversation_context).await;
        if rewritten != query {
            tracing::debug!(original = query, rewritten = %rewritten, "query rewritten");
        }

        let results = self.search.search(&rewritten, self.top_k, filters).await;
        tracing::debug!(results = results.len(), "hybrid search complete");

        let context = self.compressor.compress(&rewritten, &results, token_budget);
        tracing::debug!(
            excerpts = context.excerpts.len(),
            tokens = context.total_tokens,
            budget = token_budget,
            "context compressed"
        );
        context
    }
}
