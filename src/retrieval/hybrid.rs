//! Hybrid search: vector and lexical retrieval fused into one ranking.
//!
//! The lexical lookup starts concurrently with the query embedding call;
//! the vector lookup follows the embedding, and both sides are joined
//! before fusion.
//! Either side may fail without failing the search; the ranking degrades
//! to the surviving signal. Raw cosine and lexical scores are not
//! comparable, so each candidate set is min-max normalized independently
//! before the weighted fusion.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::index::{IndexHit, LexicalIndex, SearchFilters, VectorIndex};
use crate::ingest::chunker::Chunk;
use crate::provider::router::ProviderRouter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Weight of the vector signal in the fused score; the lexical signal
    /// gets `1 - alpha`.
    pub alpha: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { alpha: 0.65 }
    }
}

/// One ranked result. Sub-scores are the normalized per-signal values that
/// went into the fusion; a chunk seen by only one signal scores 0.0 on the
/// other. Ephemeral: recomputed per query, never cached.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: Chunk,
    /// Fused relevance in [0, 1].
    pub score: f32,
    pub vector_score: f32,
    pub lexical_score: f32,
}

pub struct HybridSearch {
    router: Arc<ProviderRouter>,
    vector: Arc<dyn VectorIndex>,
    lexical: Arc<dyn LexicalIndex>,
    config: SearchConfig,
}

impl HybridSearch {
    pub fn new(
        router: Arc<ProviderRouter>,
        vector: Arc<dyn VectorIndex>,
        lexical: Arc<dyn LexicalIndex>,
        config: SearchConfig,
    ) -> Self {
        Self {
            router,
            vector,
            lexical,
            config,
        }
    }

    /// Retrieve and rank up to `top_k` chunks for `query`.
    ///
    /// Never fails: an empty query or corpus yields an empty list, an
    /// exhausted embedding chain degrades to lexical-only ranking, and a
    /// failed sub-retrieval degrades to the other signal.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Vec<SearchResult> {
        if query.trim().is_empty() || top_k == 0 {
            return Vec::new();
        }

        // The lexical lookup does not depend on the embedding, so it runs
        // alongside the embed call rather than behind it.
        let vector_side = async {
            let embedding = match self.router.embed(std::slice::from_ref(&query.to_string())).await
            {
                Ok(mut vectors) if !vectors.is_empty() => Some(vectors.swap_remove(0)),
                Ok(_) => {
                    tracing::warn!("embedding call returned no vectors, using lexical-only ranking");
                    None
                }
                Err(err) => {
                    tracing::warn!(error = %err, "embedding unavailable, using lexical-only ranking");
                    None
                }
            };
            match embedding {
                Some(emb) => recover(self.vector.search(&emb, top_k, filters).await, "vector"),
                None => Vec::new(),
            }
        };
        let lexical_side = async { recover(self.lexical.search(query, top_k, filters).await, "lexical") };

        let (vector_hits, lexical_hits) = tokio::join!(vector_side, lexical_side);
        self.fuse(vector_hits, lexical_hits, top_k)
    }

    fn fuse(
        &self,
        vector_hits: Vec<IndexHit>,
        lexical_hits: Vec<IndexHit>,
        top_k: usize,
    ) -> Vec<SearchResult> {
        struct Candidate {
            chunk: Chunk,
            vector_norm: f32,
            lexical_norm: f32,
            raw_vector: f32,
            arrival: usize,
        }

        let vector_norms = normalize(&vector_hits);
        let lexical_norms = normalize(&lexical_hits);

        let mut by_id: HashMap<String, usize> = HashMap::new();
        let mut candidates: Vec<Candidate> = Vec::new();

        for (hit, norm) in vector_hits.into_iter().zip(vector_norms) {
            let arrival = candidates.len();
            by_id.insert(hit.chunk.id.clone(), arrival);
            candidates.push(Candidate {
                chunk: hit.chunk,
                vector_norm: norm,
                lexical_norm: 0.0,
                raw_vector: hit.score,
                arrival,
            });
        }

        for (hit, norm) in lexical_hits.into_iter().zip(lexical_norms) {
            match by_id.get(&hit.chunk.id) {
                Some(&idx) => candidates[idx].lexical_norm = norm,
                None => {
                    let arrival = candidates.len();
                    by_id.insert(hit.chunk.id.clone(), arrival);
                    candidates.push(Candidate {
                        chunk: hit.chunk,
                        vector_norm: 0.0,
                        lexical_norm: norm,
                        raw_vector: 0.0,
                        arrival,
                    });
                }
            }
        }

        let alpha = self.config.alpha.clamp(0.0, 1.0);
        let mut results: Vec<(f32, f32, usize, SearchResult)> = candidates
            .into_iter()
            .map(|c| {
                let fused = alpha * c.vector_norm + (1.0 - alpha) * c.lexical_norm;
                (
                    fused,
                    c.raw_vector,
                    c.arrival,
                    SearchResult {
                        chunk: c.chunk,
                        score: fused,
                        vector_score: c.vector_norm,
                        lexical_score: c.lexical_norm,
                    },
                )
            })
            .collect();

        // Descending fused score; ties prefer the higher raw vector score,
        // then stay stable by original retrieval order.
        results.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.2.cmp(&b.2))
        });

        results
            .into_iter()
            .take(top_k)
            .map(|(_, _, _, result)| result)
            .collect()
    }
}

fn recover(result: Result<Vec<IndexHit>, crate::core::errors::CoreError>, side: &str) -> Vec<IndexHit> {
    match result {
        Ok(hits) => hits,
        Err(err) => {
            tracing::warn!(side, error = %err, "sub-retrieval failed, degrading to single signal");
            Vec::new()
        }
    }
}

/// Min-max normalization over one candidate set. A degenerate set (all
/// scores equal) maps to 1.0 so a lone hit still carries its full weight.
fn normalize(hits: &[IndexHit]) -> Vec<f32> {
    let Some(first) = hits.first() else {
        return Vec::new();
    };
    let mut min = first.score;
    let mut max = first.score;
    for hit in hits {
        min = min.min(hit.score);
        max = max.max(hit.score);
    }
    let range = max - min;
    if range <= f32::EPSILON {
        return vec![1.0; hits.len()];
    }
    hits.iter().map(|hit| (hit.score - min) / range).collect()
}
