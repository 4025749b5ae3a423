//! In-memory index and store backends.
//!
//! Brute-force implementations of the collaborator contracts, suitable for
//! tests and small corpora. Vector search is exhaustive cosine similarity;
//! lexical search scores by query-term coverage weighted by term frequency.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::index::{ContentStore, IndexHit, LexicalIndex, SearchFilters, VectorIndex};
use crate::core::errors::CoreError;
use crate::ingest::chunker::Chunk;

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm_a * norm_b;

    if denom <= f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

fn sort_and_truncate(mut hits: Vec<IndexHit>, top_k: usize) -> Vec<IndexHit> {
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(top_k);
    hits
}

/// Replace-by-id upsert shared by both memory indexes.
fn upsert_chunks(existing: &mut Vec<Chunk>, incoming: &[Chunk]) {
    for chunk in incoming {
        if let Some(slot) = existing.iter_mut().find(|c| c.id == chunk.id) {
            *slot = chunk.clone();
        } else {
            existing.push(chunk.clone());
        }
    }
}

#[derive(Default)]
pub struct MemoryVectorIndex {
    chunks: RwLock<Vec<Chunk>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn search(
        &self,
        embedding: &[f32],
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<IndexHit>, CoreError> {
        let chunks = self.chunks.read().await;
        let hits = chunks
            .iter()
            .filter(|chunk| filters.matches(chunk))
            .filter_map(|chunk| {
                let emb = chunk.embedding.as_ref()?;
                let score = cosine_similarity(embedding, emb);
                (score > 0.0).then(|| IndexHit {
                    chunk: chunk.clone(),
                    score,
                })
            })
            .collect();
        Ok(sort_and_truncate(hits, top_k))
    }

    async fn upsert(&self, incoming: &[Chunk]) -> Result<(), CoreError> {
        let mut chunks = self.chunks.write().await;
        upsert_chunks(&mut chunks, incoming);
        Ok(())
    }

    async fn remove_source(&self, source_id: &str) -> Result<(), CoreError> {
        let mut chunks = self.chunks.write().await;
        chunks.retain(|chunk| chunk.source.source_id != source_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLexicalIndex {
    chunks: RwLock<Vec<Chunk>>,
}

impl MemoryLexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of query terms present, weighted by how often they occur.
    fn score(query_terms: &[String], text: &str) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let text_lower = text.to_lowercase();
        let mut matched = 0usize;
        let mut occurrences = 0usize;
        for term in query_terms {
            let count = text_lower.matches(term.as_str()).count();
            if count > 0 {
                matched += 1;
                occurrences += count;
            }
        }
        if matched == 0 {
            return 0.0;
        }
        let coverage = matched as f32 / query_terms.len() as f32;
        // Mild frequency boost; coverage dominates.
        coverage + (occurrences as f32).ln_1p() * 0.01
    }
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(|term| term.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|term| !term.is_empty())
        .collect()
}

#[async_trait]
impl LexicalIndex for MemoryLexicalIndex {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<IndexHit>, CoreError> {
        let terms = query_terms(query);
        let chunks = self.chunks.read().await;
        let hits = chunks
            .iter()
            .filter(|chunk| filters.matches(chunk))
            .filter_map(|chunk| {
                let score = Self::score(&terms, &chunk.text);
                (score > 0.0).then(|| IndexHit {
                    chunk: chunk.clone(),
                    score,
                })
            })
            .collect();
        Ok(sort_and_truncate(hits, top_k))
    }

    async fn upsert(&self, incoming: &[Chunk]) -> Result<(), CoreError> {
        let mut chunks = self.chunks.write().await;
        upsert_chunks(&mut chunks, incoming);
        Ok(())
    }

    async fn remove_source(&self, source_id: &str) -> Result<(), CoreError> {
        let mut chunks = self.chunks.write().await;
        chunks.retain(|chunk| chunk.source.source_id != source_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryContentStore {
    sources: RwLock<HashMap<String, String>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn fetch(&self, source_id: &str) -> Result<Option<String>, CoreError> {
        Ok(self.sources.read().await.get(source_id).cloned())
    }

    async fn put(&self, source_id: &str, text: &str) -> Result<(), CoreError> {
        self.sources
            .write()
            .await
            .insert(source_id.to_string(), text.to_string());
        Ok(())
    }

    async fn remove(&self, source_id: &str) -> Result<(), CoreError> {
        self.sources.write().await.remove(source_id);
        Ok(())
    }
}
