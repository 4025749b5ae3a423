//! Token-budgeted context compression.
//!
//! Walks ranked results in fused-score order and keeps only the sentences
//! of each chunk most relevant to the query, deduplicating near-identical
//! sentences already taken from a higher-ranked chunk. Token counts are
//! approximate but deterministic, and the output never exceeds the
//! caller's budget.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::hybrid::SearchResult;
use crate::ingest::chunker::SourceRef;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressorConfig {
    /// Sentences kept per chunk, most relevant first.
    pub max_sentences_per_chunk: usize,
    /// Term-overlap ratio above which two sentences count as duplicates.
    pub dedupe_overlap: f32,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            max_sentences_per_chunk: 3,
            dedupe_overlap: 0.8,
        }
    }
}

/// One compressed excerpt: the relevant sentences of a chunk, not the
/// whole chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedExcerpt {
    pub chunk_id: String,
    pub source: SourceRef,
    pub text: String,
    /// Fused score of the chunk this excerpt came from.
    pub score: f32,
}

/// Budget-constrained context ready for a generation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompressedContext {
    pub excerpts: Vec<CompressedExcerpt>,
    /// Estimated token count; never exceeds the requested budget.
    pub total_tokens: usize,
}

impl CompressedContext {
    pub fn is_empty(&self) -> bool {
        self.excerpts.is_empty()
    }

    /// Excerpts joined into one prompt-ready string.
    pub fn as_text(&self) -> String {
        self.excerpts
            .iter()
            .map(|excerpt| excerpt.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

pub struct ContextCompressor {
    config: CompressorConfig,
}

impl ContextCompressor {
    pub fn new(config: CompressorConfig) -> Self {
        Self { config }
    }

    /// Compress `results` (already in descending fused-score order) into a
    /// context of at most `token_budget` estimated tokens.
    pub fn compress(
        &self,
        query: &str,
        results: &[SearchResult],
        token_budget: usize,
    ) -> CompressedContext {
        let mut context = CompressedContext::default();
        if token_budget == 0 || results.is_empty() {
            return context;
        }

        let query_terms: HashSet<String> = terms(query).into_iter().collect();
        let mut seen: Vec<HashSet<String>> = Vec::new();

        for result in results {
            let sentences = self.relevant_sentences(&result.chunk.text, &query_terms);
            let mut kept: Vec<&str> = Vec::new();
            for sentence in &sentences {
                let sentence_terms: HashSet<String> = terms(sentence).into_iter().collect();
                let threshold = self.config.dedupe_overlap;
                if seen
                    .iter()
                    .any(|prior| is_near_duplicate(prior, &sentence_terms, threshold))
                {
                    continue;
                }
                kept.push(sentence);
                seen.push(sentence_terms);
            }
            if kept.is_empty() {
                continue;
            }

            let excerpt_text = kept.join(" ");
            let tokens = estimate_tokens(&excerpt_text);

            if context.total_tokens + tokens > token_budget {
                if context.excerpts.is_empty() {
                    // Even the top excerpt alone is over budget: truncate it.
                    let truncated = truncate_to_tokens(&excerpt_text, token_budget);
                    if !truncated.is_empty() {
                        let tokens = estimate_tokens(&truncated);
                        context.excerpts.push(CompressedExcerpt {
                            chunk_id: result.chunk.id.clone(),
                            source: result.chunk.source.clone(),
                            text: truncated,
                            score: result.score,
                        });
                        context.total_tokens = tokens;
                    }
                }
                break;
            }

            context.total_tokens += tokens;
            context.excerpts.push(CompressedExcerpt {
                chunk_id: result.chunk.id.clone(),
                source: result.chunk.source.clone(),
                text: excerpt_text,
                score: result.score,
            });
        }

        context
    }

    /// The sentences of `text` most relevant to the query, restored to
    /// their original order. Falls back to the leading sentences when no
    /// sentence overlaps the query at all.
    fn relevant_sentences(&self, text: &str, query_terms: &HashSet<String>) -> Vec<String> {
        let sentences = split_sentences(text);
        if sentences.len() <= self.config.max_sentences_per_chunk {
            return sentences.into_iter().map(str::to_string).collect();
        }

        let mut scored: Vec<(usize, f32)> = sentences
            .iter()
            .enumerate()
            .map(|(idx, sentence)| (idx, overlap_score(query_terms, sentence)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let any_overlap = scored.first().map(|(_, score)| *score > 0.0).unwrap_or(false);
        let mut keep: Vec<usize> = if any_overlap {
            scored
                .into_iter()
                .filter(|(_, score)| *score > 0.0)
                .take(self.config.max_sentences_per_chunk)
                .map(|(idx, _)| idx)
                .collect()
        } else {
            (0..self.config.max_sentences_per_chunk).collect()
        };
        keep.sort_unstable();

        keep.into_iter()
            .map(|idx| sentences[idx].to_string())
            .collect()
    }
}

impl Default for ContextCompressor {
    fn default() -> Self {
        Self::new(CompressorConfig::default())
    }
}

/// Deterministic token estimate: roughly four characters per token, with
/// whole words never counting below one token each.
pub fn estimate_tokens(text: &str) -> usize {
    let chars = text.chars().count();
    let words = text.split_whitespace().count();
    words.max(chars.div_ceil(4))
}

/// Truncate at a char boundary so the estimate fits `budget`.
fn truncate_to_tokens(text: &str, budget: usize) -> String {
    let mut result = String::new();
    for word in text.split_whitespace() {
        let candidate = if result.is_empty() {
            word.to_string()
        } else {
            format!("{result} {word}")
        };
        if estimate_tokens(&candidate) > budget {
            break;
        }
        result = candidate;
    }
    if result.is_empty() {
        // A single word longer than the whole budget: cut it mid-word.
        let max_chars = budget.saturating_mul(4);
        result = text.chars().take(max_chars).collect();
        while estimate_tokens(&result) > budget {
            result.pop();
        }
    }
    result
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((offset, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let at_break = chars
                .peek()
                .map(|(_, next)| next.is_whitespace())
                .unwrap_or(true);
            if at_break {
                let end = offset + ch.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn terms(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|term| term.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|term| !term.is_empty())
        .collect()
}

fn overlap_score(query_terms: &HashSet<String>, sentence: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let sentence_terms: HashSet<String> = terms(sentence).into_iter().collect();
    let matched = query_terms.intersection(&sentence_terms).count();
    matched as f32 / query_terms.len() as f32
}

/// Jaccard overlap of term sets, or exact normalized equality.
fn is_near_duplicate(a: &HashSet<String>, b: &HashSet<String>, threshold: f32) -> bool {
    if a == b {
        return true;
    }
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f32 / union as f32 >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::chunker::{Chunk, SourceRef};

    fn result(id: &str, text: &str, score: f32) -> SearchResult {
        SearchResult {
            chunk: Chunk {
                id: id.to_string(),
                source: SourceRef {
                    source_id: "doc".to_string(),
                    position: 0,
                },
                text: text.to_string(),
                start_offset: 0,
                end_offset: text.len(),
                embedding: None,
                created_at: chrono::Utc::now(),
            },
            score,
            vector_score: score,
            lexical_score: score,
        }
    }

    #[test]
    fn empty_inputs_yield_empty_context() {
        let compressor = ContextCompressor::default();
        assert!(compressor.compress("query", &[], 100).is_empty());

        let results = vec![result("a", "Some text here.", 0.9)];
        assert!(compressor.compress("query", &results, 0).is_empty());
    }

    #[test]
    fn output_never_exceeds_the_budget() {
        let compressor = ContextCompressor::default();
        let results = vec![
            result("a", &"Rust ownership explained in detail. ".repeat(20), 0.9),
            result("b", &"More rust material to include here. ".repeat(20), 0.8),
            result("c", &"Yet another relevant rust chunk. ".repeat(20), 0.7),
        ];

        for budget in [5, 10, 25, 50, 100, 500] {
            let context = compressor.compress("rust ownership", &results, budget);
            assert!(
                context.total_tokens <= budget,
                "budget {budget} exceeded: {}",
                context.total_tokens
            );
        }
    }

    #[test]
    fn oversized_top_excerpt_is_hard_truncated() {
        let compressor = ContextCompressor::default();
        let results = vec![result(
            "a",
            "This single enormous sentence about rust keeps going and going with many words",
            0.9,
        )];

        let context = compressor.compress("rust", &results, 5);
        assert_eq!(context.excerpts.len(), 1);
        assert!(context.total_tokens <= 5);
        assert!(!context.excerpts[0].text.is_empty());
    }

    #[test]
    fn relevant_sentences_are_preferred() {
        let compressor = ContextCompressor::new(CompressorConfig {
            max_sentences_per_chunk: 1,
            dedupe_overlap: 0.8,
        });
        let text = "Gardens need water in summer. The borrow checker enforces aliasing rules. \
                    Cooking pasta takes ten minutes.";
        let results = vec![result("a", text, 0.9)];

        let context = compressor.compress("borrow checker rules", &results, 200);
        assert_eq!(context.excerpts.len(), 1);
        assert!(context.excerpts[0].text.contains("borrow checker"));
        assert!(!context.excerpts[0].text.contains("pasta"));
    }

    #[test]
    fn duplicate_sentences_are_not_repeated() {
        let compressor = ContextCompressor::default();
        let shared = "The borrow checker enforces aliasing rules.";
        let results = vec![
            result("a", shared, 0.9),
            result("b", shared, 0.8),
            result("c", "Lifetimes bound reference validity.", 0.7),
        ];

        let context = compressor.compress("borrow checker", &results, 500);
        let text = context.as_text();
        assert_eq!(text.matches("aliasing rules").count(), 1);
        assert!(text.contains("Lifetimes"));
    }

    #[test]
    fn walks_results_in_given_order() {
        let compressor = ContextCompressor::default();
        let results = vec![
            result("top", "Highest ranked chunk about rust.", 0.9),
            result("second", "Second chunk about rust tooling.", 0.5),
        ];

        let context = compressor.compress("rust", &results, 500);
        assert_eq!(context.excerpts[0].chunk_id, "top");
        assert_eq!(context.excerpts[1].chunk_id, "second");
    }

    #[test]
    fn token_estimate_is_deterministic_and_monotone() {
        assert_eq!(estimate_tokens(""), 0);
        let short = estimate_tokens("four chars each");
        let long = estimate_tokens("four chars each plus more text");
        assert!(long > short);
        assert_eq!(estimate_tokens("same input"), estimate_tokens("same input"));
    }
}
