//! Semantic chunking of source text into retrievable units.
//!
//! Splits on paragraph boundaries first, merges adjacent undersized
//! fragments, and hard-splits oversized paragraphs at sentence boundaries.
//! Every chunk records its byte span in the source for traceability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Upper bound on chunk size in bytes of source text.
    pub max_chunk_bytes: usize,
    /// Fragments below this size are merged with a neighbour when possible.
    pub min_chunk_bytes: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: 1200,
            min_chunk_bytes: 200,
        }
    }
}

/// Stable reference back into the source corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Document or conversation identifier.
    pub source_id: String,
    /// Chunk index within the source.
    pub position: usize,
}

/// A bounded, independently retrievable unit of source content.
///
/// Immutable after ingestion except for re-embedding when the source
/// content is updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub source: SourceRef,
    pub text: String,
    /// Byte offsets of this chunk's text in the original source.
    pub start_offset: usize,
    pub end_offset: usize,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

pub struct SemanticChunker {
    config: ChunkerConfig,
}

impl SemanticChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Split `text` into chunks. Empty or whitespace-only input yields an
    /// empty vec, not an error.
    pub fn chunk(&self, text: &str, source_id: &str) -> Vec<Chunk> {
        let max = self.config.max_chunk_bytes.max(1);
        let min = self.config.min_chunk_bytes.min(max);

        let mut fragments: Vec<(usize, usize)> = Vec::new();
        for (start, end) in paragraph_spans(text) {
            if end - start <= max {
                fragments.push((start, end));
            } else {
                split_oversized(text, start, end, max, &mut fragments);
            }
        }

        let merged = merge_undersized(text, fragments, min, max);

        merged
            .into_iter()
            .enumerate()
            .map(|(position, (start, end))| Chunk {
                id: uuid::Uuid::new_v4().to_string(),
                source: SourceRef {
                    source_id: source_id.to_string(),
                    position,
                },
                text: text[start..end].to_string(),
                start_offset: start,
                end_offset: end,
                embedding: None,
                created_at: Utc::now(),
            })
            .collect()
    }
}

impl Default for SemanticChunker {
    fn default() -> Self {
        Self::new(ChunkerConfig::default())
    }
}

/// Spans of non-empty paragraphs, trimmed of surrounding whitespace.
fn paragraph_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    for part in text.split("\n\n") {
        let start = cursor;
        cursor = start + part.len() + 2;
        if let Some(span) = trim_span(text, start, start + part.len()) {
            spans.push(span);
        }
    }
    spans
}

/// Shrink a span to exclude leading/trailing whitespace. None if empty.
fn trim_span(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let slice = &text[start..end];
    let trimmed_start = slice.trim_start();
    let new_start = start + (slice.len() - trimmed_start.len());
    let trimmed = trimmed_start.trim_end();
    if trimmed.is_empty() {
        None
    } else {
        Some((new_start, new_start + trimmed.len()))
    }
}

/// Split an oversized paragraph at sentence boundaries, grouping sentences
/// greedily up to `max`. A single sentence longer than `max` is cut at the
/// nearest char boundary as a last resort.
fn split_oversized(
    text: &str,
    start: usize,
    end: usize,
    max: usize,
    out: &mut Vec<(usize, usize)>,
) {
    let sentences = sentence_spans(text, start, end);

    let mut group_start: Option<usize> = None;
    let mut group_end = start;
    for (s_start, s_end) in sentences {
        if s_end - s_start > max {
            if let Some(gs) = group_start.take() {
                out.push((gs, group_end));
            }
            hard_cut(text, s_start, s_end, max, out);
            continue;
        }
        match group_start {
            Some(gs) if s_end - gs <= max => {
                group_end = s_end;
            }
            Some(gs) => {
                out.push((gs, group_end));
                group_start = Some(s_start);
                group_end = s_end;
            }
            None => {
                group_start = Some(s_start);
                group_end = s_end;
            }
        }
    }
    if let Some(gs) = group_start {
        out.push((gs, group_end));
    }
}

/// Sentence spans within `[start, end)`, splitting after '.', '!' or '?'
/// followed by whitespace.
fn sentence_spans(text: &str, start: usize, end: usize) -> Vec<(usize, usize)> {
    let slice = &text[start..end];
    let mut spans = Vec::new();
    let mut sentence_start = start;

    let mut chars = slice.char_indices().peekable();
    while let Some((offset, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            let after = start + offset + ch.len_utf8();
            let at_break = chars
                .peek()
                .map(|(_, next)| next.is_whitespace())
                .unwrap_or(true);
            if at_break && after > sentence_start {
                if let Some(span) = trim_span(text, sentence_start, after) {
                    spans.push(span);
                }
                sentence_start = after;
            }
        }
    }

    if sentence_start < end {
        if let Some(span) = trim_span(text, sentence_start, end) {
            spans.push(span);
        }
    }
    spans
}

/// Cut a span into pieces of at most `max` bytes at char boundaries.
fn hard_cut(text: &str, start: usize, end: usize, max: usize, out: &mut Vec<(usize, usize)>) {
    let mut cursor = start;
    while end - cursor > max {
        let mut cut = cursor + max;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == cursor {
            break;
        }
        out.push((cursor, cut));
        cursor = cut;
    }
    if cursor < end {
        out.push((cursor, end));
    }
}

/// Merge adjacent undersized fragments while the result stays within `max`.
fn merge_undersized(
    text: &str,
    fragments: Vec<(usize, usize)>,
    min: usize,
    max: usize,
) -> Vec<(usize, usize)> {
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(fragments.len());
    for (start, end) in fragments {
        if let Some(last) = merged.last_mut() {
            let last_len = last.1 - last.0;
            let frag_len = end - start;
            let combined = end - last.0;
            if (last_len < min || frag_len < min) && combined <= max {
                last.1 = end;
                continue;
            }
        }
        merged.push((start, end));
    }

    // Re-trim merged spans so separators absorbed at the edges are dropped.
    merged
        .into_iter()
        .filter_map(|(start, end)| trim_span(text, start, end))
        .collect()
}
