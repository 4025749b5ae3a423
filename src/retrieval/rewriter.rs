//! Query rewriting ahead of retrieval.
//!
//! Reformulates ambiguous or colloquial queries into retrieval-friendly
//! form: abbreviations expanded, pronouns resolved against conversation
//! context, keywords densified. The rewriter is never a single point of
//! failure; every invalid or failed rewrite falls back to the original
//! query.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::provider::router::ProviderRouter;
use crate::provider::types::{Capability, ChatMessage, ChatRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriterConfig {
    /// Queries shorter than this (in chars) are returned unchanged when no
    /// context is supplied; rewriting them risks losing intent.
    pub min_query_chars: usize,
    /// Rewrites longer than this multiple of the original are discarded as
    /// runaway output.
    pub max_growth_factor: usize,
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            min_query_chars: 10,
            max_growth_factor: 3,
        }
    }
}

const SYSTEM_INSTRUCTION: &str = "Rewrite the user's search query for document retrieval. Expand \
     abbreviations, resolve pronouns and references using the conversation \
     context if given, and add relevant keywords. Reply with the rewritten \
     query only, no explanation.";

pub struct QueryRewriter {
    router: Arc<ProviderRouter>,
    config: RewriterConfig,
}

impl QueryRewriter {
    pub fn new(router: Arc<ProviderRouter>, config: RewriterConfig) -> Self {
        Self { router, config }
    }

    /// Rewrite `query`, falling back to it unchanged on any problem.
    pub async fn rewrite(&self, query: &str, context: Option<&str>) -> String {
        let query_chars = query.chars().count();
        if query_chars < self.config.min_query_chars && context.is_none() {
            return query.to_string();
        }

        let mut user_prompt = String::new();
        if let Some(context) = context {
            user_prompt.push_str("Conversation context:\n");
            user_prompt.push_str(context);
            user_prompt.push_str("\n\n");
        }
        user_prompt.push_str("Query: ");
        user_prompt.push_str(query);

        let request = ChatRequest::new(vec![
            ChatMessage::system(SYSTEM_INSTRUCTION),
            ChatMessage::user(user_prompt),
        ])
        .deterministic()
        .with_max_tokens(256);

        let rewritten = match self.router.chat(Capability::FastChat, &request).await {
            Ok(text) => text,
            Err(err) => {
                tracing::debug!(error = %err, "query rewrite unavailable, keeping original");
                return query.to_string();
            }
        };

        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            tracing::debug!("query rewrite returned empty output, keeping original");
            return query.to_string();
        }
        if rewritten.chars().count() > query_chars * self.config.max_growth_factor {
            tracing::debug!(
                original_chars = query_chars,
                rewritten_chars = rewritten.chars().count(),
                "query rewrite exceeded growth bound, keeping original"
            );
            return query.to_string();
        }

        rewritten.to_string()
    }
}
