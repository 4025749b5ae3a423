use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::CoreError;

/// Class of AI operation a provider serves. Fixed at configuration time;
/// a provider never transitions between capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Embedding,
    Chat,
    FastChat,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Embedding => "embedding",
            Capability::Chat => "chat",
            Capability::FastChat => "fast-chat",
        };
        f.write_str(name)
    }
}

/// Static configuration for one provider endpoint.
///
/// Immutable once registered with the router. Required fields are checked
/// by [`ProviderConfig::validate`] at registration, not at call time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider identifier, e.g. "openai-embed" or "local-chat".
    pub id: String,
    pub capability: Capability,
    /// Rank within the capability class; lower priorities are tried first.
    #[serde(default)]
    pub priority: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Base URL of an OpenAI-compatible endpoint.
    pub base_url: String,
    /// Model identifier passed through to the endpoint.
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_tokens() -> u32 {
    1024
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "provider id must not be empty".to_string(),
            ));
        }
        if self.base_url.trim().is_empty() {
            return Err(CoreError::InvalidConfig(format!(
                "provider '{}': base_url must not be empty",
                self.id
            )));
        }
        if self.model.trim().is_empty() {
            return Err(CoreError::InvalidConfig(format!(
                "provider '{}': model must not be empty",
                self.id
            )));
        }
        if self.timeout_ms == 0 {
            return Err(CoreError::InvalidConfig(format!(
                "provider '{}': timeout_ms must be greater than zero",
                self.id
            )));
        }
        if self.max_tokens == 0 {
            return Err(CoreError::InvalidConfig(format!(
                "provider '{}': max_tokens must be greater than zero",
                self.id
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
            stop: None,
        }
    }

    pub fn deterministic(mut self) -> Self {
        self.temperature = Some(0.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}
