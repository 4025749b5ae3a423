//! Top-level configuration for the retrieval and generation core.
//!
//! Aggregates provider definitions and per-component tunables. Loaded from
//! TOML and validated up front; a config that parses but carries
//! out-of-range values never reaches a running component.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::CoreError;
use crate::ingest::chunker::ChunkerConfig;
use crate::provider::breaker::{DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT};
use crate::provider::types::ProviderConfig;
use crate::retrieval::compressor::CompressorConfig;
use crate::retrieval::hybrid::SearchConfig;
use crate::retrieval::rewriter::RewriterConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout_ms: DEFAULT_RESET_TIMEOUT.as_millis() as u64,
        }
    }
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Candidates requested from each retrieval signal.
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 8 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub chunker: ChunkerConfig,
    #[serde(default)]
    pub rewriter: RewriterConfig,
    #[serde(default)]
    pub compressor: CompressorConfig,
}

impl CoreConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, CoreError> {
        let config: CoreConfig = toml::from_str(raw)
            .map_err(|err| CoreError::InvalidConfig(format!("config parse error: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            CoreError::InvalidConfig(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        for provider in &self.providers {
            provider.validate()?;
        }
        if self.breaker.failure_threshold == 0 {
            return Err(CoreError::InvalidConfig(
                "breaker.failure_threshold must be greater than zero".to_string(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(CoreError::InvalidConfig(
                "retrieval.top_k must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.search.alpha) {
            return Err(CoreError::InvalidConfig(format!(
                "search.alpha must be in [0, 1], got {}",
                self.search.alpha
            )));
        }
        if self.chunker.max_chunk_bytes == 0 {
            return Err(CoreError::InvalidConfig(
                "chunker.max_chunk_bytes must be greater than zero".to_string(),
            ));
        }
        if self.chunker.min_chunk_bytes > self.chunker.max_chunk_bytes {
            return Err(CoreError::InvalidConfig(
                "chunker.min_chunk_bytes must not exceed max_chunk_bytes".to_string(),
            ));
        }
        if self.rewriter.max_growth_factor == 0 {
            return Err(CoreError::InvalidConfig(
                "rewriter.max_growth_factor must be greater than zero".to_string(),
            ));
        }
        if self.compressor.max_sentences_per_chunk == 0 {
            return Err(CoreError::InvalidConfig(
                "compressor.max_sentences_per_chunk must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.compressor.dedupe_overlap) {
            return Err(CoreError::InvalidConfig(format!(
                "compressor.dedupe_overlap must be in [0, 1], got {}",
                self.compressor.dedupe_overlap
            )));
        }
        Ok(())
    }
}
