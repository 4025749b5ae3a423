use async_trait::async_trait;

use super::types::ChatRequest;
use crate::core::errors::CoreError;

/// A single upstream model endpoint.
///
/// Implementations perform one raw call and report its outcome; they carry
/// no retry or fallback logic of their own. All fallback policy lives in
/// the [`ProviderRouter`](super::router::ProviderRouter), all retry policy
/// in [`StructuredGenerator`](super::structured::StructuredGenerator).
#[async_trait]
pub trait ProviderEndpoint: Send + Sync {
    fn id(&self) -> &str;

    /// Chat completion (non-streaming).
    async fn chat(&self, request: &ChatRequest) -> Result<String, CoreError>;

    /// Generate one embedding vector per input text.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CoreError>;
}
