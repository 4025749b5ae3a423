//! OpenAI-compatible HTTP endpoint.
//!
//! Speaks the `/v1/chat/completions` and `/v1/embeddings` wire format used
//! by OpenAI, LM Studio, Ollama and most local inference servers. Timeouts
//! are enforced by the router, not here.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::endpoint::ProviderEndpoint;
use super::types::{ChatRequest, ProviderConfig};
use crate::core::errors::CoreError;

#[derive(Clone)]
pub struct OpenAiEndpoint {
    id: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiEndpoint {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            id: config.id.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            client: Client::new(),
        }
    }

    fn post(&self, url: &str, body: &Value) -> reqwest::RequestBuilder {
        let mut req = self.client.post(url).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }
}

#[async_trait]
impl ProviderEndpoint for OpenAiEndpoint {
    fn id(&self) -> &str {
        &self.id
    }

    async fn chat(&self, request: &ChatRequest) -> Result<String, CoreError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "stream": false,
        });
        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(t) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(t));
            }
            if let Some(s) = &request.stop {
                obj.insert("stop".to_string(), json!(s));
            }
        }

        let res = self
            .post(&url, &body)
            .send()
            .await
            .map_err(CoreError::provider)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(CoreError::Provider(format!(
                "chat request failed ({status}): {text}"
            )));
        }

        let payload: Value = res.json().await.map_err(CoreError::provider)?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CoreError::Provider("chat response missing content".to_string()))
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, CoreError> {
        let url = format!("{}/v1/embeddings", self.base_url);

        let body = json!({
            "model": self.model,
            "input": inputs,
        });

        let res = self
            .post(&url, &body)
            .send()
            .await
            .map_err(CoreError::provider)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(CoreError::Provider(format!(
                "embed request failed ({status}): {text}"
            )));
        }

        let payload: Value = res.json().await.map_err(CoreError::provider)?;
        let data = payload["data"]
            .as_array()
            .ok_or_else(|| CoreError::Provider("embed response missing data".to_string()))?;

        let mut embeddings = Vec::with_capacity(data.len());
        for item in data {
            let vals = item["embedding"]
                .as_array()
                .ok_or_else(|| CoreError::Provider("embed response missing vector".to_string()))?;
            let vec: Vec<f32> = vals
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();
            embeddings.push(vec);
        }

        if embeddings.len() != inputs.len() {
            return Err(CoreError::Provider(format!(
                "embed response size mismatch: {} != {}",
                embeddings.len(),
                inputs.len()
            )));
        }

        Ok(embeddings)
    }
}
