//! Schema-validated generation with corrective retries.
//!
//! Wraps router chat calls so callers receive either a value that conforms
//! to their JSON schema or a single terminal error, never partially-valid
//! structured data. Validation failures are fed back into the prompt and
//! retried a bounded number of times.

use std::sync::Arc;

use serde_json::Value;

use super::router::ProviderRouter;
use super::types::{Capability, ChatMessage, ChatRequest};
use crate::core::errors::CoreError;

pub const DEFAULT_MAX_RETRIES: u32 = 2;

const SYSTEM_INSTRUCTION: &str = "You are a structured data generator. Respond with a single JSON \
     value that conforms to the schema provided by the user. Output only \
     JSON, with no explanation and no markdown fences.";

pub struct StructuredGenerator {
    router: Arc<ProviderRouter>,
    max_retries: u32,
}

impl StructuredGenerator {
    pub fn new(router: Arc<ProviderRouter>) -> Self {
        Self {
            router,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Generate a value conforming to `schema`.
    ///
    /// Issues at most `max_retries + 1` provider calls. Retries are
    /// strictly sequential; each failed attempt appends its validation
    /// error to the prompt so the model can correct itself. Provider
    /// exhaustion is propagated as-is since retrying the same dead chain
    /// cannot help.
    pub async fn generate(&self, schema: &Value, prompt: &str) -> Result<Value, CoreError> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|err| CoreError::InvalidConfig(format!("invalid schema: {err}")))?;

        let attempts = self.max_retries + 1;
        let mut prompt_text = format!("Schema:\n{schema}\n\nTask:\n{prompt}");
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let request = ChatRequest::new(vec![
                ChatMessage::system(SYSTEM_INSTRUCTION),
                ChatMessage::user(prompt_text.clone()),
            ])
            .deterministic();

            let raw = self.router.chat(Capability::Chat, &request).await?;
            match parse_and_validate(&validator, &raw) {
                Ok(value) => return Ok(value),
                Err(description) => {
                    tracing::debug!(attempt, error = %description, "structured output rejected");
                    prompt_text = format!(
                        "Schema:\n{schema}\n\nTask:\n{prompt}\n\nYour previous output failed \
                         validation: {description}. Produce corrected output that conforms to \
                         the schema."
                    );
                    last_error = description;
                }
            }
        }

        Err(CoreError::SchemaValidationExhausted {
            attempts,
            last_error,
        })
    }
}

fn parse_and_validate(validator: &jsonschema::Validator, raw: &str) -> Result<Value, String> {
    let cleaned = strip_code_fence(raw);
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|err| format!("output is not valid JSON: {err}"))?;
    validator
        .validate(&value)
        .map_err(|err| err.to_string())?;
    Ok(value)
}

/// Models often wrap JSON in markdown fences despite instructions.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}
