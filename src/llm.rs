//! LLM provider abstraction
//!
//! The chat loop consumes a stream of chunks; the tools use one-shot
//! completions, either plain text or constrained to a JSON schema.

mod error;
mod gemini;
mod types;

pub use error::{LlmError, LlmErrorKind};
pub use gemini::GeminiService;
pub use types::*;

use async_trait::async_trait;
use futures::stream::Stream;
use futures::StreamExt;
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

/// Incremental model output, in emission order
pub type LlmStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, LlmError>> + Send>>;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Start a streaming completion
    async fn stream(&self, request: &LlmRequest) -> Result<LlmStream, LlmError>;

    /// Make a completion request and wait for the whole response
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;

    /// Generate text for a single user prompt
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self.complete(&LlmRequest::prompt(prompt)).await?;
        Ok(response.text())
    }

    /// Generate a JSON object conforming to `schema` for a single user prompt
    async fn generate_object(&self, prompt: &str, schema: &Value) -> Result<Value, LlmError> {
        let request = LlmRequest::prompt(prompt).with_response_schema(schema.clone());
        let response = self.complete(&request).await?;
        let text = response.text();
        let value: Value = serde_json::from_str(text.trim()).map_err(|e| {
            LlmError::invalid_response(format!("Response is not valid JSON: {e}"))
        })?;
        if !value.is_object() {
            return Err(LlmError::invalid_response("Response is not a JSON object"));
        }
        Ok(value)
    }
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn stream(&self, request: &LlmRequest) -> Result<LlmStream, LlmError> {
        let start = Instant::now();
        let model_id = self.model_id.clone();
        let stream = self.inner.stream(request).await.inspect_err(|e| {
            tracing::error!(
                model = %model_id,
                error = %e.message,
                retryable = e.kind.is_retryable(),
                "LLM stream failed to open"
            );
        })?;

        tracing::debug!(
            model = %model_id,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "LLM stream opened"
        );

        let logged = stream.inspect(move |chunk| match chunk {
            Ok(StreamChunk::Finished { usage }) => {
                tracing::info!(
                    model = %model_id,
                    duration_ms = %start.elapsed().as_millis(),
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "LLM stream completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %model_id,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %e.message,
                    "LLM stream failed"
                );
            }
            Ok(_) => {}
        });

        Ok(Box::pin(logged))
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let start = Instant::now();
        let result = self.inner.complete(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    structured = request.response_schema.is_some(),
                    "LLM request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "LLM request failed"
                );
            }
        }

        result
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlm;
    use serde_json::json;

    #[tokio::test]
    async fn test_generate_object_parses_json() {
        let llm = MockLlm::new();
        llm.queue_text(r#"{"componentCode": "<Box />"}"#);

        let value = llm
            .generate_object("make a box", &json!({"type": "object"}))
            .await
            .unwrap();
        assert_eq!(value["componentCode"], "<Box />");

        let requests = llm.complete_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].response_schema.is_some());
    }

    #[tokio::test]
    async fn test_generate_object_rejects_non_json() {
        let llm = MockLlm::new();
        llm.queue_text("here is your component: <Box />");

        let err = llm
            .generate_object("make a box", &json!({"type": "object"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn test_generate_object_rejects_non_object() {
        let llm = MockLlm::new();
        llm.queue_text("[1, 2, 3]");

        let err = llm
            .generate_object("make a box", &json!({"type": "object"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn test_logging_service_passes_stream_through() {
        let mock = Arc::new(MockLlm::new());
        mock.queue_stream(vec![
            StreamChunk::TextDelta("Hello".to_string()),
            StreamChunk::TextDelta(" there".to_string()),
        ]);
        let logged = LoggingService::new(mock.clone());

        let chunks: Vec<_> = logged
            .stream(&LlmRequest::prompt("hi"))
            .await
            .unwrap()
            .collect()
            .await;

        let text: String = chunks
            .into_iter()
            .filter_map(|c| match c {
                Ok(StreamChunk::TextDelta(t)) => Some(t),
                _ => None,
            })
            .collect();
        assert_eq!(text, "Hello there");
        assert_eq!(logged.model_id(), mock.model_id());
    }
}
