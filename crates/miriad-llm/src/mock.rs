//! Pre-programmed provider responses for deterministic testing without API
//! calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use miriad_core::ids::ToolCallId;
use miriad_core::messages::{AssistantContent, AssistantMessage, ToolCallBlock};
use miriad_core::provider::{GenerateRequest, ModelError, ModelProvider, ModelResponse};
use miriad_core::tokens::TokenUsage;

pub enum MockResponse {
    /// Return a complete assistant message.
    Message(AssistantMessage),
    /// Return an error from generate().
    Error(ModelError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    /// Convenience: a plain text response.
    pub fn text(text: &str) -> Self {
        Self::Message(AssistantMessage::text(text))
    }

    /// Convenience: a response carrying one tool call (no text).
    pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> Self {
        Self::Message(AssistantMessage {
            content: vec![AssistantContent::ToolCall(ToolCallBlock {
                id: ToolCallId::from_raw(id),
                name: name.into(),
                arguments,
            })],
            usage: None,
        })
    }

    /// Convenience: text plus one tool call.
    pub fn text_with_tool_call(
        text: &str,
        id: &str,
        name: &str,
        arguments: serde_json::Value,
    ) -> Self {
        Self::Message(AssistantMessage {
            content: vec![
                AssistantContent::Text { text: text.into() },
                AssistantContent::ToolCall(ToolCallBlock {
                    id: ToolCallId::from_raw(id),
                    name: name.into(),
                    arguments,
                }),
            ],
            usage: None,
        })
    }

    /// Convenience: wrap any response with a delay.
    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock provider that returns pre-programmed responses in call order.
pub struct MockProvider {
    responses: Vec<MockResponse>,
    call_count: AtomicUsize,
}

impl MockProvider {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn generate(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<ModelResponse, ModelError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        let Some(response) = self.responses.get(idx) else {
            return Err(ModelError::InvalidRequest(format!(
                "MockProvider: no response configured for call {idx}"
            )));
        };

        let mut current = response;
        loop {
            match current {
                MockResponse::Message(message) => {
                    let usage = TokenUsage {
                        input_tokens: request
                            .messages
                            .len()
                            .max(1) as u64
                            * 10,
                        output_tokens: 10,
                    };
                    return Ok(ModelResponse {
                        message: message.clone(),
                        usage,
                    });
                }
                MockResponse::Error(e) => return Err(e.clone()),
                MockResponse::Delay(duration, inner) => {
                    tokio::select! {
                        _ = tokio::time::sleep(*duration) => {}
                        _ = cancel.cancelled() => return Err(ModelError::Cancelled),
                    }
                    current = inner;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_request() -> GenerateRequest {
        GenerateRequest {
            system: String::new(),
            messages: vec![],
            tools: vec![],
            max_tokens: 128,
            timeout: None,
        }
    }

    #[tokio::test]
    async fn text_response() {
        let mock = MockProvider::new(vec![MockResponse::text("hello world")]);
        let response = mock
            .generate(&empty_request(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.message.text_content(), "hello world");
        assert!(!response.message.has_tool_calls());
        assert!(response.usage.output_tokens > 0);
    }

    #[tokio::test]
    async fn tool_call_response() {
        let mock = MockProvider::new(vec![MockResponse::tool_call(
            "call_1",
            "read",
            serde_json::json!({"path": "/tmp/x"}),
        )]);
        let response = mock
            .generate(&empty_request(), &CancellationToken::new())
            .await
            .unwrap();
        let calls = response.message.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "read");
    }

    #[tokio::test]
    async fn sequential_responses() {
        let mock = MockProvider::new(vec![
            MockResponse::text("first"),
            MockResponse::text("second"),
        ]);
        let cancel = CancellationToken::new();

        let r1 = mock.generate(&empty_request(), &cancel).await.unwrap();
        assert_eq!(r1.message.text_content(), "first");
        let r2 = mock.generate(&empty_request(), &cancel).await.unwrap();
        assert_eq!(r2.message.text_content(), "second");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_responses() {
        let mock = MockProvider::new(vec![MockResponse::text("only one")]);
        let cancel = CancellationToken::new();
        let _ = mock.generate(&empty_request(), &cancel).await;
        let result = mock.generate(&empty_request(), &cancel).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn error_response() {
        let mock = MockProvider::new(vec![MockResponse::Error(
            ModelError::AuthenticationFailed("bad".into()),
        )]);
        let result = mock
            .generate(&empty_request(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ModelError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn delayed_response_waits() {
        let mock = MockProvider::new(vec![MockResponse::delayed(
            Duration::from_millis(50),
            MockResponse::text("after delay"),
        )]);
        let start = std::time::Instant::now();
        let response = mock
            .generate(&empty_request(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(response.message.text_content(), "after delay");
    }

    #[tokio::test]
    async fn delayed_response_observes_cancellation() {
        let mock = MockProvider::new(vec![MockResponse::delayed(
            Duration::from_secs(10),
            MockResponse::text("never"),
        )]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = mock.generate(&empty_request(), &cancel).await;
        assert!(matches!(result, Err(ModelError::Cancelled)));
    }
}
