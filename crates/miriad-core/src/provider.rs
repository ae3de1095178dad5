use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::messages::{AssistantMessage, Message};
use crate::tokens::TokenUsage;
use crate::tools::ToolDefinition;

/// A complete generation request. The provider sees the assembled system
/// prompt, the working conversation, and the tool definitions.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
    pub timeout: Option<Duration>,
}

/// A complete model response: text and/or tool calls plus usage.
#[derive(Clone, Debug)]
pub struct ModelResponse {
    pub message: AssistantMessage,
    pub usage: TokenUsage,
}

/// Typed error hierarchy for model generation.
/// Classifies errors as fatal (don't retry) or retryable.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ModelError {
    // Fatal — don't retry
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Retryable
    #[error("rate limited")]
    RateLimited,
    #[error("server error {status}: {body}")]
    ServerError { status: u16, body: String },
    #[error("network error: {0}")]
    NetworkError(String),

    // Operational
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("cancelled")]
    Cancelled,
}

impl ModelError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError { .. } | Self::NetworkError(_)
        )
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_) | Self::InvalidRequest(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::InvalidRequest(_) => "invalid_request",
            Self::RateLimited => "rate_limited",
            Self::ServerError { .. } => "server_error",
            Self::NetworkError(_) => "network_error",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Trait implemented by each model provider adapter.
/// The core treats generation as an opaque primitive; adapters live outside
/// this repository except for the test mock.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn generate(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<ModelResponse, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ModelError::RateLimited.is_retryable());
        assert!(ModelError::ServerError {
            status: 500,
            body: "err".into()
        }
        .is_retryable());
        assert!(ModelError::NetworkError("tcp".into()).is_retryable());
    }

    #[test]
    fn fatal_classification() {
        assert!(ModelError::AuthenticationFailed("bad key".into()).is_fatal());
        assert!(ModelError::InvalidRequest("bad".into()).is_fatal());
        assert!(!ModelError::AuthenticationFailed("bad key".into()).is_retryable());
    }

    #[test]
    fn not_retryable_and_not_fatal() {
        let timeout = ModelError::Timeout(Duration::from_secs(30));
        assert!(!timeout.is_retryable());
        assert!(!timeout.is_fatal());

        let cancelled = ModelError::Cancelled;
        assert!(!cancelled.is_retryable());
        assert!(!cancelled.is_fatal());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(ModelError::Cancelled.error_kind(), "cancelled");
        assert_eq!(ModelError::RateLimited.error_kind(), "rate_limited");
        assert_eq!(
            ModelError::Timeout(Duration::from_secs(1)).error_kind(),
            "timeout"
        );
    }
}
