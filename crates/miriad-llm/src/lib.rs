pub mod mock;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use miriad_core::config::ModelConfig;
use miriad_core::provider::{GenerateRequest, ModelError, ModelProvider, ModelResponse};

/// Resolve a provider from config. Real adapters live outside this
/// repository and register here; without one, generation fails with an auth
/// error rather than crashing the process.
pub fn resolve_provider(config: &ModelConfig) -> Arc<dyn ModelProvider> {
    warn!(
        provider = %config.provider,
        "no adapter registered for provider — prompts will fail with an auth error"
    );
    Arc::new(UnconfiguredProvider {
        provider: config.provider.clone(),
        model: config.workhorse.clone(),
    })
}

/// Placeholder provider used when no adapter is configured.
pub struct UnconfiguredProvider {
    provider: String,
    model: String,
}

#[async_trait]
impl ModelProvider for UnconfiguredProvider {
    fn name(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        _request: &GenerateRequest,
        _cancel: &CancellationToken,
    ) -> Result<ModelResponse, ModelError> {
        Err(ModelError::AuthenticationFailed(format!(
            "no adapter configured for provider \"{}\"",
            self.provider
        )))
    }
}
