use miriad_core::provider::ModelError;
use miriad_core::tools::ToolError;
use miriad_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("turn cancelled")]
    Cancelled,

    #[error("max turns exceeded: {0}")]
    MaxTurnsExceeded(u32),

    #[error("{0}")]
    Internal(String),
}

impl EngineError {
    /// Whether this failure came from user cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Model(ModelError::Cancelled))
    }
}
