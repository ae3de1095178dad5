pub mod config;
pub mod events;
pub mod ids;
pub mod messages;
pub mod provider;
pub mod tokens;
pub mod tools;

pub use config::AgentConfig;
pub use events::{AgentEvent, EventSink};
pub use ids::IdService;
pub use provider::{ModelError, ModelProvider};
pub use tokens::TokenUsage;
