use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, ToolCallId, WorkerId};
use crate::tokens::TokenUsage;

/// Events emitted by the agent loop to its sink as a turn unfolds.
/// The server fans these out as NDJSON; tests collect them directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentEvent {
    #[serde(rename = "user")]
    User { id: MessageId, content: String },

    #[serde(rename = "assistant")]
    Assistant { id: MessageId, content: String },

    #[serde(rename = "tool_call")]
    ToolCall {
        id: MessageId,
        tool_call_id: ToolCallId,
        name: String,
        arguments: serde_json::Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        id: MessageId,
        tool_call_id: ToolCallId,
        content: String,
    },

    #[serde(rename = "error")]
    Error { message: String },

    /// A compaction worker finished a pass over temporal memory.
    #[serde(rename = "consolidation")]
    Consolidation {
        worker_id: WorkerId,
        tokens_before: i64,
        tokens_after: i64,
        summaries_created: u32,
    },

    #[serde(rename = "done")]
    Done {
        response: String,
        usage: TokenUsage,
        num_turns: u32,
    },
}

impl AgentEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Error { .. } => "error",
            Self::Consolidation { .. } => "consolidation",
            Self::Done { .. } => "done",
        }
    }
}

/// Callback invoked with each event. Sinks must be cheap and non-blocking;
/// the loop calls them inline between suspension points.
pub type EventSink = Arc<dyn Fn(AgentEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_str() {
        let evt = AgentEvent::Error {
            message: "boom".into(),
        };
        assert_eq!(evt.event_type(), "error");

        let evt = AgentEvent::Done {
            response: "ok".into(),
            usage: TokenUsage::default(),
            num_turns: 1,
        };
        assert_eq!(evt.event_type(), "done");
    }

    #[test]
    fn serde_roundtrip() {
        let events = vec![
            AgentEvent::User {
                id: MessageId::from_raw("message_1"),
                content: "hi".into(),
            },
            AgentEvent::ToolCall {
                id: MessageId::from_raw("message_2"),
                tool_call_id: ToolCallId::from_raw("call_1"),
                name: "read".into(),
                arguments: serde_json::json!({"path": "/tmp/x"}),
            },
            AgentEvent::Consolidation {
                worker_id: WorkerId::from_raw("worker_1"),
                tokens_before: 50000,
                tokens_after: 10000,
                summaries_created: 3,
            },
        ];

        for evt in &events {
            let json = serde_json::to_string(evt).unwrap();
            let parsed: AgentEvent = serde_json::from_str(&json).unwrap();
            let json2 = serde_json::to_string(&parsed).unwrap();
            assert_eq!(json, json2);
        }
    }

    #[test]
    fn tagged_serialization() {
        let evt = AgentEvent::Assistant {
            id: MessageId::from_raw("message_1"),
            content: "hello".into(),
        };
        let json = serde_json::to_value(&evt).unwrap();
        assert_eq!(json["type"], "assistant");
        assert_eq!(json["content"], "hello");
    }
}
