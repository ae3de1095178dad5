//! Wire format for the NDJSON protocol.
//!
//! Inbound lines are user messages or control requests; outbound lines are
//! `assistant`, `system` and `result` objects. Translation from internal
//! [`AgentEvent`]s happens here so the rest of the runtime stays wire-free.

use serde::Deserialize;
use serde_json::{json, Value};

use miriad_core::events::AgentEvent;
use miriad_core::tokens::TokenUsage;

// --- Inbound ---

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    User {
        message: InboundUserMessage,
        #[serde(default)]
        session_id: Option<String>,
    },
    Control {
        action: ControlAction,
    },
}

#[derive(Debug, Deserialize)]
pub struct InboundUserMessage {
    #[allow(dead_code)]
    pub role: String,
    pub content: InboundContent,
}

/// Content is either a plain string or an array of content blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum InboundContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

impl InboundContent {
    /// Flatten to plain text: string content verbatim, block arrays by
    /// concatenating text blocks (others ignored).
    pub fn flatten(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    ContentBlock::Other => None,
                })
                .collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Interrupt,
    Status,
}

// --- Outbound ---

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultSubtype {
    Success,
    Error,
    Cancelled,
}

impl ResultSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

pub fn assistant_text(model: &str, text: &str) -> Value {
    json!({
        "type": "assistant",
        "message": {
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "model": model,
        }
    })
}

pub fn assistant_tool_use(model: &str, tool_call_id: &str, name: &str, input: &Value) -> Value {
    json!({
        "type": "assistant",
        "message": {
            "role": "assistant",
            "content": [{"type": "tool_use", "id": tool_call_id, "name": name, "input": input}],
            "model": model,
        }
    })
}

pub fn system_tool_result(tool_use_id: &str, content: &str) -> Value {
    json!({
        "type": "system",
        "subtype": "tool_result",
        "tool_use_id": tool_use_id,
        "content": content,
    })
}

pub fn system_queued(position: usize) -> Value {
    json!({
        "type": "system",
        "subtype": "queued",
        "position": position,
    })
}

pub fn system_injected(message_count: usize, content_length: usize) -> Value {
    json!({
        "type": "system",
        "subtype": "injected",
        "message_count": message_count,
        "content_length": content_length,
    })
}

pub fn system_interrupted() -> Value {
    json!({
        "type": "system",
        "subtype": "interrupted",
    })
}

pub fn system_status(state: &str, queue_depth: usize) -> Value {
    json!({
        "type": "system",
        "subtype": "status",
        "state": state,
        "queue_depth": queue_depth,
    })
}

pub fn system_error(message: &str) -> Value {
    json!({
        "type": "system",
        "subtype": "error",
        "message": message,
    })
}

pub fn system_consolidation(
    worker_id: &str,
    tokens_before: i64,
    tokens_after: i64,
    summaries_created: u32,
) -> Value {
    json!({
        "type": "system",
        "subtype": "consolidation",
        "worker_id": worker_id,
        "tokens_before": tokens_before,
        "tokens_after": tokens_after,
        "summaries_created": summaries_created,
    })
}

pub fn result_event(
    subtype: ResultSubtype,
    duration_ms: u64,
    num_turns: u32,
    session_id: &str,
    result: Option<&str>,
    usage: Option<&TokenUsage>,
) -> Value {
    let mut event = json!({
        "type": "result",
        "subtype": subtype.as_str(),
        "duration_ms": duration_ms,
        "is_error": subtype == ResultSubtype::Error,
        "num_turns": num_turns,
        "session_id": session_id,
        "result": result,
    });
    if let Some(usage) = usage {
        event["usage"] = json!({
            "input_tokens": usage.input_tokens,
            "output_tokens": usage.output_tokens,
        });
    }
    event
}

/// Convert a loop event to its wire line. `user` echoes and `done` markers
/// have no wire form (the terminal `result` is built separately).
pub fn agent_event_to_wire(event: &AgentEvent, model: &str) -> Option<Value> {
    match event {
        AgentEvent::User { .. } | AgentEvent::Done { .. } => None,
        AgentEvent::Assistant { content, .. } => Some(assistant_text(model, content)),
        AgentEvent::ToolCall {
            tool_call_id,
            name,
            arguments,
            ..
        } => Some(assistant_tool_use(
            model,
            tool_call_id.as_str(),
            name,
            arguments,
        )),
        AgentEvent::ToolResult {
            tool_call_id,
            content,
            ..
        } => Some(system_tool_result(tool_call_id.as_str(), content)),
        AgentEvent::Error { message } => Some(system_error(message)),
        AgentEvent::Consolidation {
            worker_id,
            tokens_before,
            tokens_after,
            summaries_created,
        } => Some(system_consolidation(
            worker_id.as_str(),
            *tokens_before,
            *tokens_after,
            *summaries_created,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_user_message_with_string_content() {
        let line = r#"{"type":"user","message":{"role":"user","content":"Hello"},"session_id":"s1"}"#;
        let msg: InboundMessage = serde_json::from_str(line).unwrap();
        match msg {
            InboundMessage::User {
                message,
                session_id,
            } => {
                assert_eq!(message.content.flatten(), "Hello");
                assert_eq!(session_id.as_deref(), Some("s1"));
            }
            InboundMessage::Control { .. } => panic!("expected user message"),
        }
    }

    #[test]
    fn parse_user_message_with_content_blocks() {
        let line = r#"{"type":"user","message":{"role":"user","content":[
            {"type":"text","text":"part one "},
            {"type":"image","source":"ignored"},
            {"type":"text","text":"part two"}
        ]}}"#;
        let msg: InboundMessage = serde_json::from_str(line).unwrap();
        match msg {
            InboundMessage::User { message, .. } => {
                assert_eq!(message.content.flatten(), "part one part two");
            }
            InboundMessage::Control { .. } => panic!("expected user message"),
        }
    }

    #[test]
    fn parse_control_requests() {
        let interrupt: InboundMessage =
            serde_json::from_str(r#"{"type":"control","action":"interrupt"}"#).unwrap();
        assert!(matches!(
            interrupt,
            InboundMessage::Control {
                action: ControlAction::Interrupt
            }
        ));

        let status: InboundMessage =
            serde_json::from_str(r#"{"type":"control","action":"status"}"#).unwrap();
        assert!(matches!(
            status,
            InboundMessage::Control {
                action: ControlAction::Status
            }
        ));
    }

    #[test]
    fn malformed_line_is_a_parse_error() {
        assert!(serde_json::from_str::<InboundMessage>("not json").is_err());
        assert!(serde_json::from_str::<InboundMessage>(r#"{"type":"mystery"}"#).is_err());
    }

    #[test]
    fn assistant_text_shape() {
        let event = assistant_text("mock-model", "hello");
        assert_eq!(event["type"], "assistant");
        assert_eq!(event["message"]["model"], "mock-model");
        assert_eq!(event["message"]["content"][0]["type"], "text");
        assert_eq!(event["message"]["content"][0]["text"], "hello");
    }

    #[test]
    fn assistant_tool_use_shape() {
        let event = assistant_tool_use(
            "m",
            "call_1",
            "read",
            &serde_json::json!({"path": "/tmp/x"}),
        );
        let block = &event["message"]["content"][0];
        assert_eq!(block["type"], "tool_use");
        assert_eq!(block["id"], "call_1");
        assert_eq!(block["name"], "read");
        assert_eq!(block["input"]["path"], "/tmp/x");
    }

    #[test]
    fn result_event_success_with_usage() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 20,
        };
        let event = result_event(
            ResultSubtype::Success,
            1234,
            1,
            "s1",
            Some("done"),
            Some(&usage),
        );
        assert_eq!(event["subtype"], "success");
        assert_eq!(event["is_error"], false);
        assert_eq!(event["num_turns"], 1);
        assert_eq!(event["session_id"], "s1");
        assert_eq!(event["result"], "done");
        assert_eq!(event["usage"]["input_tokens"], 100);
    }

    #[test]
    fn result_event_error_sets_is_error() {
        let event = result_event(ResultSubtype::Error, 10, 0, "s1", Some("boom"), None);
        assert_eq!(event["subtype"], "error");
        assert_eq!(event["is_error"], true);
        assert!(event.get("usage").is_none());
    }

    #[test]
    fn result_event_cancelled() {
        let event = result_event(ResultSubtype::Cancelled, 10, 0, "s1", None, None);
        assert_eq!(event["subtype"], "cancelled");
        assert_eq!(event["is_error"], false);
        assert_eq!(event["result"], Value::Null);
    }

    #[test]
    fn user_and_done_events_have_no_wire_form() {
        use miriad_core::ids::MessageId;
        let user = AgentEvent::User {
            id: MessageId::from_raw("message_1"),
            content: "hi".into(),
        };
        assert!(agent_event_to_wire(&user, "m").is_none());

        let done = AgentEvent::Done {
            response: "ok".into(),
            usage: TokenUsage::default(),
            num_turns: 0,
        };
        assert!(agent_event_to_wire(&done, "m").is_none());
    }

    #[test]
    fn tool_events_map_to_wire() {
        use miriad_core::ids::{MessageId, ToolCallId};
        let call = AgentEvent::ToolCall {
            id: MessageId::from_raw("message_1"),
            tool_call_id: ToolCallId::from_raw("call_1"),
            name: "read".into(),
            arguments: serde_json::json!({"path": "/x"}),
        };
        let wire = agent_event_to_wire(&call, "m").unwrap();
        assert_eq!(wire["type"], "assistant");
        assert_eq!(wire["message"]["content"][0]["type"], "tool_use");

        let result = AgentEvent::ToolResult {
            id: MessageId::from_raw("message_2"),
            tool_call_id: ToolCallId::from_raw("call_1"),
            content: "ABC".into(),
        };
        let wire = agent_event_to_wire(&result, "m").unwrap();
        assert_eq!(wire["type"], "system");
        assert_eq!(wire["subtype"], "tool_result");
        assert_eq!(wire["tool_use_id"], "call_1");
        assert_eq!(wire["content"], "ABC");
    }
}
