use serde::{Deserialize, Serialize};

use crate::ids::ToolCallId;
use crate::tokens::TokenUsage;

/// One turn of the working conversation sent to the model.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum Message {
    #[serde(rename = "user")]
    User(UserMessage),
    #[serde(rename = "assistant")]
    Assistant(AssistantMessage),
    #[serde(rename = "tool_result")]
    ToolResult(ToolResultMessage),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserMessage {
    pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub content: Vec<AssistantContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResultMessage {
    pub tool_call_id: ToolCallId,
    pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssistantContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_call")]
    ToolCall(ToolCallBlock),
}

/// A tool invocation requested by the model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallBlock {
    pub id: ToolCallId,
    pub name: String,
    pub arguments: serde_json::Value,
}

// --- Convenience constructors ---

impl Message {
    pub fn user_text(text: impl Into<String>) -> Self {
        Message::User(UserMessage {
            content: text.into(),
        })
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Message::Assistant(AssistantMessage::text(text))
    }

    pub fn tool_result(tool_call_id: ToolCallId, text: impl Into<String>) -> Self {
        Message::ToolResult(ToolResultMessage {
            tool_call_id,
            content: text.into(),
        })
    }
}

impl AssistantMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![AssistantContent::Text { text: text.into() }],
            usage: None,
        }
    }

    pub fn tool_calls(&self) -> Vec<&ToolCallBlock> {
        self.content
            .iter()
            .filter_map(|c| match c {
                AssistantContent::ToolCall(tc) => Some(tc),
                AssistantContent::Text { .. } => None,
            })
            .collect()
    }

    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text { text } => Some(text.as_str()),
                AssistantContent::ToolCall(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn has_tool_calls(&self) -> bool {
        self.content
            .iter()
            .any(|c| matches!(c, AssistantContent::ToolCall(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_text_message() {
        let msg = Message::user_text("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn tool_result_message() {
        let id = ToolCallId::from_raw("call_1");
        let msg = Message::tool_result(id.clone(), "result");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool_result");
        assert_eq!(json["tool_call_id"], id.as_str());
        assert_eq!(json["content"], "result");
    }

    #[test]
    fn assistant_tool_calls_extracted() {
        let tc = ToolCallBlock {
            id: ToolCallId::from_raw("call_1"),
            name: "read".into(),
            arguments: serde_json::json!({"path": "/tmp/x"}),
        };
        let msg = AssistantMessage {
            content: vec![
                AssistantContent::Text {
                    text: "reading file".into(),
                },
                AssistantContent::ToolCall(tc),
            ],
            usage: None,
        };
        assert!(msg.has_tool_calls());
        assert_eq!(msg.tool_calls().len(), 1);
        assert_eq!(msg.tool_calls()[0].name, "read");
        assert_eq!(msg.text_content(), "reading file");
    }

    #[test]
    fn text_only_message_has_no_tool_calls() {
        let msg = AssistantMessage::text("just text");
        assert!(!msg.has_tool_calls());
        assert!(msg.tool_calls().is_empty());
    }

    #[test]
    fn serde_roundtrip_all_variants() {
        let messages = vec![
            Message::user_text("hi"),
            Message::assistant_text("hello"),
            Message::tool_result(ToolCallId::from_raw("call_1"), "done"),
            Message::Assistant(AssistantMessage {
                content: vec![
                    AssistantContent::Text {
                        text: "using a tool".into(),
                    },
                    AssistantContent::ToolCall(ToolCallBlock {
                        id: ToolCallId::from_raw("call_2"),
                        name: "bash".into(),
                        arguments: serde_json::json!({"command": "ls"}),
                    }),
                ],
                usage: Some(TokenUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                }),
            }),
        ];

        for msg in &messages {
            let json = serde_json::to_string(msg).unwrap();
            let parsed: Message = serde_json::from_str(&json).unwrap();
            let json2 = serde_json::to_string(&parsed).unwrap();
            assert_eq!(json, json2, "roundtrip failed for {json}");
        }
    }
}
