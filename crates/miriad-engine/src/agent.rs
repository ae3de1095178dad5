//! The tool-using agent loop.
//!
//! One call to [`AgentLoop::run`] executes a full turn: the user prompt is
//! appended to temporal memory, the model is called with the assembled
//! system prompt and tool set, tool calls are dispatched sequentially, and
//! the cycle repeats until a response carries no tool calls. Every event is
//! appended to temporal memory in the order the loop observes it and
//! mirrored to the event sink.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use miriad_core::config::AgentConfig;
use miriad_core::events::{AgentEvent, EventSink};
use miriad_core::ids::{IdService, MessageId, SessionId};
use miriad_core::messages::{Message, ToolCallBlock};
use miriad_core::provider::{GenerateRequest, ModelProvider};
use miriad_core::tokens::{estimate_tokens, TokenUsage};
use miriad_core::tools::ToolContext;
use miriad_store::temporal::MessageKind;
use miriad_store::Stores;

use crate::dispatch::dispatch;
use crate::error::EngineError;
use crate::prompt::PromptAssembler;
use crate::registry::ToolRegistry;

pub const MAX_TURNS: u32 = 50;

/// Hook consulted immediately before each model call. A non-empty return
/// is appended to the working conversation and to temporal memory as an
/// extra user message (mid-turn injection).
pub type BeforeTurnHook = Arc<dyn Fn() -> Option<String> + Send + Sync>;

pub struct AgentOptions {
    pub cancel: CancellationToken,
    pub on_event: Option<EventSink>,
    pub on_before_turn: Option<BeforeTurnHook>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            cancel: CancellationToken::new(),
            on_event: None,
            on_before_turn: None,
        }
    }
}

/// Result of a completed turn.
#[derive(Clone, Debug)]
pub struct AgentOutcome {
    pub response: String,
    pub usage: TokenUsage,
    /// Completed tool-dispatch cycles; a text-only answer counts zero.
    pub num_turns: u32,
}

pub struct AgentLoop {
    provider: Arc<dyn ModelProvider>,
    registry: Arc<ToolRegistry>,
    stores: Stores,
    ids: Arc<IdService>,
    config: AgentConfig,
    session_id: SessionId,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        registry: Arc<ToolRegistry>,
        stores: Stores,
        ids: Arc<IdService>,
        config: AgentConfig,
        session_id: SessionId,
    ) -> Self {
        Self {
            provider,
            registry,
            stores,
            ids,
            config,
            session_id,
        }
    }

    /// Execute one turn for a user prompt.
    #[instrument(skip(self, prompt, options), fields(session_id = %self.session_id))]
    pub async fn run(
        &self,
        prompt: &str,
        options: &AgentOptions,
    ) -> Result<AgentOutcome, EngineError> {
        let assembler = PromptAssembler::new(self.stores.clone(), self.config.budgets.clone());

        let user_id = self.append(MessageKind::User, prompt)?;
        self.emit(
            options,
            AgentEvent::User {
                id: user_id,
                content: prompt.to_string(),
            },
        );

        let tool_ctx = ToolContext {
            session_id: self.session_id.clone(),
            abort_signal: options.cancel.clone(),
        };
        let tools = self.registry.definitions();

        let mut conversation = vec![Message::user_text(prompt)];
        let mut usage = TokenUsage::default();
        let mut final_response = String::new();
        let mut num_turns = 0u32;

        for _ in 0..MAX_TURNS {
            if options.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            // Mid-turn injection at the model-call boundary.
            if let Some(hook) = &options.on_before_turn {
                if let Some(injected) = hook().filter(|s| !s.is_empty()) {
                    let id = self.append(MessageKind::User, &injected)?;
                    self.emit(
                        options,
                        AgentEvent::User {
                            id,
                            content: injected.clone(),
                        },
                    );
                    conversation.push(Message::user_text(injected));
                }
            }

            let request = GenerateRequest {
                system: assembler.assemble()?,
                messages: conversation.clone(),
                tools: tools.clone(),
                max_tokens: self.config.max_tokens,
                timeout: None,
            };
            let response = self.provider.generate(&request, &options.cancel).await?;
            usage.add(&response.usage);

            let text = response.message.text_content();
            if !text.is_empty() {
                let id = self.append(MessageKind::Assistant, &text)?;
                self.emit(
                    options,
                    AgentEvent::Assistant {
                        id,
                        content: text.clone(),
                    },
                );
                final_response = text;
            }

            let tool_calls: Vec<ToolCallBlock> =
                response.message.tool_calls().into_iter().cloned().collect();
            if tool_calls.is_empty() {
                self.emit(
                    options,
                    AgentEvent::Done {
                        response: final_response.clone(),
                        usage: usage.clone(),
                        num_turns,
                    },
                );
                return Ok(AgentOutcome {
                    response: final_response,
                    usage,
                    num_turns,
                });
            }

            conversation.push(Message::Assistant(response.message.clone()));

            for call in &tool_calls {
                if options.cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }

                let rendered_call = serde_json::json!({
                    "name": call.name,
                    "arguments": call.arguments,
                })
                .to_string();
                let call_id = self.append(MessageKind::ToolCall, &rendered_call)?;
                self.emit(
                    options,
                    AgentEvent::ToolCall {
                        id: call_id,
                        tool_call_id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                );

                let result = dispatch(&self.registry, call, &tool_ctx).await;
                debug!(tool = %call.name, result_len = result.len(), "tool dispatched");

                let result_id = self.append(MessageKind::ToolResult, &result)?;
                self.emit(
                    options,
                    AgentEvent::ToolResult {
                        id: result_id,
                        tool_call_id: call.id.clone(),
                        content: result.clone(),
                    },
                );
                conversation.push(Message::tool_result(call.id.clone(), result));
            }

            num_turns += 1;
        }

        warn!(max_turns = MAX_TURNS, "agent loop hit the turn cap");
        Err(EngineError::MaxTurnsExceeded(MAX_TURNS))
    }

    fn append(&self, kind: MessageKind, content: &str) -> Result<MessageId, EngineError> {
        let id = self.ids.message_id();
        self.stores
            .temporal
            .append_message(id.clone(), kind, content, estimate_tokens(content))?;
        Ok(id)
    }

    fn emit(&self, options: &AgentOptions, event: AgentEvent) {
        if let Some(sink) = &options.on_event {
            sink(event);
        }
    }
}
