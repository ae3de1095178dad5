//! Agentic compaction of temporal memory.
//!
//! When the uncompacted token estimate crosses the configured threshold, a
//! tracked `temporal-compact` worker runs a small LLM loop over the same
//! system prompt and history view as the main agent. Its only tools are
//! `create_summary` (insert a summary covering an id range) and
//! `finish_compaction` (stop early). Compaction is best-effort: failures
//! are recorded on the worker row and never escalate to the owning turn.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use miriad_core::config::AgentConfig;
use miriad_core::ids::{IdService, WorkerId};
use miriad_core::messages::{Message, ToolCallBlock};
use miriad_core::provider::{GenerateRequest, ModelProvider};
use miriad_core::tokens::estimate_tokens;
use miriad_core::tools::ToolDefinition;
use miriad_store::workers::WorkerKind;
use miriad_store::Stores;

use crate::error::EngineError;
use crate::prompt::PromptAssembler;

pub const MAX_COMPACTION_TURNS: u32 = 10;
pub const MAX_INNER_TURNS: u32 = 5;

pub const CREATE_SUMMARY: &str = "create_summary";
pub const FINISH_COMPACTION: &str = "finish_compaction";

#[derive(Clone, Debug)]
pub struct CompactionOutcome {
    pub worker_id: WorkerId,
    pub tokens_before: i64,
    pub tokens_after: i64,
    pub summaries_created: u32,
}

pub struct CompactionAgent {
    provider: Arc<dyn ModelProvider>,
    stores: Stores,
    ids: Arc<IdService>,
    config: AgentConfig,
}

impl CompactionAgent {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        stores: Stores,
        ids: Arc<IdService>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            stores,
            ids,
            config,
        }
    }

    /// Whether the uncompacted estimate exceeds the threshold.
    pub fn needed(&self) -> Result<bool, EngineError> {
        let tokens = self.stores.temporal.estimate_uncompacted_tokens()?;
        Ok(tokens > self.config.budgets.compaction_threshold)
    }

    /// Run one compaction pass as a tracked worker.
    #[instrument(skip(self, cancel))]
    pub async fn run(&self, cancel: &CancellationToken) -> Result<CompactionOutcome, EngineError> {
        let worker_id = self.ids.worker_id();
        self.stores
            .workers
            .create(worker_id.clone(), WorkerKind::TemporalCompact)?;

        match self.run_inner(cancel).await {
            Ok((tokens_before, tokens_after, summaries_created)) => {
                self.stores.workers.complete(&worker_id)?;
                info!(
                    worker_id = %worker_id,
                    tokens_before,
                    tokens_after,
                    summaries_created,
                    "compaction completed"
                );
                Ok(CompactionOutcome {
                    worker_id,
                    tokens_before,
                    tokens_after,
                    summaries_created,
                })
            }
            Err(e) => {
                warn!(worker_id = %worker_id, error = %e, "compaction failed");
                if let Err(mark) = self.stores.workers.fail(&worker_id, &e.to_string()) {
                    warn!(worker_id = %worker_id, error = %mark, "could not mark worker failed");
                }
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(i64, i64, u32), EngineError> {
        let assembler = PromptAssembler::new(self.stores.clone(), self.config.budgets.clone());
        let target = self.config.budgets.compaction_target;
        let tools = compaction_tools();

        let tokens_before = self.stores.temporal.estimate_uncompacted_tokens()?;
        let mut summaries_created = 0u32;
        let mut finished = false;

        for _ in 0..MAX_COMPACTION_TURNS {
            if finished {
                break;
            }
            let tokens = self.stores.temporal.estimate_uncompacted_tokens()?;
            if tokens <= target {
                break;
            }

            // The history view changed if the previous turn created
            // summaries, so the prompt is rebuilt every outer turn.
            let system = assembler.assemble()?;
            let task = format!(
                "Temporal memory currently holds about {tokens} tokens; compress it to at most \
                 {target}. Create summaries over ranges of the history shown above, using the ids \
                 from the [id:...] and [summary from:... to:...] markers as start_id and end_id. \
                 Prefer wide ranges over the oldest material. Call finish_compaction when the \
                 history is sufficiently compact."
            );
            let mut conversation = vec![Message::user_text(task)];

            for _ in 0..MAX_INNER_TURNS {
                if cancel.is_cancelled() {
                    return Err(EngineError::Cancelled);
                }

                let request = GenerateRequest {
                    system: system.clone(),
                    messages: conversation.clone(),
                    tools: tools.clone(),
                    max_tokens: self.config.max_tokens,
                    timeout: None,
                };
                let response = self.provider.generate(&request, cancel).await?;

                let tool_calls: Vec<ToolCallBlock> =
                    response.message.tool_calls().into_iter().cloned().collect();
                if tool_calls.is_empty() {
                    break;
                }
                conversation.push(Message::Assistant(response.message.clone()));

                for call in &tool_calls {
                    let result = match call.name.as_str() {
                        CREATE_SUMMARY => match self.handle_create_summary(&call.arguments) {
                            Ok(id) => {
                                summaries_created += 1;
                                format!("created summary {id}")
                            }
                            Err(reason) => format!("error: {reason}"),
                        },
                        FINISH_COMPACTION => {
                            finished = true;
                            let reason = call.arguments["reason"].as_str().unwrap_or("done");
                            format!("compaction finished: {reason}")
                        }
                        other => format!("error: unknown tool \"{other}\""),
                    };
                    conversation.push(Message::tool_result(call.id.clone(), result));
                }

                if finished {
                    break;
                }
            }
        }

        let tokens_after = self.stores.temporal.estimate_uncompacted_tokens()?;
        Ok((tokens_before, tokens_after, summaries_created))
    }

    /// Validate and insert one summary. Errors are returned as text for the
    /// tool_result so the model can correct itself.
    fn handle_create_summary(&self, args: &serde_json::Value) -> Result<String, String> {
        let start_id = args["start_id"]
            .as_str()
            .ok_or("start_id is required")?
            .to_string();
        let end_id = args["end_id"]
            .as_str()
            .ok_or("end_id is required")?
            .to_string();
        let narrative = args["narrative"].as_str().ok_or("narrative is required")?;
        let observations: Vec<String> = args["key_observations"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        let tags: Vec<String> = args["tags"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        if start_id > end_id {
            return Err(format!("invalid range: start_id {start_id} > end_id {end_id}"));
        }

        let messages = self
            .stores
            .temporal
            .get_messages()
            .map_err(|e| e.to_string())?;
        let summaries = self
            .stores
            .temporal
            .get_summaries()
            .map_err(|e| e.to_string())?;

        // Valid boundaries: every message id plus every existing summary
        // boundary.
        let valid_ids: HashSet<&str> = messages
            .iter()
            .map(|m| m.id.as_str())
            .chain(summaries.iter().flat_map(|s| {
                [s.start_id.as_str(), s.end_id.as_str()]
            }))
            .collect();
        if !valid_ids.contains(start_id.as_str()) {
            return Err(format!("invalid id: {start_id}"));
        }
        if !valid_ids.contains(end_id.as_str()) {
            return Err(format!("invalid id: {end_id}"));
        }

        // Order: one above the highest-order summary this range subsumes.
        let subsumed_max = summaries
            .iter()
            .filter(|s| start_id.as_str() <= s.start_id.as_str() && s.end_id.as_str() <= end_id.as_str())
            .map(|s| s.order)
            .max()
            .unwrap_or(0);
        let order = subsumed_max + 1;

        let tokens = estimate_tokens(narrative)
            + observations.iter().map(|o| estimate_tokens(o)).sum::<i64>();

        let id = self.ids.summary_id();
        self.stores
            .temporal
            .create_summary(
                id.clone(),
                order,
                &start_id,
                &end_id,
                narrative,
                &observations,
                &tags,
                tokens,
            )
            .map_err(|e| e.to_string())?;
        Ok(id.into_inner())
    }
}

/// The compaction agent's entire tool set.
pub fn compaction_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: CREATE_SUMMARY.into(),
            description: "Insert a summary covering an inclusive range of temporal ids. \
                          Covered messages disappear from future history views."
                .into(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "required": ["start_id", "end_id", "narrative"],
                "properties": {
                    "start_id": {"type": "string", "description": "First id of the covered range"},
                    "end_id": {"type": "string", "description": "Last id of the covered range"},
                    "narrative": {"type": "string", "description": "Prose summary of the range"},
                    "key_observations": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Durable facts worth keeping verbatim"
                    },
                    "tags": {"type": "array", "items": {"type": "string"}}
                }
            }),
        },
        ToolDefinition {
            name: FINISH_COMPACTION.into(),
            description: "Declare this compaction pass done.".into(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "reason": {"type": "string"}
                }
            }),
        },
    ]
}
