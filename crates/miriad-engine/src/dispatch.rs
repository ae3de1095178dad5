//! Tool dispatch with error-to-result redirection.
//!
//! The dispatcher never raises to the agent loop. A call that names an
//! unknown tool or fails schema validation is substituted with a synthetic
//! call to the internal [`INVALID_TOOL_CALL`] tool, whose output tells the
//! model what went wrong so it can retry. Execution failures are rendered
//! as tool_result text.

use async_trait::async_trait;

use miriad_core::messages::ToolCallBlock;
use miriad_core::tools::{Tool, ToolContext, ToolError};

use crate::registry::ToolRegistry;
use crate::validate::validate_args;

pub const INVALID_TOOL_CALL: &str = "__invalid_tool_call__";

/// Dispatch one tool call, always producing tool_result text.
pub async fn dispatch(registry: &ToolRegistry, call: &ToolCallBlock, ctx: &ToolContext) -> String {
    let redirect = match registry.get(&call.name) {
        None => Some(format!("unknown tool \"{}\"", call.name)),
        Some(tool) => validate_args(&tool.parameters_schema(), &call.arguments).err(),
    };

    if let Some(validation_error) = redirect {
        let synthetic_args = serde_json::json!({
            "attempted_tool_name": call.name,
            "attempted_args_as_json": call.arguments.to_string(),
            "validation_error": validation_error,
        });
        return match InvalidToolCall.execute(synthetic_args, ctx).await {
            Ok(text) | Err(ToolError::ExecutionFailed(text)) => text,
            Err(e) => e.to_string(),
        };
    }

    // Presence was just checked; the registry is not mutated mid-dispatch.
    let Some(tool) = registry.get(&call.name) else {
        return format!("Error executing tool \"{}\": tool disappeared", call.name);
    };

    match tool.execute(call.arguments.clone(), ctx).await {
        Ok(text) => text,
        Err(e) => format!("Error executing tool \"{}\": {e}", call.name),
    }
}

/// Internal tool that reports a malformed tool call back to the model.
struct InvalidToolCall;

#[async_trait]
impl Tool for InvalidToolCall {
    fn name(&self) -> &str {
        INVALID_TOOL_CALL
    }

    fn description(&self) -> &str {
        "Reports an invalid tool call back to the model"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["attempted_tool_name", "attempted_args_as_json", "validation_error"],
            "properties": {
                "attempted_tool_name": {"type": "string"},
                "attempted_args_as_json": {"type": "string"},
                "validation_error": {"type": "string"}
            }
        })
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let name = args["attempted_tool_name"].as_str().unwrap_or("<unknown>");
        let attempted = args["attempted_args_as_json"].as_str().unwrap_or("{}");
        let error = args["validation_error"].as_str().unwrap_or("invalid call");
        Ok(format!(
            "Invalid tool call: tool \"{name}\" with arguments {attempted} was rejected: {error}. \
             Check the tool name and parameter schema, then retry."
        ))
    }
}
