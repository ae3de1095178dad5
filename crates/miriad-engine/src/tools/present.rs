//! Present-state tools: thin wrappers over the storage setters.

use async_trait::async_trait;

use miriad_core::tools::{Tool, ToolContext, ToolError};
use miriad_store::present::{PresentRepo, Task};

pub struct PresentSetMissionTool {
    present: PresentRepo,
}

impl PresentSetMissionTool {
    pub fn new(present: PresentRepo) -> Self {
        Self { present }
    }
}

#[async_trait]
impl Tool for PresentSetMissionTool {
    fn name(&self) -> &str {
        "present_set_mission"
    }

    fn description(&self) -> &str {
        "Set or clear the current mission. Omit the mission to clear it."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "mission": {
                    "type": "string",
                    "description": "The overarching goal being pursued"
                }
            }
        })
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let mission = args["mission"].as_str();
        self.present
            .set_mission(mission)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(match mission {
            Some(m) => format!("mission set: {m}"),
            None => "mission cleared".into(),
        })
    }
}

pub struct PresentSetStatusTool {
    present: PresentRepo,
}

impl PresentSetStatusTool {
    pub fn new(present: PresentRepo) -> Self {
        Self { present }
    }
}

#[async_trait]
impl Tool for PresentSetStatusTool {
    fn name(&self) -> &str {
        "present_set_status"
    }

    fn description(&self) -> &str {
        "Set or clear the one-line status of what is happening right now."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "What the agent is doing at this moment"
                }
            }
        })
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let status = args["status"].as_str();
        self.present
            .set_status(status)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(match status {
            Some(s) => format!("status set: {s}"),
            None => "status cleared".into(),
        })
    }
}

pub struct PresentUpdateTasksTool {
    present: PresentRepo,
}

impl PresentUpdateTasksTool {
    pub fn new(present: PresentRepo) -> Self {
        Self { present }
    }
}

#[async_trait]
impl Tool for PresentUpdateTasksTool {
    fn name(&self) -> &str {
        "present_update_tasks"
    }

    fn description(&self) -> &str {
        "Replace the task list wholesale. Pass every task, not a delta."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["tasks"],
            "properties": {
                "tasks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["id", "content", "status"],
                        "properties": {
                            "id": {"type": "string"},
                            "content": {"type": "string"},
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed", "blocked"]
                            },
                            "blocked_reason": {"type": "string"}
                        }
                    }
                }
            }
        })
    }

    async fn execute(
        &self,
        args: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<String, ToolError> {
        let tasks: Vec<Task> = serde_json::from_value(args["tasks"].clone())
            .map_err(|e| ToolError::InvalidArguments(format!("tasks: {e}")))?;
        let count = tasks.len();
        self.present
            .set_tasks(&tasks)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        Ok(format!("task list replaced ({count} tasks)"))
    }
}
