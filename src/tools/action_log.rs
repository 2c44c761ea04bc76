//! Action journal tool. Every entry is a tagged union: the `type` field
//! selects the payload shape, and mismatched fields are rejected up front.

use super::traits::{Tool, ToolResult};
use crate::journal::{ActionEntry, ActionLog};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct LogActionTool {
    log: Arc<ActionLog>,
}

impl LogActionTool {
    pub fn new(log: Arc<ActionLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Tool for LogActionTool {
    fn name(&self) -> &str {
        "log_action"
    }

    fn description(&self) -> &str {
        "Record an action you took, typed by kind. type='water' takes {ml, \
         outcome?}; type='light' takes {minutes, outcome?}; type='observe' \
         takes {summary}; type='alert' takes {severity, message}. Always \
         include your reasoning."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "type": {
                    "type": "string",
                    "enum": ["water", "light", "observe", "alert"]
                },
                "ml": { "type": "integer", "description": "For type='water'" },
                "minutes": { "type": "integer", "description": "For type='light'" },
                "outcome": { "type": "string", "description": "For water/light" },
                "summary": { "type": "string", "description": "For type='observe'" },
                "severity": {
                    "type": "string",
                    "description": "For type='alert' (e.g. low/medium/high)"
                },
                "message": { "type": "string", "description": "For type='alert'" },
                "reasoning": { "type": "string" }
            },
            "required": ["type", "reasoning"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let entry: ActionEntry = match serde_json::from_value(args) {
            Ok(entry) => entry,
            Err(e) => {
                return Ok(ToolResult::rejected(format!(
                    "invalid action entry (fields must match the type tag): {e}"
                )))
            }
        };
        let timestamp = self.log.record(&entry)?;
        Ok(ToolResult::ok(
            json!({ "recorded": true, "timestamp": timestamp }).to_string(),
        ))
    }
}
