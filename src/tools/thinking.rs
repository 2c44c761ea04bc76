//! Reasoning-trace tool. The thought stream is the agent's memory across
//! context resets; entries are structured so they can be searched later.

use super::traits::{Tool, ToolResult};
use crate::journal::{Thought, ThoughtLog};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct LogThoughtTool {
    log: Arc<ThoughtLog>,
}

impl LogThoughtTool {
    pub fn new(log: Arc<ThoughtLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Tool for LogThoughtTool {
    fn name(&self) -> &str {
        "log_thought"
    }

    fn description(&self) -> &str {
        "Append a structured reasoning entry to the thinking journal: what you \
         observed, what you think is going on, what you considered, and what \
         you are unsure about. Use tags for later search."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "observation": { "type": "string" },
                "hypothesis": { "type": "string" },
                "candidate_actions": {
                    "type": "array",
                    "items": { "type": "string" }
                },
                "reasoning": { "type": "string" },
                "uncertainties": {
                    "type": "array",
                    "items": { "type": "string" }
                },
                "tags": {
                    "type": "array",
                    "items": { "type": "string" }
                }
            },
            "required": ["observation", "reasoning"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let thought: Thought = match serde_json::from_value(args) {
            Ok(thought) => thought,
            Err(e) => return Ok(ToolResult::rejected(format!("invalid thought entry: {e}"))),
        };
        let timestamp = self.log.record(&thought)?;
        Ok(ToolResult::ok(
            json!({ "recorded": true, "timestamp": timestamp }).to_string(),
        ))
    }
}
