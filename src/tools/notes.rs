//! Notes tools: the agent's single markdown working document, with a
//! timestamped archive copy on every save.

use super::traits::{Tool, ToolResult};
use crate::journal::{Notes, SaveMode};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct SaveNotesTool {
    notes: Arc<Notes>,
}

impl SaveNotesTool {
    pub fn new(notes: Arc<Notes>) -> Self {
        Self { notes }
    }
}

#[async_trait]
impl Tool for SaveNotesTool {
    fn name(&self) -> &str {
        "save_notes"
    }

    fn description(&self) -> &str {
        "Save the markdown notes document. mode='replace' rewrites it, \
         mode='append' adds to the end. Every save archives a timestamped \
         snapshot, so nothing is ever lost."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "content": { "type": "string" },
                "mode": {
                    "type": "string",
                    "enum": ["replace", "append"],
                    "default": "replace"
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let content = args
            .get("content")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("Missing 'content' parameter"))?;
        let mode = match args.get("mode").and_then(serde_json::Value::as_str) {
            None | Some("replace") => SaveMode::Replace,
            Some("append") => SaveMode::Append,
            Some(other) => {
                return Ok(ToolResult::rejected(format!(
                    "unknown mode '{other}', use replace or append"
                )))
            }
        };
        ToolResult::from_domain(self.notes.save(content, mode))
    }
}

pub struct FetchNotesTool {
    notes: Arc<Notes>,
}

impl FetchNotesTool {
    pub fn new(notes: Arc<Notes>) -> Self {
        Self { notes }
    }
}

#[async_trait]
impl Tool for FetchNotesTool {
    fn name(&self) -> &str {
        "fetch_notes"
    }

    fn description(&self) -> &str {
        "Return the current markdown notes document, or an empty marker if \
         none has been saved yet."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: serde_json::Value) -> anyhow::Result<ToolResult> {
        match self.notes.fetch()? {
            Some(content) => Ok(ToolResult::ok(content)),
            None => Ok(ToolResult::ok("(no notes saved yet)")),
        }
    }
}
