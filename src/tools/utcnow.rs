//! Current-time tool, so the agent reasons against the same clock the
//! controllers enforce their windows with.

use super::traits::{Tool, ToolResult};
use crate::clock::Clock;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct UtcNowTool {
    clock: Arc<dyn Clock>,
}

impl UtcNowTool {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Tool for UtcNowTool {
    fn name(&self) -> &str {
        "utcnow"
    }

    fn description(&self) -> &str {
        "Current UTC time as RFC3339. Use this, not your own sense of time, \
         when reasoning about budgets, cooldowns, and schedules."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let now = self.clock.now();
        Ok(ToolResult::ok(
            json!({
                "utc": now.to_rfc3339(),
                "unix": now.timestamp(),
            })
            .to_string(),
        ))
    }
}
