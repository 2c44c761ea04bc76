//! Grow-light tools: timed activation, immediate deactivation, and status.

use super::traits::{Tool, ToolResult};
use crate::light::LightController;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct TurnOnLightTool {
    light: Arc<LightController>,
}

impl TurnOnLightTool {
    pub fn new(light: Arc<LightController>) -> Self {
        Self { light }
    }
}

#[async_trait]
impl Tool for TurnOnLightTool {
    fn name(&self) -> &str {
        "turn_on_light"
    }

    fn description(&self) -> &str {
        "Turn the grow light on for a fixed duration (30-120 minutes). It turns \
         itself off at the deadline. Rejected while already on or within the \
         30-minute cooldown after the last off. Requires write_plant_status \
         first this cycle."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "minutes": {
                    "type": "integer",
                    "minimum": 30,
                    "maximum": 120,
                    "description": "On-duration in minutes"
                }
            },
            "required": ["minutes"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let minutes = args
            .get("minutes")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow::anyhow!("Missing 'minutes' parameter"))?;
        let minutes = u32::try_from(minutes).unwrap_or(u32::MAX);
        ToolResult::from_domain(self.light.turn_on(minutes).await)
    }
}

pub struct TurnOffLightTool {
    light: Arc<LightController>,
}

impl TurnOffLightTool {
    pub fn new(light: Arc<LightController>) -> Self {
        Self { light }
    }
}

#[async_trait]
impl Tool for TurnOffLightTool {
    fn name(&self) -> &str {
        "turn_off_light"
    }

    fn description(&self) -> &str {
        "Turn the grow light off immediately. Always available (no status \
         prerequisite) and idempotent when the light is already off. Starts \
         the 30-minute cooldown."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: serde_json::Value) -> anyhow::Result<ToolResult> {
        ToolResult::from_domain(self.light.turn_off().await)
    }
}

pub struct LightStatusTool {
    light: Arc<LightController>,
}

impl LightStatusTool {
    pub fn new(light: Arc<LightController>) -> Self {
        Self { light }
    }
}

#[async_trait]
impl Tool for LightStatusTool {
    fn name(&self) -> &str {
        "get_light_status"
    }

    fn description(&self) -> &str {
        "Current light state: on/off, scheduled off time, whether a new \
         activation is allowed, and minutes until it would be. Also reports \
         the live plug state for cross-checking."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: serde_json::Value) -> anyhow::Result<ToolResult> {
        Ok(ToolResult::ok(serde_json::to_string_pretty(
            &self.light.report().await,
        )?))
    }
}
