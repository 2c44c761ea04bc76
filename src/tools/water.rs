//! Watering tools: dispense against the rolling budget, and read usage.

use super::traits::{Tool, ToolResult};
use crate::water::WaterPump;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct DispenseWaterTool {
    pump: Arc<WaterPump>,
}

impl DispenseWaterTool {
    pub fn new(pump: Arc<WaterPump>) -> Self {
        Self { pump }
    }
}

#[async_trait]
impl Tool for DispenseWaterTool {
    fn name(&self) -> &str {
        "dispense_water"
    }

    fn description(&self) -> &str {
        "Dispense a small amount of water (10-25 ml per call) through the pump. \
         Subject to a 500 ml rolling 24-hour budget; larger waterings are \
         multiple calls. Requires write_plant_status first this cycle."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "ml": {
                    "type": "integer",
                    "minimum": 10,
                    "maximum": 25,
                    "description": "Milliliters to dispense in this call"
                }
            },
            "required": ["ml"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let ml = args
            .get("ml")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow::anyhow!("Missing 'ml' parameter"))?;
        let ml = u32::try_from(ml).unwrap_or(u32::MAX);
        ToolResult::from_domain(self.pump.dispense(ml).await)
    }
}

pub struct WaterUsageTool {
    pump: Arc<WaterPump>,
}

impl WaterUsageTool {
    pub fn new(pump: Arc<WaterPump>) -> Self {
        Self { pump }
    }
}

#[async_trait]
impl Tool for WaterUsageTool {
    fn name(&self) -> &str {
        "get_water_usage_24h"
    }

    fn description(&self) -> &str {
        "Water dispensed over the trailing 24 hours: used ml, remaining budget, \
         and event count. Always computed fresh from the dispense history."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: serde_json::Value) -> anyhow::Result<ToolResult> {
        Ok(ToolResult::ok(serde_json::to_string_pretty(
            &self.pump.usage_24h(),
        )?))
    }
}
