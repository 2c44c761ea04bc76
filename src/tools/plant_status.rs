//! The cycle gatekeeper's tool surface: the agent writes one structured
//! plant status per cycle before it may act, and can read back what it
//! wrote.

use super::traits::{Tool, ToolResult};
use crate::gate::{CycleGate, PlantStatus};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct WritePlantStatusTool {
    gate: Arc<CycleGate>,
}

impl WritePlantStatusTool {
    pub fn new(gate: Arc<CycleGate>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl Tool for WritePlantStatusTool {
    fn name(&self) -> &str {
        "write_plant_status"
    }

    fn description(&self) -> &str {
        "Record this cycle's plant assessment. Must be called once, before any \
         watering or light action; a second call in the same cycle is rejected \
         with proceed=false. Check the ack before acting."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "sensor_reading": {
                    "type": "integer",
                    "description": "Latest raw moisture ADC value (0-4095)"
                },
                "water_24h": {
                    "type": "number",
                    "description": "Water dispensed over the last 24 hours, ml"
                },
                "light_today": {
                    "type": "number",
                    "description": "Light exposure today, minutes"
                },
                "plant_state": {
                    "type": "string",
                    "enum": ["healthy", "stressed", "concerning", "critical", "unknown"]
                },
                "next_action_sequence": {
                    "type": "array",
                    "description": "Planned steps for this cycle, in order",
                    "items": {
                        "type": "object",
                        "properties": {
                            "order": { "type": "integer", "minimum": 1 },
                            "action": {
                                "type": "string",
                                "enum": ["water", "light", "observe", "wait"]
                            },
                            "value": {
                                "type": "integer",
                                "description": "ml for water, minutes for light"
                            }
                        },
                        "required": ["order", "action"]
                    }
                },
                "reasoning": { "type": "string" }
            },
            "required": ["sensor_reading", "water_24h", "light_today", "plant_state",
                         "next_action_sequence", "reasoning"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let status: PlantStatus = match serde_json::from_value(args) {
            Ok(status) => status,
            Err(e) => return Ok(ToolResult::rejected(format!("invalid plant status: {e}"))),
        };
        let ack = self.gate.write_status(&status);
        Ok(ToolResult {
            success: true,
            output: serde_json::to_string_pretty(&ack)?,
            error: None,
        })
    }
}

pub struct GetCurrentStatusTool {
    gate: Arc<CycleGate>,
}

impl GetCurrentStatusTool {
    pub fn new(gate: Arc<CycleGate>) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl Tool for GetCurrentStatusTool {
    fn name(&self) -> &str {
        "get_current_status"
    }

    fn description(&self) -> &str {
        "Return the plant status written this cycle, or report that none has \
         been written yet."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: serde_json::Value) -> anyhow::Result<ToolResult> {
        match self.gate.current_status() {
            Some(status) => Ok(ToolResult::ok(serde_json::to_string_pretty(&status)?)),
            None => Ok(ToolResult::ok(
                json!({ "written": false, "message": "no status written this cycle" })
                    .to_string(),
            )),
        }
    }
}
