//! Soil moisture reading tool. Observation is ungated.

use super::traits::{Tool, ToolResult};
use crate::moisture::MoistureSensor;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct ReadMoistureTool {
    sensor: Arc<MoistureSensor>,
}

impl ReadMoistureTool {
    pub fn new(sensor: Arc<MoistureSensor>) -> Self {
        Self { sensor }
    }
}

#[async_trait]
impl Tool for ReadMoistureTool {
    fn name(&self) -> &str {
        "read_moisture"
    }

    fn description(&self) -> &str {
        "Read the capacitive soil moisture sensor. Returns the raw ADC value \
         (0-4095, lower is drier); the reading is also appended to the \
         moisture history. Fails, rather than reporting zero, when the sensor \
         is unreachable."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: serde_json::Value) -> anyhow::Result<ToolResult> {
        ToolResult::from_domain(self.sensor.read().await)
    }
}
