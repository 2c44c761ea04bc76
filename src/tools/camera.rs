//! Camera-usage marker tool. Image capture happens outside this process;
//! this stream only records that (and why) the camera was used.

use super::traits::{Tool, ToolResult};
use crate::journal::{CameraUsageLog, CameraUse};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct LogCameraUsageTool {
    log: Arc<CameraUsageLog>,
}

impl LogCameraUsageTool {
    pub fn new(log: Arc<CameraUsageLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Tool for LogCameraUsageTool {
    fn name(&self) -> &str {
        "log_camera_usage"
    }

    fn description(&self) -> &str {
        "Record that the camera was used and why (e.g. kind='health_check'). \
         Lets later cycles answer 'when did I last look at the plant'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "kind": {
                    "type": "string",
                    "description": "Purpose of the capture, e.g. health_check, timelapse"
                },
                "note": { "type": "string" }
            },
            "required": ["kind"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let usage: CameraUse = match serde_json::from_value(args) {
            Ok(usage) => usage,
            Err(e) => return Ok(ToolResult::rejected(format!("invalid camera entry: {e}"))),
        };
        let timestamp = self.log.record(&usage)?;
        Ok(ToolResult::ok(
            json!({ "recorded": true, "timestamp": timestamp }).to_string(),
        ))
    }
}
