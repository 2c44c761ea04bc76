//! Outbound message tool: queue a message for the human caretaker on the
//! durable messages stream. Delivery is handled outside this process.

use super::traits::{Tool, ToolResult};
use crate::journal::{HumanMessageLog, MAX_MESSAGE_CHARS};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub struct SendHumanMessageTool {
    messages: Arc<HumanMessageLog>,
}

impl SendHumanMessageTool {
    pub fn new(messages: Arc<HumanMessageLog>) -> Self {
        Self { messages }
    }
}

#[async_trait]
impl Tool for SendHumanMessageTool {
    fn name(&self) -> &str {
        "send_message_to_human"
    }

    fn description(&self) -> &str {
        "Queue a message for the human caretaker. Use it to report notable \
         observations, ask for help, or answer an earlier message (set \
         in_reply_to to its message_id). Returns the new message_id."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": format!("Message body, up to {MAX_MESSAGE_CHARS} characters")
                },
                "in_reply_to": {
                    "type": "string",
                    "description": "message_id of the message this answers, if any"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
        let message = args
            .get("message")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("Missing 'message' parameter"))?;
        let in_reply_to = args.get("in_reply_to").and_then(serde_json::Value::as_str);
        ToolResult::from_domain(self.messages.send(message, in_reply_to))
    }
}
