//! The `Tool` trait every agent-callable capability implements, plus the
//! structured result and spec types handed to the LLM runtime.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of a tool invocation. Domain rejections (budget, cooldown,
/// gate) travel as `success: false` with a populated `error`, so the
/// agent can read the reason and re-plan; `Err` from `execute` is
/// reserved for malformed arguments and unexpected failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }

    /// Map a controller result into a tool result: `Ok` serializes the
    /// payload, domain errors become tagged rejections.
    pub fn from_domain<T: Serialize>(result: Result<T, ToolError>) -> anyhow::Result<Self> {
        match result {
            Ok(payload) => Ok(Self::ok(serde_json::to_string_pretty(&payload)?)),
            Err(e) => Ok(Self::rejected(format!("[{}] {e}", e.kind()))),
        }
    }
}

/// Declarative description of a tool, in the shape LLM providers expect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> serde_json::Value;
    async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_serde() {
        let result = ToolResult::ok("hello");
        let json = serde_json::to_string(&result).unwrap();
        let parsed: ToolResult = serde_json::from_str(&json).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.output, "hello");
        assert!(parsed.error.is_none());
    }

    #[test]
    fn domain_error_becomes_tagged_rejection() {
        let result: Result<serde_json::Value, ToolError> = Err(ToolError::GateNotWritten);
        let tool_result = ToolResult::from_domain(result).unwrap();
        assert!(!tool_result.success);
        let error = tool_result.error.unwrap();
        assert!(error.starts_with("[gate_not_written]"));
    }

    #[test]
    fn tool_spec_serde() {
        let spec = ToolSpec {
            name: "test".into(),
            description: "A test tool".into(),
            parameters: serde_json::json!({"type": "object"}),
        };
        let json = serde_json::to_string(&spec).unwrap();
        let parsed: ToolSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, "test");
        assert_eq!(parsed.description, "A test tool");
    }
}
