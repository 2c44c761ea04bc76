//! Per-cycle gatekeeper.
//!
//! The agent must write a plant status assessment before any actuating tool
//! runs. The latch is a plain boolean: set by the first successful
//! `write_status` of a cycle, cleared only by an explicit `reset_cycle`
//! from the external scheduler (never by the passage of time). The gate is
//! an injected handle, not a global, so tests build independent instances.

use crate::clock::Clock;
use crate::error::ToolError;
use crate::history::JsonlHistory;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Assessment of plant health; the agent picks one each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlantState {
    Healthy,
    Stressed,
    Concerning,
    Critical,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannedActionKind {
    Water,
    Light,
    Observe,
    Wait,
}

/// One step of the agent's plan for this cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannedAction {
    /// 1-based execution order.
    pub order: u32,
    pub action: PlannedActionKind,
    /// ml for water, minutes for light; absent for observe/wait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

/// The status object the agent must write before acting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlantStatus {
    pub sensor_reading: i64,
    /// Water dispensed in the last 24 hours (ml), as the agent understands it.
    pub water_24h: f64,
    /// Light exposure today (minutes).
    pub light_today: f64,
    pub plant_state: PlantState,
    pub next_action_sequence: Vec<PlannedAction>,
    pub reasoning: String,
}

/// Outcome of a `write_status` call. `proceed: false` is an idempotent
/// rejection the agent is expected to check, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct StatusAck {
    pub proceed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: String,
}

pub struct CycleGate {
    written: AtomicBool,
    current: Mutex<Option<Value>>,
    history: Arc<JsonlHistory>,
    clock: Arc<dyn Clock>,
}

impl CycleGate {
    pub fn new(history: Arc<JsonlHistory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            written: AtomicBool::new(false),
            current: Mutex::new(None),
            history,
            clock,
        }
    }

    /// Record the cycle's assessment and open the gate. A second write in
    /// the same cycle mutates nothing and returns `proceed: false`.
    ///
    /// The status record is persisted for audit, but a failed append does
    /// not keep the gate closed: blocking every action for a cycle over a
    /// logging failure would invert the safety ordering (see the water and
    /// light controllers, which log after actuating for the same reason).
    pub fn write_status(&self, status: &PlantStatus) -> StatusAck {
        if self.written.load(Ordering::SeqCst) {
            let previous = self
                .current
                .lock()
                .as_ref()
                .and_then(|record| record.get("timestamp").and_then(Value::as_str).map(String::from))
                .unwrap_or_default();
            return StatusAck {
                proceed: false,
                reason: Some("Status already written for this cycle".into()),
                timestamp: previous,
            };
        }

        let timestamp = self.clock.now().to_rfc3339();
        let mut record = serde_json::to_value(status).unwrap_or_else(|_| Value::Null);
        if let Some(obj) = record.as_object_mut() {
            obj.insert("timestamp".into(), Value::String(timestamp.clone()));
        }

        if let Err(e) = self.history.append(record.clone()) {
            tracing::warn!("failed to persist plant status: {e}");
        }
        *self.current.lock() = Some(record);
        self.written.store(true, Ordering::SeqCst);

        StatusAck {
            proceed: true,
            reason: None,
            timestamp,
        }
    }

    /// Close the gate for the next cycle. Unconditional and idempotent so
    /// the scheduler can reset both before and after each invocation.
    pub fn reset_cycle(&self) {
        self.written.store(false, Ordering::SeqCst);
    }

    pub fn is_written(&self) -> bool {
        self.written.load(Ordering::SeqCst)
    }

    /// Precondition check used by the mutating action tools.
    pub fn require_written(&self) -> Result<(), ToolError> {
        if self.is_written() {
            Ok(())
        } else {
            Err(ToolError::GateNotWritten)
        }
    }

    /// The status written this cycle, if any. Cleared logically by reset
    /// (the record stays for audit but is no longer "current").
    pub fn current_status(&self) -> Option<Value> {
        if self.is_written() {
            self.current.lock().clone()
        } else {
            None
        }
    }

    pub fn history(&self) -> &JsonlHistory {
        &self.history
    }
}
