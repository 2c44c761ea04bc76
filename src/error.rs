//! Typed errors for the tool surface.
//!
//! Every tool failure the agent can see maps to one of these variants, so
//! the caller always gets a structured reason plus the limits that matter
//! for planning the next cycle.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    /// Bad input shape or range. Rejected before any I/O.
    #[error("invalid input: {0}")]
    Validation(String),

    /// Plant status has not been written this cycle.
    #[error("plant status has not been written this cycle; call write_plant_status first")]
    GateNotWritten,

    /// The rolling 24-hour water budget would be exceeded.
    #[error(
        "daily water limit would be exceeded: {used_ml}ml used of {limit_ml}ml in the trailing 24h, {requested_ml}ml requested"
    )]
    DailyLimitExceeded {
        used_ml: u32,
        limit_ml: u32,
        requested_ml: u32,
    },

    /// The light was turned off too recently to activate again.
    #[error("light cooldown active: wait {minutes_remaining} more minutes before turning on")]
    CooldownActive { minutes_remaining: i64 },

    /// The light is already on; one active interval at a time.
    #[error("light is already on, scheduled to turn off at {off_at}")]
    LightAlreadyOn { off_at: String },

    /// The ml-to-seconds conversion left the pump's accepted range.
    #[error("calibration error: {0}")]
    Calibration(String),

    /// Network/timeout/non-2xx failure talking to the ESP32 or smart plug.
    /// No history record is written for the attempted action.
    #[error("peripheral error: {0}")]
    Peripheral(String),

    /// The moisture sensor could not be reached; absence, not a zero value.
    #[error("moisture sensor unavailable: {0}")]
    SensorUnavailable(String),

    /// History append failed. Logged and propagated, never retried; a
    /// completed physical actuation is not rolled back.
    #[error("history write failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Stable machine-readable tag for the agent to branch on.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Validation(_) => "validation_error",
            ToolError::GateNotWritten => "gate_not_written",
            ToolError::DailyLimitExceeded { .. } => "daily_limit_exceeded",
            ToolError::CooldownActive { .. } => "cooldown_active",
            ToolError::LightAlreadyOn { .. } => "light_already_on",
            ToolError::Calibration(_) => "calibration_error",
            ToolError::Peripheral(_) => "peripheral_error",
            ToolError::SensorUnavailable(_) => "sensor_unavailable",
            ToolError::Io(_) => "io_error",
        }
    }
}
