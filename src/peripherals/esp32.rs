//! Client for the ESP32 garden controller.
//!
//! Wire contract (fixed by the firmware):
//! - `GET /moisture` -> `{value: 0..4095, timestamp, status}`
//! - `POST /pump {seconds: 1..=30}` -> `{success, duration, timestamp}` on
//!   2xx, `{success: false, error}` with 400 (out of range) or 409 (pump
//!   already active) otherwise
//! - `GET /status` -> health/telemetry blob, passed through untouched
//!
//! The firmware enforces its own 30-second actuation ceiling; this client
//! validates before sending so a miscalibrated request fails here, not on
//! the device.

use crate::config::Esp32Config;
use crate::error::ToolError;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Hard actuation ceiling baked into the firmware.
pub const PUMP_MAX_SECONDS: u32 = 30;
pub const PUMP_MIN_SECONDS: u32 = 1;

#[derive(Debug, Clone, Deserialize)]
pub struct MoistureReading {
    /// Raw ADC value (0..=4095). Lower is drier.
    pub value: u32,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PumpReceipt {
    pub success: bool,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub struct Esp32Client {
    base_url: String,
    client: reqwest::Client,
    moisture_timeout: Duration,
    pump_timeout: Duration,
}

impl Esp32Client {
    pub fn new(config: &Esp32Config) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            moisture_timeout: Duration::from_secs(config.moisture_timeout_secs),
            pump_timeout: Duration::from_secs(config.pump_timeout_secs),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Read the soil moisture sensor. Connection/timeout failures surface
    /// as `SensorUnavailable`: a missing reading is absence, never zero.
    pub async fn read_moisture(&self) -> Result<MoistureReading, ToolError> {
        let url = format!("{}/moisture", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.moisture_timeout)
            .send()
            .await
            .map_err(|e| ToolError::SensorUnavailable(describe_reqwest_error(&url, &e)))?;

        if !response.status().is_success() {
            return Err(ToolError::SensorUnavailable(format!(
                "{url} returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<MoistureReading>()
            .await
            .map_err(|e| ToolError::SensorUnavailable(format!("invalid sensor payload: {e}")))
    }

    /// Activate the pump for `seconds`. Returns only after the controller
    /// confirms actuation; any failure means no water moved as far as this
    /// process is concerned, and the caller must not record a dispense.
    pub async fn activate_pump(&self, seconds: u32) -> Result<PumpReceipt, ToolError> {
        if !(PUMP_MIN_SECONDS..=PUMP_MAX_SECONDS).contains(&seconds) {
            return Err(ToolError::Calibration(format!(
                "pump duration {seconds}s is outside the controller's accepted range \
                 ({PUMP_MIN_SECONDS}-{PUMP_MAX_SECONDS}s)"
            )));
        }

        let url = format!("{}/pump", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(self.pump_timeout)
            .json(&serde_json::json!({ "seconds": seconds }))
            .send()
            .await
            .map_err(|e| ToolError::Peripheral(describe_reqwest_error(&url, &e)))?;

        let status = response.status();
        let body: PumpReceipt = response.json().await.map_err(|e| {
            ToolError::Peripheral(format!("invalid pump response from {url}: {e}"))
        })?;

        if !status.is_success() || !body.success {
            let reason = body
                .error
                .unwrap_or_else(|| format!("HTTP {status} with no error detail"));
            // 409 means the pump is mid-actuation from an earlier request.
            return Err(ToolError::Peripheral(format!(
                "pump activation refused: {reason}"
            )));
        }

        Ok(body)
    }

    /// Controller health/telemetry. Not consulted by any safety decision.
    pub async fn status(&self) -> Result<Value, ToolError> {
        let url = format!("{}/status", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.moisture_timeout)
            .send()
            .await
            .map_err(|e| ToolError::Peripheral(describe_reqwest_error(&url, &e)))?;
        response
            .json::<Value>()
            .await
            .map_err(|e| ToolError::Peripheral(format!("invalid status payload: {e}")))
    }
}

fn describe_reqwest_error(url: &str, e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("no response from {url} within the timeout")
    } else if e.is_connect() {
        format!("cannot reach {url}: {e}")
    } else {
        format!("request to {url} failed: {e}")
    }
}
