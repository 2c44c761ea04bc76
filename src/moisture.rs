//! Soil moisture sensor adapter.
//!
//! Thin layer over the ESP32 client: every successful read is appended to
//! the moisture history stream so trends survive restarts. Failed reads
//! record nothing; a gap in the stream means the sensor was unreachable,
//! never that the soil was at zero.

use crate::clock::Clock;
use crate::error::ToolError;
use crate::history::JsonlHistory;
use crate::peripherals::esp32::Esp32Client;
use serde::Serialize;
use std::sync::Arc;

/// Raw ADC range of the capacitive probe.
pub const ADC_MAX: u32 = 4095;

#[derive(Debug, Clone, Serialize)]
pub struct MoistureSample {
    /// Raw ADC value (0..=4095). Lower is drier.
    pub value: u32,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_status: Option<String>,
}

pub struct MoistureSensor {
    esp32: Arc<Esp32Client>,
    history: Arc<JsonlHistory>,
    clock: Arc<dyn Clock>,
}

impl MoistureSensor {
    pub fn new(esp32: Arc<Esp32Client>, history: Arc<JsonlHistory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            esp32,
            history,
            clock,
        }
    }

    /// Read the sensor and append the sample to history. Read tools are
    /// not gated; observation is always allowed.
    pub async fn read(&self) -> Result<MoistureSample, ToolError> {
        let reading = self.esp32.read_moisture().await?;
        if reading.value > ADC_MAX {
            return Err(ToolError::SensorUnavailable(format!(
                "implausible ADC value {} (max {ADC_MAX})",
                reading.value
            )));
        }

        let sample = MoistureSample {
            value: reading.value,
            timestamp: self.clock.now().to_rfc3339(),
            sensor_status: reading.status,
        };
        if let Err(e) = self.history.append(serde_json::json!({
            "timestamp": sample.timestamp,
            "value": sample.value,
        })) {
            tracing::warn!("failed to record moisture sample: {e}");
        }

        tracing::debug!(value = sample.value, "moisture sample");
        Ok(sample)
    }

    pub fn history(&self) -> &JsonlHistory {
        &self.history
    }
}
