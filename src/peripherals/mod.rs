//! HTTP peripherals: the ESP32 garden controller and the grow-light plug.
//!
//! Both are plain HTTP peers on the private network. Every call carries an
//! explicit timeout and surfaces failures as [`ToolError::Peripheral`] (or
//! `SensorUnavailable` for moisture reads) so a wedged device can never
//! stall a care cycle.

pub mod esp32;
pub mod plug;

pub use esp32::{Esp32Client, MoistureReading, PumpReceipt};
pub use plug::SmartPlugClient;
