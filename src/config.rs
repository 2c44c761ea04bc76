//! Configuration for the plant-care tool server.
//!
//! Loaded from a TOML file (default `~/.verdant/config.toml`), with an
//! environment override for the ESP32 controller URL so deployments can
//! repoint the hardware without editing config. Missing file means
//! defaults; unknown keys are rejected by serde so typos surface early.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `[esp32].base_url`.
pub const ESP32_URL_ENV: &str = "VERDANT_ESP32_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// Directory holding every history stream, the light state file, and notes.
    pub data_dir: PathBuf,
    pub esp32: Esp32Config,
    pub plug: PlugConfig,
    pub water: WaterConfig,
    pub light: LightConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Esp32Config {
    /// Base URL of the ESP32 controller, e.g. `http://192.168.1.40:8080`.
    pub base_url: String,
    /// Timeout for moisture reads. Short: a hung sensor read must not stall
    /// the cycle.
    pub moisture_timeout_secs: u64,
    /// Timeout for pump activation. Longer than the 30s hardware ceiling so
    /// the controller can finish actuating before we give up, still bounded.
    pub pump_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PlugConfig {
    /// Base URL of the Home Assistant instance driving the grow-light plug.
    pub base_url: String,
    /// Entity to switch, e.g. `switch.grow_light`.
    pub entity_id: String,
    /// Long-lived access token. Empty means unauthenticated (test servers).
    pub token: String,
    pub timeout_secs: u64,
    /// Attempts for the "off" call before giving up and transitioning local
    /// state anyway.
    pub off_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WaterConfig {
    /// Hard budget over any trailing 24h window.
    pub max_ml_per_24h: u32,
    pub min_ml_per_dispense: u32,
    pub max_ml_per_dispense: u32,
    /// Pump calibration: millilitres dispensed per second of actuation.
    /// Calibrate by running the pump for a known duration and measuring.
    pub ml_per_second: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LightConfig {
    pub min_on_minutes: u32,
    pub max_on_minutes: u32,
    /// Minimum off time between activations.
    pub cooldown_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct HistoryConfig {
    /// In-memory cache bound per stream; disk keeps full history forever.
    pub max_memory_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            esp32: Esp32Config::default(),
            plug: PlugConfig::default(),
            water: WaterConfig::default(),
            light: LightConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Default for Esp32Config {
    fn default() -> Self {
        Self {
            base_url: "http://esp32.local".into(),
            moisture_timeout_secs: 5,
            pump_timeout_secs: 45,
        }
    }
}

impl Default for PlugConfig {
    fn default() -> Self {
        Self {
            base_url: "http://homeassistant.local:8123".into(),
            entity_id: "switch.grow_light".into(),
            token: String::new(),
            timeout_secs: 10,
            off_retries: 2,
        }
    }
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self {
            max_ml_per_24h: 500,
            min_ml_per_dispense: 10,
            max_ml_per_dispense: 25,
            ml_per_second: 3.5,
        }
    }
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            min_on_minutes: 30,
            max_on_minutes: 120,
            cooldown_minutes: 30,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_memory_entries: 1000,
        }
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "verdant")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".verdant"))
}

impl Config {
    /// Default config file location (`<config dir>/verdant/config.toml`).
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "verdant")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Load from `path`, falling back to defaults when the file is absent.
    /// Applies the ESP32 URL env override and validates.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config at {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("failed to parse config at {}", path.display()))?
        } else {
            Config::default()
        };

        if let Ok(url) = std::env::var(ESP32_URL_ENV) {
            if !url.trim().is_empty() {
                config.esp32.base_url = url.trim().to_string();
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let w = &self.water;
        anyhow::ensure!(
            w.ml_per_second > 0.0,
            "water.ml_per_second must be positive (got {})",
            w.ml_per_second
        );
        anyhow::ensure!(
            w.ml_per_second <= 100.0,
            "water.ml_per_second {} looks unreasonably high (>100 ml/s); verify pump calibration",
            w.ml_per_second
        );
        anyhow::ensure!(
            w.min_ml_per_dispense >= 1 && w.min_ml_per_dispense <= w.max_ml_per_dispense,
            "water dispense bounds are inverted: min {} > max {}",
            w.min_ml_per_dispense,
            w.max_ml_per_dispense
        );
        anyhow::ensure!(
            self.light.min_on_minutes >= 1
                && self.light.min_on_minutes <= self.light.max_on_minutes,
            "light on-duration bounds are inverted: min {} > max {}",
            self.light.min_on_minutes,
            self.light.max_on_minutes
        );
        anyhow::ensure!(
            self.history.max_memory_entries >= 1,
            "history.max_memory_entries must be at least 1"
        );
        Ok(())
    }
}
