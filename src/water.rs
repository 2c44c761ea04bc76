//! Water pump controller.
//!
//! Stateless between calls: the rolling 24-hour budget is recomputed from
//! the event history on every request, so a restart can never drift the
//! counter away from what was actually dispensed. Order of checks is
//! fixed — input range, gate, budget, calibration — all before any
//! peripheral I/O, and the history record is written only after the
//! controller confirms actuation. History must never claim water that did
//! not flow.

use crate::clock::Clock;
use crate::config::WaterConfig;
use crate::error::ToolError;
use crate::gate::CycleGate;
use crate::history::JsonlHistory;
use crate::peripherals::esp32::{Esp32Client, PUMP_MAX_SECONDS};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct DispenseReceipt {
    /// Amount actually dispensed (ml).
    pub dispensed: u32,
    /// Pump actuation duration sent to the controller.
    pub seconds: u32,
    /// Budget left in the trailing 24h window after this dispense.
    pub remaining_24h: u32,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaterUsage {
    pub used_ml: u32,
    pub remaining_ml: u32,
    /// Number of dispense events in the trailing 24h.
    pub events: usize,
}

pub struct WaterPump {
    history: Arc<JsonlHistory>,
    esp32: Arc<Esp32Client>,
    gate: Arc<CycleGate>,
    clock: Arc<dyn Clock>,
    config: WaterConfig,
}

impl WaterPump {
    pub fn new(
        history: Arc<JsonlHistory>,
        esp32: Arc<Esp32Client>,
        gate: Arc<CycleGate>,
        clock: Arc<dyn Clock>,
        config: WaterConfig,
    ) -> Self {
        Self {
            history,
            esp32,
            gate,
            clock,
            config,
        }
    }

    /// Dispense `ml` of water, subject to the per-call bounds and the
    /// rolling 24-hour budget. Larger waterings are multiple calls.
    pub async fn dispense(&self, ml: u32) -> Result<DispenseReceipt, ToolError> {
        if ml < self.config.min_ml_per_dispense || ml > self.config.max_ml_per_dispense {
            return Err(ToolError::Validation(format!(
                "ml must be between {} and {} per dispense (got {ml})",
                self.config.min_ml_per_dispense, self.config.max_ml_per_dispense
            )));
        }
        self.gate.require_written()?;

        let usage = self.usage_24h();
        // Widened so a saturated used_ml from corrupt history still compares
        // instead of overflowing.
        if u64::from(usage.used_ml) + u64::from(ml) > u64::from(self.config.max_ml_per_24h) {
            return Err(ToolError::DailyLimitExceeded {
                used_ml: usage.used_ml,
                limit_ml: self.config.max_ml_per_24h,
                requested_ml: ml,
            });
        }

        // Calibration: ml -> pump seconds, floor of 1s so short dispenses
        // still prime the pump.
        let seconds = (f64::from(ml) / self.config.ml_per_second).round().max(1.0) as u32;
        if seconds > PUMP_MAX_SECONDS {
            return Err(ToolError::Calibration(format!(
                "{ml}ml requires {seconds}s at {} ml/s, above the controller's {PUMP_MAX_SECONDS}s ceiling",
                self.config.ml_per_second
            )));
        }

        // Peripheral failure means no water moved: return without writing
        // any history record.
        self.esp32.activate_pump(seconds).await?;

        let timestamp = self.clock.now().to_rfc3339();
        let remaining_24h = self.config.max_ml_per_24h - usage.used_ml - ml;
        let record = serde_json::json!({
            "timestamp": timestamp,
            "ml_dispensed": ml,
            "seconds": seconds,
            "remaining_24h": remaining_24h,
        });
        // The water already flowed; an append failure is a monitoring gap,
        // logged and propagated, never grounds to pretend otherwise.
        if let Err(e) = self.history.append(record) {
            tracing::error!("dispensed {ml}ml but failed to record it: {e}");
            return Err(e);
        }

        tracing::info!(ml, seconds, remaining_24h, "dispensed water");
        Ok(DispenseReceipt {
            dispensed: ml,
            seconds,
            remaining_24h,
            timestamp,
        })
    }

    /// Usage over the trailing 24 hours, computed fresh from history on
    /// every call. Never cached.
    pub fn usage_24h(&self) -> WaterUsage {
        let events = self.history.get_window(24.0, self.clock.now());
        // Accumulate in u64 and saturate on the way out: a corrupt record
        // with an absurd amount must block dispensing, not wrap the counter
        // past the budget check. Missing or non-numeric amounts are skipped.
        let mut total: u64 = 0;
        for event in &events {
            if let Some(ml) = event.get("ml_dispensed").and_then(serde_json::Value::as_u64) {
                total = total.saturating_add(ml);
            }
        }
        let used_ml = u32::try_from(total).unwrap_or(u32::MAX);
        WaterUsage {
            used_ml,
            remaining_ml: self.config.max_ml_per_24h.saturating_sub(used_ml),
            events: events.len(),
        }
    }

    pub fn history(&self) -> &JsonlHistory {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{Esp32Config, WaterConfig};
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixture {
        pump: WaterPump,
        clock: Arc<ManualClock>,
        gate: Arc<CycleGate>,
        _tmp: TempDir,
    }

    async fn fixture(server: &MockServer) -> Fixture {
        let tmp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let gate = Arc::new(CycleGate::new(
            Arc::new(JsonlHistory::new(tmp.path().join("plant_status.jsonl"), 100)),
            clock.clone(),
        ));
        let esp32 = Arc::new(Esp32Client::new(&Esp32Config {
            base_url: server.uri(),
            moisture_timeout_secs: 2,
            pump_timeout_secs: 2,
        }));
        let pump = WaterPump::new(
            Arc::new(JsonlHistory::new(tmp.path().join("water.jsonl"), 1000)),
            esp32,
            gate.clone(),
            clock.clone(),
            WaterConfig::default(),
        );
        Fixture {
            pump,
            clock,
            gate,
            _tmp: tmp,
        }
    }

    fn open_gate(gate: &CycleGate) {
        let ack = gate.write_status(&crate::gate::PlantStatus {
            sensor_reading: 1800,
            water_24h: 0.0,
            light_today: 0.0,
            plant_state: crate::gate::PlantState::Healthy,
            next_action_sequence: vec![],
            reasoning: "test".into(),
        });
        assert!(ack.proceed);
    }

    async fn mount_pump_ok(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/pump"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true, "duration": 6, "timestamp": "2025-06-01T12:00:00Z"
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn dispense_records_event_and_updates_budget() {
        let server = MockServer::start().await;
        mount_pump_ok(&server).await;
        let f = fixture(&server).await;
        open_gate(&f.gate);

        // Three 25ml dispenses within the hour; the third still succeeds.
        for i in 0..3 {
            f.clock.advance(Duration::minutes(15));
            let receipt = f.pump.dispense(25).await.unwrap();
            assert_eq!(receipt.dispensed, 25);
            assert_eq!(receipt.remaining_24h, 500 - 25 * (i + 1));
        }
        let usage = f.pump.usage_24h();
        assert_eq!(usage.used_ml, 75);
        assert_eq!(usage.remaining_ml, 425);
        assert_eq!(usage.events, 3);
    }

    #[tokio::test]
    async fn oversized_request_is_a_validation_error_before_io() {
        let server = MockServer::start().await;
        let f = fixture(&server).await;
        open_gate(&f.gate);

        let err = f.pump.dispense(500).await.unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
        let err = f.pump.dispense(9).await.unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
        assert_eq!(f.pump.history().len(), 0);
    }

    #[tokio::test]
    async fn gate_must_be_written_first() {
        let server = MockServer::start().await;
        mount_pump_ok(&server).await;
        let f = fixture(&server).await;

        let err = f.pump.dispense(15).await.unwrap_err();
        assert!(matches!(err, ToolError::GateNotWritten));
        assert_eq!(f.pump.history().len(), 0);
    }

    #[tokio::test]
    async fn budget_rejection_leaves_usage_unchanged() {
        let server = MockServer::start().await;
        mount_pump_ok(&server).await;
        let f = fixture(&server).await;
        open_gate(&f.gate);

        // Seed history directly to 490ml used.
        let now = f.clock.now();
        for i in 0..49 {
            f.pump
                .history()
                .append(serde_json::json!({
                    "timestamp": (now - Duration::minutes(60 + i)).to_rfc3339(),
                    "ml_dispensed": 10, "seconds": 3, "remaining_24h": 0,
                }))
                .unwrap();
        }
        assert_eq!(f.pump.usage_24h().used_ml, 490);

        let err = f.pump.dispense(20).await.unwrap_err();
        match err {
            ToolError::DailyLimitExceeded {
                used_ml,
                limit_ml,
                requested_ml,
            } => {
                assert_eq!(used_ml, 490);
                assert_eq!(limit_ml, 500);
                assert_eq!(requested_ml, 20);
            }
            other => panic!("expected DailyLimitExceeded, got {other:?}"),
        }
        assert_eq!(f.pump.usage_24h().used_ml, 490);

        // Exactly filling the budget is allowed.
        f.pump.dispense(10).await.unwrap();
        assert_eq!(f.pump.usage_24h().used_ml, 500);
    }

    #[tokio::test]
    async fn peripheral_failure_writes_no_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pump"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "success": false, "error": "relay fault"
            })))
            .mount(&server)
            .await;
        let f = fixture(&server).await;
        open_gate(&f.gate);

        let before = f.pump.history().len();
        let err = f.pump.dispense(15).await.unwrap_err();
        assert!(matches!(err, ToolError::Peripheral(_)));
        assert_eq!(f.pump.history().len(), before);
        assert_eq!(f.pump.usage_24h().used_ml, 0);
    }

    #[tokio::test]
    async fn budget_window_rolls_off_old_events() {
        let server = MockServer::start().await;
        mount_pump_ok(&server).await;
        let f = fixture(&server).await;
        open_gate(&f.gate);

        let now = f.clock.now();
        // 500ml dispensed 25 hours ago no longer counts.
        f.pump
            .history()
            .append(serde_json::json!({
                "timestamp": (now - Duration::hours(25)).to_rfc3339(),
                "ml_dispensed": 500, "seconds": 30, "remaining_24h": 0,
            }))
            .unwrap();
        assert_eq!(f.pump.usage_24h().used_ml, 0);
        f.pump.dispense(25).await.unwrap();
    }

    #[tokio::test]
    async fn append_failure_after_actuation_surfaces_as_io() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/pump"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true, "duration": 5, "timestamp": "2025-06-01T12:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        ));
        let gate = Arc::new(CycleGate::new(
            Arc::new(JsonlHistory::new(tmp.path().join("plant_status.jsonl"), 100)),
            clock.clone(),
        ));
        let esp32 = Arc::new(Esp32Client::new(&Esp32Config {
            base_url: server.uri(),
            moisture_timeout_secs: 2,
            pump_timeout_secs: 2,
        }));
        // A plain file where the stream's parent directory should be makes
        // every append fail, regardless of process privileges.
        std::fs::write(tmp.path().join("blocked"), b"").unwrap();
        let pump = WaterPump::new(
            Arc::new(JsonlHistory::new(
                tmp.path().join("blocked").join("water.jsonl"),
                1000,
            )),
            esp32,
            gate.clone(),
            clock,
            WaterConfig::default(),
        );
        open_gate(&gate);

        // The pump already ran (the mock verifies exactly one hit), so the
        // failure surfaces as Io, not a rejection, and nothing is recorded.
        let err = pump.dispense(15).await.unwrap_err();
        assert!(matches!(err, ToolError::Io(_)));
        assert_eq!(pump.history().len(), 0);
    }

    #[tokio::test]
    async fn corrupt_oversized_history_amount_degrades_to_rejection() {
        let server = MockServer::start().await;
        mount_pump_ok(&server).await;
        let f = fixture(&server).await;
        open_gate(&f.gate);

        // A record claiming an amount past u32 must not wrap the usage
        // counter back under the budget.
        let now = f.clock.now();
        f.pump
            .history()
            .append(serde_json::json!({
                "timestamp": (now - Duration::hours(1)).to_rfc3339(),
                "ml_dispensed": 10_000_000_000u64, "seconds": 30, "remaining_24h": 0,
            }))
            .unwrap();

        let usage = f.pump.usage_24h();
        assert_eq!(usage.used_ml, u32::MAX);
        assert_eq!(usage.remaining_ml, 0);

        let err = f.pump.dispense(10).await.unwrap_err();
        assert!(matches!(err, ToolError::DailyLimitExceeded { .. }));
        assert_eq!(f.pump.history().len(), 1);
    }

    #[tokio::test]
    async fn randomized_dispense_sequences_never_break_the_budget() {
        use rand::Rng;

        let server = MockServer::start().await;
        mount_pump_ok(&server).await;
        let f = fixture(&server).await;
        open_gate(&f.gate);

        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            f.clock
                .advance(Duration::minutes(rng.gen_range(1..=180)));
            let ml = rng.gen_range(5..=40);
            let _ = f.pump.dispense(ml).await;

            // Invariant: every trailing 24h window stays within budget.
            assert!(f.pump.usage_24h().used_ml <= 500);
        }
    }
}
