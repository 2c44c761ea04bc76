//! End-to-end flow through the tool registry: one agent cycle against
//! mocked peripherals, exercising the gate ordering, the actuators, and
//! the history query tools the way the agent runtime drives them.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;
use verdant::clock::ManualClock;
use verdant::tools::{all_tools, Tool};
use verdant::{Config, Toolbox};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    toolbox: Toolbox,
    tools: Vec<Box<dyn Tool>>,
    clock: Arc<ManualClock>,
    _tmp: TempDir,
}

impl Harness {
    fn tool(&self, name: &str) -> &dyn Tool {
        self.tools
            .iter()
            .find(|tool| tool.name() == name)
            .unwrap_or_else(|| panic!("tool {name} not registered"))
            .as_ref()
    }

    async fn call(&self, name: &str, args: serde_json::Value) -> verdant::tools::ToolResult {
        self.tool(name).execute(args).await.unwrap()
    }
}

async fn harness(esp32: &MockServer, plug: &MockServer) -> Harness {
    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
    ));
    let mut config = Config {
        data_dir: tmp.path().to_path_buf(),
        ..Config::default()
    };
    config.esp32.base_url = esp32.uri();
    config.esp32.moisture_timeout_secs = 2;
    config.esp32.pump_timeout_secs = 2;
    config.plug.base_url = plug.uri();
    config.plug.timeout_secs = 2;

    let toolbox = Toolbox::new(config, clock.clone());
    toolbox.reconcile().await;
    let tools = all_tools(&toolbox);
    Harness {
        toolbox,
        tools,
        clock,
        _tmp: tmp,
    }
}

async fn mount_healthy_peripherals(esp32: &MockServer, plug: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/moisture"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": 1450, "timestamp": "2025-06-01T08:00:00Z", "status": "ok"
        })))
        .mount(esp32)
        .await;
    Mock::given(method("POST"))
        .and(path("/pump"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "duration": 6, "timestamp": "2025-06-01T08:00:00Z"
        })))
        .mount(esp32)
        .await;
    for service in ["turn_on", "turn_off"] {
        Mock::given(method("POST"))
            .and(path(format!("/api/services/switch/{service}")))
            .respond_with(ResponseTemplate::new(200))
            .mount(plug)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/api/states/switch.grow_light"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entity_id": "switch.grow_light", "state": "on"
        })))
        .mount(plug)
        .await;
}

#[tokio::test]
async fn one_full_cycle_through_the_tools() {
    let esp32 = MockServer::start().await;
    let plug = MockServer::start().await;
    mount_healthy_peripherals(&esp32, &plug).await;
    let h = harness(&esp32, &plug).await;

    // Observation is ungated.
    let reading = h.call("read_moisture", json!({})).await;
    assert!(reading.success);

    // Actuation before the status write is refused.
    let refused = h.call("dispense_water", json!({ "ml": 20 })).await;
    assert!(!refused.success);
    assert!(refused.error.unwrap().contains("gate_not_written"));
    let refused = h.call("turn_on_light", json!({ "minutes": 60 })).await;
    assert!(!refused.success);

    // Write the assessment, then act.
    let ack = h
        .call(
            "write_plant_status",
            json!({
                "sensor_reading": 1450,
                "water_24h": 0.0,
                "light_today": 0.0,
                "plant_state": "stressed",
                "next_action_sequence": [
                    { "order": 1, "action": "water", "value": 20 },
                    { "order": 2, "action": "light", "value": 60 }
                ],
                "reasoning": "dry and dim morning"
            }),
        )
        .await;
    assert!(ack.success);
    let ack: serde_json::Value = serde_json::from_str(&ack.output).unwrap();
    assert_eq!(ack["proceed"], true);

    let receipt = h.call("dispense_water", json!({ "ml": 20 })).await;
    assert!(receipt.success);
    let receipt: serde_json::Value = serde_json::from_str(&receipt.output).unwrap();
    assert_eq!(receipt["remaining_24h"], 480);

    let activation = h.call("turn_on_light", json!({ "minutes": 60 })).await;
    assert!(activation.success);

    // Journal the cycle.
    assert!(
        h.call(
            "log_action",
            json!({ "type": "water", "ml": 20, "reasoning": "per plan" })
        )
        .await
        .success
    );
    assert!(
        h.call(
            "log_thought",
            json!({
                "observation": "moisture 1450",
                "reasoning": "watered and lit per plan",
                "tags": ["cycle"]
            })
        )
        .await
        .success
    );

    // The streams saw everything.
    let water = h
        .call("water_pump_history", json!({ "action": "recent", "limit": 5 }))
        .await;
    let body: serde_json::Value = serde_json::from_str(&water.output).unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["records"][0]["ml_dispensed"], 20);

    let lights = h
        .call("light_events_history", json!({ "action": "recent", "limit": 5 }))
        .await;
    let body: serde_json::Value = serde_json::from_str(&lights.output).unwrap();
    assert_eq!(body["records"][0]["event"], "on");

    let usage = h.call("get_water_usage_24h", json!({})).await;
    let body: serde_json::Value = serde_json::from_str(&usage.output).unwrap();
    assert_eq!(body["used_ml"], 20);

    // Next cycle: reset closes the gate again.
    h.toolbox.gate.reset_cycle();
    let refused = h.call("dispense_water", json!({ "ml": 10 })).await;
    assert!(!refused.success);
}

#[tokio::test]
async fn water_budget_is_enforced_across_a_day() {
    let esp32 = MockServer::start().await;
    let plug = MockServer::start().await;
    mount_healthy_peripherals(&esp32, &plug).await;
    let h = harness(&esp32, &plug).await;

    h.call(
        "write_plant_status",
        json!({
            "sensor_reading": 1200, "water_24h": 0.0, "light_today": 0.0,
            "plant_state": "critical", "next_action_sequence": [],
            "reasoning": "very dry, will water in steps"
        }),
    )
    .await;

    // 20 successful 25ml dispenses exhaust the 500ml budget.
    for _ in 0..20 {
        h.clock.advance(Duration::minutes(10));
        let result = h.call("dispense_water", json!({ "ml": 25 })).await;
        assert!(result.success);
    }
    let over = h.call("dispense_water", json!({ "ml": 10 })).await;
    assert!(!over.success);
    assert!(over.error.unwrap().contains("daily_limit_exceeded"));

    // 24h after the first dispense, the earliest events roll off.
    h.clock.advance(Duration::hours(21));
    let result = h.call("dispense_water", json!({ "ml": 25 })).await;
    assert!(result.success);
}

#[tokio::test]
async fn light_cooldown_timeline_at_the_tool_surface() {
    let esp32 = MockServer::start().await;
    let plug = MockServer::start().await;
    mount_healthy_peripherals(&esp32, &plug).await;
    let h = harness(&esp32, &plug).await;

    h.call(
        "write_plant_status",
        json!({
            "sensor_reading": 1800, "water_24h": 0.0, "light_today": 0.0,
            "plant_state": "healthy", "next_action_sequence": [],
            "reasoning": "supplemental light"
        }),
    )
    .await;

    assert!(h.call("turn_on_light", json!({ "minutes": 60 })).await.success);

    // Manual off at T0+60, retry at T0+70 lands mid-cooldown.
    h.clock.advance(Duration::minutes(60));
    assert!(h.call("turn_off_light", json!({})).await.success);
    h.clock.advance(Duration::minutes(10));
    let refused = h.call("turn_on_light", json!({ "minutes": 30 })).await;
    assert!(!refused.success);
    assert!(refused.error.unwrap().contains("cooldown_active"));

    let status = h.call("get_light_status", json!({})).await;
    let report: serde_json::Value = serde_json::from_str(&status.output).unwrap();
    assert_eq!(report["can_activate"], false);
    assert_eq!(report["minutes_until_available"], 20);

    // T0+100: cooldown elapsed.
    h.clock.advance(Duration::minutes(30));
    assert!(h.call("turn_on_light", json!({ "minutes": 30 })).await.success);
}

#[tokio::test]
async fn history_survives_a_process_restart() {
    let esp32 = MockServer::start().await;
    let plug = MockServer::start().await;
    mount_healthy_peripherals(&esp32, &plug).await;

    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(),
    ));
    let mut config = Config {
        data_dir: tmp.path().to_path_buf(),
        ..Config::default()
    };
    config.esp32.base_url = esp32.uri();
    config.plug.base_url = plug.uri();

    {
        let toolbox = Toolbox::new(config.clone(), clock.clone());
        toolbox.reconcile().await;
        let tools = all_tools(&toolbox);
        let dispense = tools.iter().find(|t| t.name() == "dispense_water").unwrap();
        toolbox.gate.write_status(
            &serde_json::from_value(json!({
                "sensor_reading": 1500, "water_24h": 0.0, "light_today": 0.0,
                "plant_state": "healthy", "next_action_sequence": [],
                "reasoning": "restart test"
            }))
            .unwrap(),
        );
        assert!(dispense.execute(json!({ "ml": 25 })).await.unwrap().success);
    }

    // A fresh toolbox over the same data dir sees the dispense and counts
    // it against the budget.
    let toolbox = Toolbox::new(config, clock);
    toolbox.reconcile().await;
    assert_eq!(toolbox.pump.usage_24h().used_ml, 25);
}
