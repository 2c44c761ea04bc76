//! Construction and wiring of every controller, store, and peripheral
//! client from a loaded [`Config`]. One `Toolbox` per process; the tool
//! registry borrows `Arc` handles from it.

use crate::clock::Clock;
use crate::config::Config;
use crate::gate::CycleGate;
use crate::history::JsonlHistory;
use crate::journal::{ActionLog, CameraUsageLog, HumanMessageLog, Notes, ThoughtLog};
use crate::light::LightController;
use crate::moisture::MoistureSensor;
use crate::peripherals::esp32::Esp32Client;
use crate::water::WaterPump;
use std::sync::Arc;

pub struct Toolbox {
    pub config: Config,
    pub clock: Arc<dyn Clock>,
    pub esp32: Arc<Esp32Client>,
    pub gate: Arc<CycleGate>,
    pub pump: Arc<WaterPump>,
    pub light: Arc<LightController>,
    pub moisture: Arc<MoistureSensor>,
    pub thoughts: Arc<ThoughtLog>,
    pub actions: Arc<ActionLog>,
    pub camera: Arc<CameraUsageLog>,
    pub notes: Arc<Notes>,
    pub messages: Arc<HumanMessageLog>,
    streams: Vec<(&'static str, Arc<JsonlHistory>)>,
}

impl Toolbox {
    pub fn new(config: Config, clock: Arc<dyn Clock>) -> Self {
        let data = &config.data_dir;
        let cap = config.history.max_memory_entries;
        let stream =
            |name: &str| Arc::new(JsonlHistory::new(data.join(format!("{name}.jsonl")), cap));

        let moisture_history = stream("moisture");
        let water_history = stream("water_pump");
        let light_history = stream("light_events");
        let thinking_history = stream("thinking");
        let action_history = stream("action_log");
        let camera_history = stream("camera_usage");
        let status_history = stream("plant_status");
        let notes_events = stream("notes_events");
        let message_history = stream("messages_to_human");

        let esp32 = Arc::new(Esp32Client::new(&config.esp32));
        let gate = Arc::new(CycleGate::new(status_history.clone(), clock.clone()));
        let pump = Arc::new(WaterPump::new(
            water_history.clone(),
            esp32.clone(),
            gate.clone(),
            clock.clone(),
            config.water.clone(),
        ));
        let light = Arc::new(LightController::open(
            data.join("light_state.json"),
            light_history.clone(),
            &config.plug,
            gate.clone(),
            clock.clone(),
            config.light.clone(),
        ));
        let moisture = Arc::new(MoistureSensor::new(
            esp32.clone(),
            moisture_history.clone(),
            clock.clone(),
        ));
        let thoughts = Arc::new(ThoughtLog::new(thinking_history.clone(), clock.clone()));
        let actions = Arc::new(ActionLog::new(action_history.clone(), clock.clone()));
        let camera = Arc::new(CameraUsageLog::new(camera_history.clone(), clock.clone()));
        let notes = Arc::new(Notes::new(
            data.join("notes.md"),
            data.join("notes_archive"),
            notes_events.clone(),
            clock.clone(),
        ));
        let messages = Arc::new(HumanMessageLog::new(message_history.clone(), clock.clone()));

        let streams = vec![
            ("moisture", moisture_history),
            ("water_pump", water_history),
            ("light_events", light_history),
            ("thinking", thinking_history),
            ("action_log", action_history),
            ("camera_usage", camera_history),
            ("plant_status", status_history),
            ("notes_events", notes_events),
            ("messages_to_human", message_history),
        ];

        Self {
            config,
            clock,
            esp32,
            gate,
            pump,
            light,
            moisture,
            thoughts,
            actions,
            camera,
            notes,
            messages,
            streams,
        }
    }

    /// Startup reconciliation: rebuild or catch up the light timer from
    /// persisted state. Call once after construction, inside the runtime.
    pub async fn reconcile(&self) {
        self.light.reconcile().await;
    }

    /// Named history streams, one query tool each.
    pub fn streams(&self) -> &[(&'static str, Arc<JsonlHistory>)] {
        &self.streams
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::system_clock;
    use tempfile::TempDir;

    #[test]
    fn toolbox_wires_every_stream() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            data_dir: tmp.path().to_path_buf(),
            ..Config::default()
        };
        let toolbox = Toolbox::new(config, system_clock());

        let names: Vec<_> = toolbox.streams().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            [
                "moisture",
                "water_pump",
                "light_events",
                "thinking",
                "action_log",
                "camera_usage",
                "plant_status",
                "notes_events",
                "messages_to_human"
            ]
        );
        // The gate shares the plant_status stream with its query tool.
        toolbox
            .gate
            .history()
            .append(serde_json::json!({"timestamp": "2025-06-01T12:00:00Z"}))
            .unwrap();
        let (_, status_stream) = &toolbox.streams()[6];
        assert_eq!(status_stream.len(), 1);
    }
}
