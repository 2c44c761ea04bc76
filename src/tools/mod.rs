//! Tool subsystem for agent-callable capabilities.
//!
//! Each tool implements the [`Tool`] trait defined in [`traits`], which
//! requires a name, description, JSON parameter schema, and an async
//! `execute` method returning a structured [`ToolResult`].
//!
//! [`all_tools`] assembles the full registry from a wired [`Toolbox`]:
//! the plant-status gate pair, the actuators (water, light), the moisture
//! sensor, the journals, notes, outbound messages, one history query tool
//! per stream, and the clock.

pub mod action_log;
pub mod camera;
pub mod history_query;
pub mod light;
pub mod messages;
pub mod moisture;
pub mod notes;
pub mod plant_status;
pub mod thinking;
pub mod traits;
pub mod utcnow;
pub mod water;

pub use action_log::LogActionTool;
pub use camera::LogCameraUsageTool;
pub use history_query::HistoryQueryTool;
pub use light::{LightStatusTool, TurnOffLightTool, TurnOnLightTool};
pub use messages::SendHumanMessageTool;
pub use moisture::ReadMoistureTool;
pub use notes::{FetchNotesTool, SaveNotesTool};
pub use plant_status::{GetCurrentStatusTool, WritePlantStatusTool};
pub use thinking::LogThoughtTool;
pub use traits::{Tool, ToolResult, ToolSpec};
pub use utcnow::UtcNowTool;
pub use water::{DispenseWaterTool, WaterUsageTool};

use crate::toolbox::Toolbox;

/// Create the full tool registry for one process.
pub fn all_tools(toolbox: &Toolbox) -> Vec<Box<dyn Tool>> {
    let mut tools: Vec<Box<dyn Tool>> = vec![
        Box::new(WritePlantStatusTool::new(toolbox.gate.clone())),
        Box::new(GetCurrentStatusTool::new(toolbox.gate.clone())),
        Box::new(DispenseWaterTool::new(toolbox.pump.clone())),
        Box::new(WaterUsageTool::new(toolbox.pump.clone())),
        Box::new(TurnOnLightTool::new(toolbox.light.clone())),
        Box::new(TurnOffLightTool::new(toolbox.light.clone())),
        Box::new(LightStatusTool::new(toolbox.light.clone())),
        Box::new(ReadMoistureTool::new(toolbox.moisture.clone())),
        Box::new(LogThoughtTool::new(toolbox.thoughts.clone())),
        Box::new(LogActionTool::new(toolbox.actions.clone())),
        Box::new(LogCameraUsageTool::new(toolbox.camera.clone())),
        Box::new(SaveNotesTool::new(toolbox.notes.clone())),
        Box::new(FetchNotesTool::new(toolbox.notes.clone())),
        Box::new(SendHumanMessageTool::new(toolbox.messages.clone())),
        Box::new(UtcNowTool::new(toolbox.clock.clone())),
    ];
    for (stream, history) in toolbox.streams() {
        tools.push(Box::new(HistoryQueryTool::new(
            stream,
            history.clone(),
            toolbox.clock.clone(),
        )));
    }
    tools
}
