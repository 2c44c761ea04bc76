#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use verdant::clock::system_clock;
use verdant::tools::all_tools;
use verdant::{Config, Toolbox};

#[derive(Parser, Debug)]
#[command(
    name = "verdant",
    version,
    about = "Autonomous plant-care controller: safety-checked watering, grow-light \
             scheduling, and append-only care history, exposed as agent tools"
)]
struct Cli {
    /// Path to the TOML config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect and invoke the agent tool surface
    Tool {
        #[command(subcommand)]
        command: ToolCommands,
    },
    /// Manage the per-cycle status gate
    Cycle {
        #[command(subcommand)]
        command: CycleCommands,
    },
    /// Check peripheral connectivity (ESP32 controller and smart plug)
    Doctor,
}

#[derive(Subcommand, Debug)]
enum ToolCommands {
    /// List every registered tool with its parameter schema
    List,
    /// Call one tool with JSON arguments
    Call {
        /// Tool name, e.g. dispense_water
        name: String,
        /// JSON arguments, e.g. '{"ml": 20}' (defaults to {})
        args: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum CycleCommands {
    /// Close the gate so the next cycle must write a fresh status
    Reset,
    /// Show whether a status has been written this cycle
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path(),
    };
    let config = Config::load(&config_path)?;
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

    let toolbox = Toolbox::new(config, system_clock());
    toolbox.reconcile().await;

    match cli.command {
        Commands::Tool { command } => match command {
            ToolCommands::List => {
                let tools = all_tools(&toolbox);
                let specs: Vec<_> = tools.iter().map(|tool| tool.spec()).collect();
                println!("{}", serde_json::to_string_pretty(&specs)?);
            }
            ToolCommands::Call { name, args } => {
                let args: serde_json::Value = match args {
                    Some(raw) => serde_json::from_str(&raw)
                        .with_context(|| format!("arguments are not valid JSON: {raw}"))?,
                    None => serde_json::json!({}),
                };
                let tools = all_tools(&toolbox);
                let Some(tool) = tools.iter().find(|tool| tool.name() == name) else {
                    bail!(
                        "unknown tool '{name}'; run `verdant tool list` for the available set"
                    );
                };
                let result = tool.execute(args).await?;
                println!("{}", serde_json::to_string_pretty(&result)?);
                if !result.success {
                    std::process::exit(1);
                }
            }
        },
        Commands::Cycle { command } => match command {
            CycleCommands::Reset => {
                toolbox.gate.reset_cycle();
                info!("cycle gate reset");
                println!("gate closed; next cycle must write a fresh plant status");
            }
            CycleCommands::Status => {
                let body = serde_json::json!({
                    "written": toolbox.gate.is_written(),
                    "current": toolbox.gate.current_status(),
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
        },
        Commands::Doctor => {
            let mut healthy = true;

            match toolbox.esp32.status().await {
                Ok(status) => println!(
                    "esp32      ok   {}",
                    serde_json::to_string(&status).unwrap_or_default()
                ),
                Err(e) => {
                    healthy = false;
                    println!("esp32      FAIL {e}");
                }
            }
            match toolbox.esp32.read_moisture().await {
                Ok(reading) => println!("moisture   ok   value={}", reading.value),
                Err(e) => {
                    healthy = false;
                    println!("moisture   FAIL {e}");
                }
            }
            let report = toolbox.light.report().await;
            println!(
                "plug       {}  state={}",
                if report.plug_state == "unavailable" {
                    healthy = false;
                    "FAIL"
                } else {
                    "ok  "
                },
                report.plug_state
            );

            if !healthy {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
