//! Agent journals: the thinking log, the structured action log, the
//! camera-usage log, the outbound message stream, and the markdown notes
//! file with its archive.
//!
//! These streams exist so the agent's reasoning and actions survive
//! context resets. They are append-only observations, so none of them
//! consult the cycle gate.

use crate::clock::Clock;
use crate::error::ToolError;
use crate::history::JsonlHistory;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// One entry of the agent's reasoning trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thought {
    pub observation: String,
    #[serde(default)]
    pub hypothesis: Option<String>,
    #[serde(default)]
    pub candidate_actions: Vec<String>,
    pub reasoning: String,
    #[serde(default)]
    pub uncertainties: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Typed payload of an action-log entry. The tag carries the action type;
/// serde rejects payloads whose fields do not match their tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionDetails {
    Water {
        ml: u32,
        #[serde(default)]
        outcome: Option<String>,
    },
    Light {
        minutes: u32,
        #[serde(default)]
        outcome: Option<String>,
    },
    Observe {
        summary: String,
    },
    Alert {
        severity: String,
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEntry {
    #[serde(flatten)]
    pub details: ActionDetails,
    pub reasoning: String,
}

/// Camera activity marker. Capture itself happens outside this process;
/// the stream only answers "when was the camera last used and why".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CameraUse {
    pub kind: String,
    #[serde(default)]
    pub note: Option<String>,
}

pub struct ThoughtLog {
    history: Arc<JsonlHistory>,
    clock: Arc<dyn Clock>,
}

impl ThoughtLog {
    pub fn new(history: Arc<JsonlHistory>, clock: Arc<dyn Clock>) -> Self {
        Self { history, clock }
    }

    pub fn record(&self, thought: &Thought) -> Result<String, ToolError> {
        let timestamp = self.clock.now().to_rfc3339();
        self.history.append(stamped(thought, &timestamp))?;
        Ok(timestamp)
    }

    pub fn history(&self) -> &JsonlHistory {
        &self.history
    }
}

pub struct ActionLog {
    history: Arc<JsonlHistory>,
    clock: Arc<dyn Clock>,
}

impl ActionLog {
    pub fn new(history: Arc<JsonlHistory>, clock: Arc<dyn Clock>) -> Self {
        Self { history, clock }
    }

    pub fn record(&self, entry: &ActionEntry) -> Result<String, ToolError> {
        let timestamp = self.clock.now().to_rfc3339();
        self.history.append(stamped(entry, &timestamp))?;
        Ok(timestamp)
    }

    pub fn history(&self) -> &JsonlHistory {
        &self.history
    }
}

pub struct CameraUsageLog {
    history: Arc<JsonlHistory>,
    clock: Arc<dyn Clock>,
}

impl CameraUsageLog {
    pub fn new(history: Arc<JsonlHistory>, clock: Arc<dyn Clock>) -> Self {
        Self { history, clock }
    }

    pub fn record(&self, usage: &CameraUse) -> Result<String, ToolError> {
        let timestamp = self.clock.now().to_rfc3339();
        self.history.append(stamped(usage, &timestamp))?;
        Ok(timestamp)
    }

    pub fn history(&self) -> &JsonlHistory {
        &self.history
    }
}

/// Longest outbound message the stream accepts.
pub const MAX_MESSAGE_CHARS: usize = 50_000;

#[derive(Debug, Clone, Serialize)]
pub struct MessageReceipt {
    pub message_id: String,
    pub timestamp: String,
}

/// Outbound agent-to-human messages. The stream is the durable record;
/// delivery happens outside this process by tailing it.
pub struct HumanMessageLog {
    history: Arc<JsonlHistory>,
    clock: Arc<dyn Clock>,
}

impl HumanMessageLog {
    pub fn new(history: Arc<JsonlHistory>, clock: Arc<dyn Clock>) -> Self {
        Self { history, clock }
    }

    pub fn send(
        &self,
        message: &str,
        in_reply_to: Option<&str>,
    ) -> Result<MessageReceipt, ToolError> {
        if message.trim().is_empty() {
            return Err(ToolError::Validation("message must not be empty".into()));
        }
        let chars = message.chars().count();
        if chars > MAX_MESSAGE_CHARS {
            return Err(ToolError::Validation(format!(
                "message is too long: {chars} characters, maximum {MAX_MESSAGE_CHARS}"
            )));
        }

        let now = self.clock.now();
        let message_id = format!("msg_{}", now.format("%Y%m%d_%H%M%S_%3f"));
        let timestamp = now.to_rfc3339();
        self.history.append(serde_json::json!({
            "timestamp": timestamp,
            "message_id": message_id,
            "content": message,
            "in_reply_to": in_reply_to,
        }))?;

        tracing::info!(%message_id, chars, "queued message to human");
        Ok(MessageReceipt {
            message_id,
            timestamp,
        })
    }

    pub fn history(&self) -> &JsonlHistory {
        &self.history
    }
}

fn stamped<T: Serialize>(entry: &T, timestamp: &str) -> Value {
    let mut record = serde_json::to_value(entry).unwrap_or(Value::Null);
    if let Some(obj) = record.as_object_mut() {
        obj.insert("timestamp".into(), Value::String(timestamp.to_string()));
    }
    record
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    Replace,
    Append,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotesReceipt {
    pub mode: SaveMode,
    pub bytes: usize,
    pub archived_as: String,
    pub timestamp: String,
}

/// The agent's working-memory document: a single markdown file the agent
/// rewrites or appends to, with a timestamped snapshot archived on every
/// save so earlier revisions are never lost.
pub struct Notes {
    notes_path: PathBuf,
    archive_dir: PathBuf,
    archive_events: Arc<JsonlHistory>,
    clock: Arc<dyn Clock>,
}

impl Notes {
    pub fn new(
        notes_path: PathBuf,
        archive_dir: PathBuf,
        archive_events: Arc<JsonlHistory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            notes_path,
            archive_dir,
            archive_events,
            clock,
        }
    }

    pub fn save(&self, content: &str, mode: SaveMode) -> Result<NotesReceipt, ToolError> {
        let now = self.clock.now();
        let timestamp = now.to_rfc3339();

        if let Some(parent) = self.notes_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let full = match mode {
            SaveMode::Replace => content.to_string(),
            SaveMode::Append => {
                let mut existing = self.fetch()?.unwrap_or_default();
                if !existing.is_empty() && !existing.ends_with('\n') {
                    existing.push('\n');
                }
                existing + content
            }
        };
        std::fs::write(&self.notes_path, &full)?;

        // Snapshot after the write so the archive holds what notes.md holds.
        std::fs::create_dir_all(&self.archive_dir)?;
        let archive_name = format!("{}.md", now.format("%Y%m%dT%H%M%S%3f"));
        std::fs::write(self.archive_dir.join(&archive_name), &full)?;

        if let Err(e) = self.archive_events.append(serde_json::json!({
            "timestamp": timestamp,
            "mode": mode,
            "bytes": full.len(),
            "archived_as": archive_name,
        })) {
            tracing::warn!("failed to record notes archive event: {e}");
        }

        tracing::debug!(?mode, bytes = full.len(), "saved notes");
        Ok(NotesReceipt {
            mode,
            bytes: full.len(),
            archived_as: archive_name,
            timestamp,
        })
    }

    /// Current notes content, `None` if nothing has been saved yet.
    pub fn fetch(&self) -> Result<Option<String>, ToolError> {
        match std::fs::read_to_string(&self.notes_path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
