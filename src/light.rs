//! Grow-light controller.
//!
//! Two states, `OFF` and `ON`, with three hard rules: on-duration between
//! 30 and 120 minutes, at most one active interval, and a 30-minute
//! cooldown after every off before the next on. The deactivation timer is
//! an in-process tokio task and is never the source of truth: the absolute
//! `off_at` deadline is persisted, and startup reconciliation rebuilds (or
//! catches up on) the timer from that deadline.
//!
//! Actuation confirmation is asymmetric on purpose. Turning *on* requires
//! the plug to confirm before any state changes; a false "on" in
//! bookkeeping would start the cooldown clock without light. Turning *off*
//! retries a bounded number of times and then transitions locally
//! regardless, because bookkeeping stuck at "on" would let the agent skip
//! the cooldown that exists to protect the plant. A possible physical
//! mismatch on the off path is visible to the agent through photos and the
//! plug state query.

use crate::clock::Clock;
use crate::config::{LightConfig, PlugConfig};
use crate::error::ToolError;
use crate::gate::CycleGate;
use crate::history::JsonlHistory;
use crate::peripherals::plug::SmartPlugClient;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightStatus {
    On,
    Off,
}

/// Persisted bookkeeping. Overwritten in place, not appended; the event
/// history stream carries the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightState {
    pub status: LightStatus,
    #[serde(default)]
    pub last_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_off: Option<DateTime<Utc>>,
    /// Absolute deactivation deadline while on.
    #[serde(default)]
    pub off_at: Option<DateTime<Utc>>,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            status: LightStatus::Off,
            last_on: None,
            last_off: None,
            off_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LightActivation {
    pub status: LightStatus,
    pub duration_minutes: u32,
    pub off_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LightReport {
    pub status: LightStatus,
    pub last_on: Option<String>,
    pub last_off: Option<String>,
    pub off_at: Option<String>,
    pub can_activate: bool,
    pub minutes_until_available: i64,
    /// Live plug state, `"unavailable"` when the plug API is unreachable.
    /// Informational only; never overrides local bookkeeping.
    pub plug_state: String,
}

struct LightInner {
    state: LightState,
    timer: Option<JoinHandle<()>>,
}

pub struct LightController {
    state_path: PathBuf,
    history: Arc<JsonlHistory>,
    plug: Arc<SmartPlugClient>,
    gate: Arc<CycleGate>,
    clock: Arc<dyn Clock>,
    config: LightConfig,
    off_retries: u32,
    inner: Mutex<LightInner>,
}

impl LightController {
    pub fn open(
        state_path: PathBuf,
        history: Arc<JsonlHistory>,
        plug_config: &PlugConfig,
        gate: Arc<CycleGate>,
        clock: Arc<dyn Clock>,
        config: LightConfig,
    ) -> Self {
        let state = load_state(&state_path);
        Self {
            state_path,
            history,
            plug: Arc::new(SmartPlugClient::new(plug_config)),
            gate,
            clock,
            config,
            off_retries: plug_config.off_retries,
            inner: Mutex::new(LightInner { state, timer: None }),
        }
    }

    /// Startup reconciliation. Timers do not survive restarts; the
    /// persisted `off_at` does. A deadline already in the past means a
    /// missed firing: turn off now, backdating `last_off` to the deadline
    /// the light should have honored. A future deadline gets a fresh timer
    /// for the remaining duration.
    pub async fn reconcile(self: &Arc<Self>) {
        let mut inner = self.inner.lock().await;
        if inner.state.status != LightStatus::On {
            return;
        }

        let now = self.clock.now();
        match inner.state.off_at {
            Some(off_at) if off_at > now => {
                tracing::info!(%off_at, "light still on; rescheduling deactivation timer");
                self.schedule_off_timer(&mut inner, off_at);
            }
            Some(off_at) => {
                tracing::warn!(%off_at, "light overran its deadline across a restart; turning off");
                self.do_turn_off(&mut inner, "reconcile", off_at).await;
            }
            None => {
                // On with no deadline should not happen; fail safe.
                tracing::warn!("light state was on with no off_at; turning off");
                self.do_turn_off(&mut inner, "reconcile", now).await;
            }
        }
    }

    /// Activate the light for `minutes`. Requires the gate, a currently-off
    /// light, and an elapsed cooldown; the plug must confirm before any
    /// bookkeeping changes.
    pub async fn turn_on(self: &Arc<Self>, minutes: u32) -> Result<LightActivation, ToolError> {
        if minutes < self.config.min_on_minutes || minutes > self.config.max_on_minutes {
            return Err(ToolError::Validation(format!(
                "minutes must be between {} and {} (got {minutes})",
                self.config.min_on_minutes, self.config.max_on_minutes
            )));
        }
        self.gate.require_written()?;

        let mut inner = self.inner.lock().await;
        let now = self.clock.now();

        if inner.state.status == LightStatus::On {
            let off_at = inner
                .state
                .off_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".into());
            return Err(ToolError::LightAlreadyOn { off_at });
        }
        if let Some(wait) = self.cooldown_remaining(&inner.state, now) {
            return Err(ToolError::CooldownActive {
                minutes_remaining: wait,
            });
        }

        self.plug.turn_on().await?;

        let off_at = now + chrono::Duration::minutes(i64::from(minutes));
        inner.state.status = LightStatus::On;
        inner.state.last_on = Some(now);
        inner.state.off_at = Some(off_at);
        self.persist_state(&inner.state);
        self.append_event(serde_json::json!({
            "timestamp": now.to_rfc3339(),
            "event": "on",
            "duration_minutes": minutes,
            "off_at": off_at.to_rfc3339(),
        }));
        self.schedule_off_timer(&mut inner, off_at);

        tracing::info!(minutes, off_at = %off_at, "grow light on");
        Ok(LightActivation {
            status: LightStatus::On,
            duration_minutes: minutes,
            off_at: off_at.to_rfc3339(),
        })
    }

    /// Deactivate immediately. Gate-exempt (turning the light off must
    /// never be blocked) and idempotent when already off.
    pub async fn turn_off(self: &Arc<Self>) -> Result<LightState, ToolError> {
        let mut inner = self.inner.lock().await;
        if inner.state.status == LightStatus::Off {
            return Ok(inner.state.clone());
        }
        let now = self.clock.now();
        self.do_turn_off(&mut inner, "manual", now).await;
        Ok(inner.state.clone())
    }

    /// Current status plus availability. Opportunistically catches up on an
    /// overdue deadline, mirroring the reconciliation rule.
    pub async fn report(self: &Arc<Self>) -> LightReport {
        let mut inner = self.inner.lock().await;
        let now = self.clock.now();

        if inner.state.status == LightStatus::On {
            if let Some(off_at) = inner.state.off_at {
                if off_at <= now {
                    self.do_turn_off(&mut inner, "overdue", off_at).await;
                }
            }
        }

        let plug_state = match self.plug.state().await {
            Ok(state) => state,
            Err(_) => "unavailable".into(),
        };

        let state = &inner.state;
        let (can_activate, minutes_until_available) = match state.status {
            LightStatus::On => {
                let wait = state
                    .off_at
                    .map(|off_at| ((off_at - now).num_seconds() as f64 / 60.0).ceil() as i64)
                    .unwrap_or(0)
                    .max(1);
                (false, wait)
            }
            LightStatus::Off => match self.cooldown_remaining(state, now) {
                Some(wait) => (false, wait),
                None => (true, 0),
            },
        };

        LightReport {
            status: state.status,
            last_on: state.last_on.map(|t| t.to_rfc3339()),
            last_off: state.last_off.map(|t| t.to_rfc3339()),
            off_at: state.off_at.map(|t| t.to_rfc3339()),
            can_activate,
            minutes_until_available,
            plug_state,
        }
    }

    pub fn history(&self) -> &JsonlHistory {
        &self.history
    }

    /// Minutes left before the cooldown allows an activation, or `None`
    /// when clear. A light that has never been off is immediately available.
    fn cooldown_remaining(&self, state: &LightState, now: DateTime<Utc>) -> Option<i64> {
        let last_off = state.last_off?;
        let cooldown = chrono::Duration::minutes(i64::from(self.config.cooldown_minutes));
        let since_off = now - last_off;
        if since_off >= cooldown {
            None
        } else {
            let wait = ((cooldown - since_off).num_seconds() as f64 / 60.0).ceil() as i64;
            Some(wait.max(1))
        }
    }

    /// Shared off path. Retries the plug a bounded number of times, then
    /// transitions local state regardless so the cooldown clock runs.
    /// `effective_off` backdates `last_off` for missed deadlines.
    async fn do_turn_off(&self, inner: &mut LightInner, trigger: &str, effective_off: DateTime<Utc>) {
        let mut confirmed = false;
        for attempt in 0..=self.off_retries {
            match self.plug.turn_off().await {
                Ok(()) => {
                    confirmed = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(attempt, "plug turn_off failed: {e}");
                }
            }
        }
        if !confirmed {
            tracing::error!(
                trigger,
                "plug never confirmed turn_off; marking off locally so the cooldown runs"
            );
        }

        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        inner.state.status = LightStatus::Off;
        inner.state.last_off = Some(effective_off);
        inner.state.off_at = None;
        self.persist_state(&inner.state);
        self.append_event(serde_json::json!({
            "timestamp": self.clock.now().to_rfc3339(),
            "event": "off",
            "trigger": trigger,
            "peripheral_confirmed": confirmed,
        }));
        tracing::info!(trigger, confirmed, "grow light off");
    }

    fn schedule_off_timer(self: &Arc<Self>, inner: &mut LightInner, off_at: DateTime<Utc>) {
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        let wait = (off_at - self.clock.now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        let weak = Arc::downgrade(self);
        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if let Some(controller) = weak.upgrade() {
                controller.timer_fired().await;
            }
        }));
    }

    async fn timer_fired(self: &Arc<Self>) {
        let mut inner = self.inner.lock().await;
        if inner.state.status != LightStatus::On {
            return;
        }
        let now = self.clock.now();
        self.do_turn_off(&mut inner, "timer", now).await;
    }

    fn persist_state(&self, state: &LightState) {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.state_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let raw = serde_json::to_string_pretty(state).map_err(std::io::Error::other)?;
            std::fs::write(&self.state_path, raw)
        };
        if let Err(e) = write() {
            // The in-memory transition already happened and the event is in
            // the history stream; a stale state file only costs an extra
            // reconciliation step after a restart.
            tracing::error!(path = %self.state_path.display(), "failed to persist light state: {e}");
        }
    }

    fn append_event(&self, event: serde_json::Value) {
        if let Err(e) = self.history.append(event) {
            tracing::warn!("failed to record light event: {e}");
        }
    }
}

fn load_state(path: &PathBuf) -> LightState {
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %path.display(), "malformed light state, starting off: {e}");
                LightState::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => LightState::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), "failed to read light state, starting off: {e}");
            LightState::default()
        }
    }
}
