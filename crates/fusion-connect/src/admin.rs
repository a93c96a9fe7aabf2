//! Admin controls: simulation scenario switching and reset
//!
//! The backend guards both operations with a short lock (HTTP 409) and a
//! global cooldown (HTTP 429). Both map onto typed `ConnectError`
//! variants. The client also remembers the last cooldown it learned about
//! and refuses locally until it has elapsed, so repeated clicks never reach
//! the server.

use crate::client::ApiClient;
use crate::error::{ConnectError, ConnectResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Simulation presets known to the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    #[default]
    Normal,
    Stress,
    Incident,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Normal => "normal",
            Scenario::Stress => "stress",
            Scenario::Incident => "incident",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Scenario::Normal),
            "stress" => Ok(Scenario::Stress),
            "incident" => Ok(Scenario::Incident),
            other => Err(format!(
                "unknown scenario '{}' (expected normal, stress or incident)",
                other
            )),
        }
    }
}

/// Generator intervals in seconds per entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rates {
    pub event: u64,
    pub asset: u64,
    pub alert: u64,
}

/// `GET /api/admin/state`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminState {
    pub scenario: Scenario,
    pub rates: Rates,
    pub cooldown_remaining: u64,
}

/// `POST /api/admin/scenario`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioResponse {
    pub ok: bool,
    pub scenario: Scenario,
    pub rates: Rates,
    pub cooldown_sec: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeletedCounts {
    pub events: u64,
    pub assets: u64,
    pub alerts: u64,
}

/// `POST /api/admin/reset`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetResponse {
    pub ok: bool,
    pub deleted: DeletedCounts,
    pub cooldown_sec: u64,
}

/// Payload of an `admin_notice` live event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminNotice {
    /// `scenario_changed` or `simulation_reset`
    pub kind: String,
    /// Short anonymous actor hash
    pub actor: String,
    /// Unix seconds
    pub ts: i64,
    pub cooldown_sec: u64,
    pub data: Value,
}

impl AdminNotice {
    /// Decode a notice, accepting both the bare payload and the
    /// `{ "type": "admin_notice", "data": {...} }` envelope
    pub fn from_value(value: &Value) -> Option<Self> {
        let inner = match value.get("type").and_then(Value::as_str) {
            Some("admin_notice") => value.get("data")?,
            _ => value,
        };
        let notice: AdminNotice = serde_json::from_value(inner.clone()).ok()?;
        (!notice.kind.is_empty()).then_some(notice)
    }

    pub fn summary(&self) -> String {
        match self.kind.as_str() {
            "scenario_changed" => {
                let scenario = self
                    .data
                    .get("scenario")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                format!("scenario set to {} by {}", scenario, self.actor)
            }
            "simulation_reset" => format!("simulation reset by {}", self.actor),
            other => format!("{} by {}", other, self.actor),
        }
    }
}

/// Locally known admin cooldown deadline
#[derive(Debug, Clone, Default)]
pub struct CooldownTracker {
    until: Arc<Mutex<Option<Instant>>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or extend) the cooldown window
    pub fn record(&self, secs: u64) {
        if secs == 0 {
            return;
        }
        let deadline = Instant::now() + Duration::from_secs(secs);
        if let Ok(mut until) = self.until.lock() {
            if until.map_or(true, |current| current < deadline) {
                *until = Some(deadline);
            }
        }
    }

    /// Time left before the next admin operation may be attempted
    pub fn remaining(&self) -> Duration {
        let Ok(until) = self.until.lock() else {
            return Duration::ZERO;
        };
        until
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Whole seconds left, rounded up
    pub fn remaining_secs(&self) -> u64 {
        let remaining = self.remaining();
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }

    pub fn is_active(&self) -> bool {
        !self.remaining().is_zero()
    }

    pub fn reset(&self) {
        if let Ok(mut until) = self.until.lock() {
            *until = None;
        }
    }
}

/// Client for the `/api/admin/*` endpoints
#[derive(Debug, Clone)]
pub struct AdminClient {
    client: ApiClient,
    cooldown: CooldownTracker,
}

impl AdminClient {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            cooldown: CooldownTracker::new(),
        }
    }

    pub fn cooldown(&self) -> &CooldownTracker {
        &self.cooldown
    }

    /// Current scenario, rates and server-side cooldown
    pub async fn state(&self) -> ConnectResult<AdminState> {
        let state: AdminState = self.client.get_json("api/admin/state", &[]).await?;
        self.cooldown.record(state.cooldown_remaining);
        Ok(state)
    }

    /// Switch the simulation preset
    pub async fn set_scenario(&self, scenario: Scenario) -> ConnectResult<ScenarioResponse> {
        self.check_cooldown()?;

        let response: ScenarioResponse = self
            .client
            .post_json("api/admin/scenario", &json!({ "scenario": scenario }))
            .await
            .map_err(|e| self.map_admin_error(e))?;

        info!(
            "🎛️  Scenario set to {} (cooldown {}s)",
            response.scenario, response.cooldown_sec
        );
        self.cooldown.record(response.cooldown_sec);
        Ok(response)
    }

    /// Wipe events, assets and alerts on the backend and re-bootstrap assets
    pub async fn reset(&self) -> ConnectResult<ResetResponse> {
        self.check_cooldown()?;

        let response: ResetResponse = self
            .client
            .post_json("api/admin/reset", &json!({}))
            .await
            .map_err(|e| self.map_admin_error(e))?;

        info!(
            "🧹 Simulation reset: {} events, {} assets, {} alerts deleted",
            response.deleted.events, response.deleted.assets, response.deleted.alerts
        );
        self.cooldown.record(response.cooldown_sec);
        Ok(response)
    }

    fn check_cooldown(&self) -> ConnectResult<()> {
        let remaining_secs = self.cooldown.remaining_secs();
        if remaining_secs > 0 {
            return Err(ConnectError::CooldownActive { remaining_secs });
        }
        Ok(())
    }

    fn map_admin_error(&self, err: ConnectError) -> ConnectError {
        match err {
            ConnectError::Status { status: 409, .. } => ConnectError::Busy,
            ConnectError::Status {
                status: 429,
                ref body,
                ..
            } => {
                let remaining_secs = parse_retry_secs(body).unwrap_or(0);
                warn!("Admin cooldown active on server ({}s left)", remaining_secs);
                self.cooldown.record(remaining_secs);
                ConnectError::CooldownActive { remaining_secs }
            }
            other => other,
        }
    }
}

/// Pull the seconds out of `{"detail": "Cooldown active. Try again in 42s."}`
fn parse_retry_secs(body: &str) -> Option<u64> {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string());

    let tail = detail.split("in ").last()?;
    let digits: String = tail.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
