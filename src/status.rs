//! System Status: what the dashboard knows about its own data
//!
//! Owned and mutated only by the sync orchestrator; everyone else sees a
//! copy inside a `SyncView`.

use chrono::{DateTime, Utc};
use fusion_connect::{AdminNotice, ChannelState, HealthClass, HealthReport};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Error log entries kept by default
pub const DEFAULT_ERROR_CAPACITY: usize = 20;

/// Where the current collections came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Nothing loaded yet
    #[default]
    ColdStart,
    Cache,
    Network,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::ColdStart => write!(f, "cold_start"),
            DataSource::Cache => write!(f, "cache"),
            DataSource::Network => write!(f, "network"),
        }
    }
}

/// One absorbed failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub at: DateTime<Utc>,
    /// Operation that failed (`snapshot`, `cache`, ...)
    pub context: String,
    pub message: String,
}

/// Live channel connection state plus last activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub state: ChannelState,
    pub last_event_time: Option<DateTime<Utc>>,
}

/// Verdict on whether the live feed is actually delivering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    /// Recent traffic, or freshly connected
    Live,
    /// Had traffic, but silent past the threshold
    Stale,
    /// Never delivered and not connected
    Offline,
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Liveness::Live => write!(f, "live"),
            Liveness::Stale => write!(f, "stale"),
            Liveness::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub health: Option<HealthReport>,
    pub last_health_time: Option<DateTime<Utc>>,
    pub last_full_sync_time: Option<DateTime<Utc>>,
    pub source: DataSource,

    /// Newest first, bounded
    pub errors: VecDeque<ErrorLogEntry>,

    pub channel: ChannelStatus,

    /// Outcome of the last health probe (None until the first one)
    pub api_reachable: Option<bool>,

    pub last_admin_notice: Option<AdminNotice>,

    #[serde(skip, default = "default_error_capacity")]
    error_capacity: usize,
}

fn default_error_capacity() -> usize {
    DEFAULT_ERROR_CAPACITY
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self::with_error_capacity(DEFAULT_ERROR_CAPACITY)
    }
}

impl SystemStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_error_capacity(error_capacity: usize) -> Self {
        Self {
            health: None,
            last_health_time: None,
            last_full_sync_time: None,
            source: DataSource::ColdStart,
            errors: VecDeque::new(),
            channel: ChannelStatus::default(),
            api_reachable: None,
            last_admin_notice: None,
            error_capacity: error_capacity.max(1),
        }
    }

    /// Prepend an error, dropping the oldest beyond capacity
    pub fn record_error(
        &mut self,
        context: impl Into<String>,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        self.errors.push_front(ErrorLogEntry {
            at,
            context: context.into(),
            message: message.into(),
        });
        self.errors.truncate(self.error_capacity);
    }

    pub fn record_health(&mut self, report: HealthReport, at: DateTime<Utc>) {
        self.health = Some(report);
        self.last_health_time = Some(at);
        self.api_reachable = Some(true);
    }

    /// Probe failed: store a synthesized degraded report
    pub fn record_health_failure(&mut self, message: impl Into<String>, at: DateTime<Utc>) {
        self.health = Some(HealthReport::degraded(message));
        self.last_health_time = Some(at);
        self.api_reachable = Some(false);
    }

    pub fn record_full_sync(&mut self, at: DateTime<Utc>) {
        self.last_full_sync_time = Some(at);
        self.source = DataSource::Network;
    }

    pub fn health_class(&self) -> Option<HealthClass> {
        self.health.as_ref().map(HealthReport::classify)
    }

    /// Time since the last channel event
    pub fn channel_silence(&self, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.channel.last_event_time?;
        Some(now.signed_duration_since(last).to_std().unwrap_or(Duration::ZERO))
    }

    /// Time since the last full snapshot
    pub fn sync_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.last_full_sync_time?;
        Some(now.signed_duration_since(last).to_std().unwrap_or(Duration::ZERO))
    }

    /// Recent traffic decides; the connection state only matters before the
    /// first event
    pub fn channel_liveness(&self, now: DateTime<Utc>, silence_threshold: Duration) -> Liveness {
        match self.channel_silence(now) {
            Some(silence) if silence < silence_threshold => Liveness::Live,
            Some(_) => Liveness::Stale,
            None if self.channel.state == ChannelState::Connected => Liveness::Live,
            None => Liveness::Offline,
        }
    }

    /// Format a human-readable summary
    pub fn summary(&self, now: DateTime<Utc>) -> String {
        let health = self
            .health_class()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let silence = self
            .channel_silence(now)
            .map(|d| format!("{}s ago", d.as_secs()))
            .unwrap_or_else(|| "never".to_string());

        format!(
            "Source: {} | Health: {} | Channel: {} (last event {}) | Errors: {}",
            self.source,
            health,
            self.channel.state,
            silence,
            self.errors.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_initial_status() {
        let status = SystemStatus::new();
        assert_eq!(status.source, DataSource::ColdStart);
        assert_eq!(status.channel.state, ChannelState::Connecting);
        assert!(status.health.is_none());
        assert_eq!(status.api_reachable, None);
        assert!(status.errors.is_empty());
    }

    #[test]
    fn test_errors_bounded_newest_first() {
        let mut status = SystemStatus::new();
        for i in 0..25 {
            status.record_error("snapshot", format!("failure {}", i), at(i));
        }

        assert_eq!(status.errors.len(), DEFAULT_ERROR_CAPACITY);
        assert_eq!(status.errors[0].message, "failure 24");
        assert_eq!(status.errors[19].message, "failure 5");
    }

    #[test]
    fn test_health_success_and_failure() {
        let mut status = SystemStatus::new();

        let report: HealthReport = serde_json::from_value(serde_json::json!({"ok": true})).unwrap();
        status.record_health(report, at(0));
        assert_eq!(status.api_reachable, Some(true));
        assert_eq!(status.health_class(), Some(HealthClass::Healthy));

        status.record_health_failure("connection refused", at(3));
        assert_eq!(status.api_reachable, Some(false));
        assert_eq!(status.health_class(), Some(HealthClass::Degraded));
        assert_eq!(status.last_health_time, Some(at(3)));
        assert_eq!(
            status.health.as_ref().and_then(|h| h.error.as_deref()),
            Some("connection refused")
        );
    }

    #[test]
    fn test_liveness_prefers_recent_traffic() {
        let threshold = Duration::from_secs(30);
        let mut status = SystemStatus::new();
        assert_eq!(status.channel_liveness(at(0), threshold), Liveness::Offline);

        status.channel.state = ChannelState::Connected;
        assert_eq!(status.channel_liveness(at(0), threshold), Liveness::Live);

        // state says down, but an event arrived 5s ago
        status.channel.state = ChannelState::Down;
        status.channel.last_event_time = Some(at(10));
        assert_eq!(status.channel_liveness(at(15), threshold), Liveness::Live);

        // state says connected, but nothing for a minute
        status.channel.state = ChannelState::Connected;
        assert_eq!(status.channel_liveness(at(70), threshold), Liveness::Stale);
        assert_eq!(status.channel_silence(at(70)), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_full_sync_sets_network_source() {
        let mut status = SystemStatus::new();
        status.source = DataSource::Cache;
        status.record_full_sync(at(100));

        assert_eq!(status.source, DataSource::Network);
        assert_eq!(status.sync_age(at(160)), Some(Duration::from_secs(60)));
        assert!(status.summary(at(160)).starts_with("Source: network"));
    }
}
