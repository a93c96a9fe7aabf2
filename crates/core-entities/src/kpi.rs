//! Derived dashboard indicators
//!
//! Pure functions over read-only entity slices. Nothing here holds state:
//! callers recompute on every projection update.

use crate::entity::{Alert, Asset, AssetStatus, Event, Priority, Severity};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Visual tone for chips and KPI cards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Neutral,
    Good,
    Warning,
    Critical,
}

impl Severity {
    pub fn tone(self) -> Tone {
        match self {
            Severity::Low => Tone::Good,
            Severity::Medium => Tone::Warning,
            Severity::High | Severity::Critical => Tone::Critical,
            Severity::Unknown => Tone::Neutral,
        }
    }
}

impl AssetStatus {
    pub fn tone(self) -> Tone {
        match self {
            AssetStatus::Active => Tone::Good,
            AssetStatus::Degraded => Tone::Warning,
            AssetStatus::Offline => Tone::Critical,
            AssetStatus::Unknown => Tone::Neutral,
        }
    }
}

impl Priority {
    pub fn tone(self) -> Tone {
        match self {
            Priority::P1 => Tone::Critical,
            Priority::P2 => Tone::Warning,
            Priority::P3 => Tone::Good,
            Priority::Unknown => Tone::Neutral,
        }
    }
}

/// Tone of a freshness indicator given the age of the newest observation
pub fn freshness_tone(age: Option<Duration>, stale_after: Duration) -> Tone {
    match age {
        None => Tone::Neutral,
        Some(age) if age < stale_after / 2 => Tone::Good,
        Some(age) if age < stale_after => Tone::Warning,
        Some(_) => Tone::Critical,
    }
}

/// Events per severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityBreakdown {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
    pub unknown: usize,
}

/// Assets per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub active: usize,
    pub degraded: usize,
    pub offline: usize,
    pub unknown: usize,
}

/// Alerts per priority
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityBreakdown {
    pub p1: usize,
    pub p2: usize,
    pub p3: usize,
    pub unknown: usize,
}

/// Headline numbers for the KPI cards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kpis {
    pub events: usize,
    pub events_in_window: usize,
    pub severity: SeverityBreakdown,
    pub assets: usize,
    pub asset_status: StatusBreakdown,
    pub alerts: usize,
    pub open_alerts: usize,
    pub priority: PriorityBreakdown,
}

impl Kpis {
    /// Compute indicators at `now`; `window` bounds the "recent events" count
    pub fn compute(
        events: &[Event],
        assets: &[Asset],
        alerts: &[Alert],
        now: DateTime<Utc>,
        window: Duration,
    ) -> Self {
        let mut kpis = Kpis {
            events: events.len(),
            assets: assets.len(),
            alerts: alerts.len(),
            ..Default::default()
        };

        let cutoff = now - window;
        for event in events {
            match event.severity {
                Severity::Low => kpis.severity.low += 1,
                Severity::Medium => kpis.severity.medium += 1,
                Severity::High => kpis.severity.high += 1,
                Severity::Critical => kpis.severity.critical += 1,
                Severity::Unknown => kpis.severity.unknown += 1,
            }
            if event.created_at.is_some_and(|ts| ts >= cutoff) {
                kpis.events_in_window += 1;
            }
        }

        for asset in assets {
            match asset.status {
                AssetStatus::Active => kpis.asset_status.active += 1,
                AssetStatus::Degraded => kpis.asset_status.degraded += 1,
                AssetStatus::Offline => kpis.asset_status.offline += 1,
                AssetStatus::Unknown => kpis.asset_status.unknown += 1,
            }
        }

        for alert in alerts {
            match alert.priority {
                Priority::P1 => kpis.priority.p1 += 1,
                Priority::P2 => kpis.priority.p2 += 1,
                Priority::P3 => kpis.priority.p3 += 1,
                Priority::Unknown => kpis.priority.unknown += 1,
            }
            if !alert.is_expired(now) {
                kpis.open_alerts += 1;
            }
        }

        kpis
    }

    /// Share of known-status assets that are active (1.0 when there are none)
    pub fn asset_availability(&self) -> f64 {
        let known =
            self.asset_status.active + self.asset_status.degraded + self.asset_status.offline;
        if known == 0 {
            1.0
        } else {
            self.asset_status.active as f64 / known as f64
        }
    }

    /// Overall tone of the alert card
    pub fn alert_tone(&self) -> Tone {
        if self.priority.p1 > 0 {
            Tone::Critical
        } else if self.priority.p2 > 0 {
            Tone::Warning
        } else if self.alerts > 0 {
            Tone::Good
        } else {
            Tone::Neutral
        }
    }

    /// Format a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "events {} ({} recent, {} high/critical) | assets {} ({} offline, {:.0}% available) | alerts {} ({} open, {} p1)",
            self.events,
            self.events_in_window,
            self.severity.high + self.severity.critical,
            self.assets,
            self.asset_status.offline,
            self.asset_availability() * 100.0,
            self.alerts,
            self.open_alerts,
            self.priority.p1
        )
    }
}
