//! Read-only projection published by the orchestrator

use chrono::{DateTime, Utc};
use fusion_core_entities::{freshness_tone, Alert, Asset, Event, Kpis, Snapshot, Tone};
use std::sync::Arc;
use std::time::Duration;

use crate::status::{Liveness, SystemStatus};

/// Immutable copy of everything the dashboard renders
///
/// A new view is published after every applied mutation; `revision`
/// increases by one each time. Collections are shared between consecutive
/// views until the underlying store changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncView {
    pub revision: u64,
    pub events: Arc<[Event]>,
    pub assets: Arc<[Asset]>,
    pub alerts: Arc<[Alert]>,
    pub status: SystemStatus,
}

impl SyncView {
    pub fn event(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.event_id == id)
    }

    pub fn asset(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.asset_id == id)
    }

    pub fn alert(&self, id: &str) -> Option<&Alert> {
        self.alerts.iter().find(|a| a.alert_id == id)
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.events.to_vec(),
            self.assets.to_vec(),
            self.alerts.to_vec(),
        )
    }

    /// KPI cards; `window` bounds the "recent events" count
    pub fn kpis(&self, now: DateTime<Utc>, window: chrono::Duration) -> Kpis {
        Kpis::compute(&self.events[..], &self.assets[..], &self.alerts[..], now, window)
    }

    pub fn liveness(&self, now: DateTime<Utc>, silence_threshold: Duration) -> Liveness {
        self.status.channel_liveness(now, silence_threshold)
    }

    /// Chip tone for the "last live event" indicator
    pub fn channel_tone(&self, now: DateTime<Utc>, silence_threshold: Duration) -> Tone {
        let age = self
            .status
            .channel
            .last_event_time
            .map(|last| now.signed_duration_since(last));
        let stale_after =
            chrono::Duration::from_std(silence_threshold).unwrap_or(chrono::Duration::MAX);
        freshness_tone(age, stale_after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_channel_tone_follows_silence() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();
        let threshold = Duration::from_secs(30);
        let mut view = SyncView::default();
        assert_eq!(view.channel_tone(now, threshold), Tone::Neutral);

        view.status.channel.last_event_time = Some(now - chrono::Duration::seconds(5));
        assert_eq!(view.channel_tone(now, threshold), Tone::Good);

        view.status.channel.last_event_time = Some(now - chrono::Duration::seconds(20));
        assert_eq!(view.channel_tone(now, threshold), Tone::Warning);

        view.status.channel.last_event_time = Some(now - chrono::Duration::seconds(45));
        assert_eq!(view.channel_tone(now, threshold), Tone::Critical);
        assert_eq!(view.liveness(now, threshold), Liveness::Stale);
    }

    #[test]
    fn test_lookup_by_id() {
        let asset: Asset =
            serde_json::from_value(serde_json::json!({"asset_id": "a1", "name": "Relay"})).unwrap();
        let view = SyncView {
            assets: vec![asset].into(),
            ..Default::default()
        };

        assert_eq!(view.asset("a1").map(|a| a.name.as_str()), Some("Relay"));
        assert!(view.asset("a2").is_none());
        assert!(view.event("a1").is_none());
    }
}
