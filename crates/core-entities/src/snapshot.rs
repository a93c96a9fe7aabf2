//! Full authoritative set of all three collections

use crate::entity::{Alert, Asset, Event};
use serde::{Deserialize, Serialize};

/// One consistent set of events, assets and alerts.
///
/// Produced by a full snapshot fetch or read back from the local cache,
/// and always applied as a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub assets: Vec<Asset>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

impl Snapshot {
    pub fn new(events: Vec<Event>, assets: Vec<Asset>, alerts: Vec<Alert>) -> Self {
        Self {
            events,
            assets,
            alerts,
        }
    }

    /// Total number of entities across all collections
    pub fn total(&self) -> usize {
        self.events.len() + self.assets.len() + self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} events, {} assets, {} alerts",
            self.events.len(),
            self.assets.len(),
            self.alerts.len()
        )
    }
}
