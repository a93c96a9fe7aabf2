//! Snapshot Fetcher: one-shot authoritative retrieval of all collections
//!
//! Three bounded queries run concurrently and are joined as a unit: if any
//! one of them fails, the whole fetch fails and no partial snapshot ever
//! reaches the caller.

use crate::client::ApiClient;
use crate::error::ConnectResult;
use async_trait::async_trait;
use fusion_core_entities::{Alert, Asset, Entity, Event, Snapshot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Source of full snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch events, assets and alerts together
    async fn fetch_all(&self) -> ConnectResult<Snapshot>;
}

/// Per-collection result caps sent as `?limit=N`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLimits {
    pub events: usize,
    pub assets: usize,
    pub alerts: usize,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            events: 120,
            assets: 200,
            alerts: 120,
        }
    }
}

/// HTTP implementation of `SnapshotSource`
#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    client: ApiClient,
    limits: QueryLimits,
}

impl SnapshotFetcher {
    pub fn new(client: ApiClient, limits: QueryLimits) -> Self {
        Self { client, limits }
    }

    pub fn limits(&self) -> QueryLimits {
        self.limits
    }

    /// Fetch one collection from `api/<kind>?limit=N`
    pub async fn fetch_collection<E: Entity>(&self, limit: usize) -> ConnectResult<Vec<E>> {
        let path = format!("api/{}", E::KIND.name);
        let envelope: Value = self
            .client
            .get_json(&path, &[("limit", limit.to_string())])
            .await?;

        let items = decode_items::<E>(&envelope);
        debug!("Fetched {} {}", items.len(), E::KIND);
        Ok(items)
    }
}

#[async_trait]
impl SnapshotSource for SnapshotFetcher {
    async fn fetch_all(&self) -> ConnectResult<Snapshot> {
        let (events, assets, alerts) = tokio::try_join!(
            self.fetch_collection::<Event>(self.limits.events),
            self.fetch_collection::<Asset>(self.limits.assets),
            self.fetch_collection::<Alert>(self.limits.alerts),
        )?;

        Ok(Snapshot::new(events, assets, alerts))
    }
}

/// Decode the `items` array of a `{ items: [...] }` envelope.
///
/// A missing or non-array `items` yields an empty list; malformed entries
/// are skipped.
pub fn decode_items<E: Entity>(envelope: &Value) -> Vec<E> {
    let Some(items) = envelope.get("items").and_then(Value::as_array) else {
        warn!("Response for {} has no items array, treating as empty", E::KIND);
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|raw| match E::deserialize(raw) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!("Skipping malformed {} item: {}", E::KIND, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_items_skips_malformed_entries() {
        let envelope = json!({
            "items": [
                {"event_id": "e1", "severity": "low"},
                "not an object",
                {"event_id": "e2", "lat": "north"}
            ]
        });

        let events = decode_items::<Event>(&envelope);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_id, "e1");
    }

    #[test]
    fn test_decode_items_without_array() {
        assert!(decode_items::<Asset>(&json!({})).is_empty());
        assert!(decode_items::<Asset>(&json!({"items": null})).is_empty());
        assert!(decode_items::<Asset>(&json!([1, 2])).is_empty());
    }

    #[test]
    fn test_default_limits() {
        let limits = QueryLimits::default();
        assert_eq!((limits.events, limits.assets, limits.alerts), (120, 200, 120));
    }
}
