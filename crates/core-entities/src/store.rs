//! Entity Store: bounded, identity-indexed collections
//!
//! Each store keeps two views of the same data:
//! - an ordered sequence (rendering order)
//! - an identity index for O(1) lookup
//!
//! Both views always hold the same identity set. Incremental mutations
//! (`upsert`) re-sort ordered kinds newest-first and then evict from the
//! tail until the collection fits its size bound. Full replacements
//! (`replace_all`) trust the snapshot source for ordering and size.
//!
//! # Example
//!
//! ```
//! use fusion_core_entities::{Event, EntityStore, UpsertOutcome};
//!
//! let mut events: EntityStore<Event> = EntityStore::new();
//! let event = Event { event_id: "e1".to_string(), ..Default::default() };
//!
//! assert!(matches!(events.upsert(event.clone()), UpsertOutcome::Inserted { .. }));
//! assert!(matches!(events.upsert(event), UpsertOutcome::Replaced { .. }));
//! assert_eq!(events.len(), 1);
//! ```

use crate::entity::{Alert, Asset, Entity, Event};
use crate::snapshot::Snapshot;
use std::collections::{HashMap, HashSet};

/// Result of a single upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The entity had no identity and was dropped
    Ignored,
    /// A new identity was added
    Inserted { evicted: usize },
    /// An existing identity was fully replaced
    Replaced { evicted: usize },
}

impl UpsertOutcome {
    /// Number of entries evicted to honour the size bound
    pub fn evicted(&self) -> usize {
        match self {
            UpsertOutcome::Ignored => 0,
            UpsertOutcome::Inserted { evicted } | UpsertOutcome::Replaced { evicted } => *evicted,
        }
    }
}

/// A normalized mutable collection of one entity type
#[derive(Debug, Clone)]
pub struct EntityStore<E: Entity> {
    /// Rendering order
    items: Vec<E>,
    /// Identity -> position in `items`
    index: HashMap<String, usize>,
    max_size: usize,
}

impl<E: Entity> EntityStore<E> {
    /// Create an empty store bounded by the kind's default size
    pub fn new() -> Self {
        Self::with_max_size(E::KIND.max_size)
    }

    /// Create an empty store with a custom size bound
    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
            max_size,
        }
    }

    /// Discard the current collection and rebuild it from `list`.
    ///
    /// No ordering or capping is applied. Entities without identity are
    /// skipped and a repeated identity keeps its first occurrence.
    /// Returns the number of retained entities.
    pub fn replace_all<I>(&mut self, list: I) -> usize
    where
        I: IntoIterator<Item = E>,
    {
        let mut seen = HashSet::new();
        self.items = list
            .into_iter()
            .filter(|entity| match entity.id() {
                Some(id) => seen.insert(id.to_string()),
                None => false,
            })
            .collect();
        self.reindex();
        self.items.len()
    }

    /// Insert or fully replace `entity` by identity.
    ///
    /// New identities are prepended. Ordered kinds are then re-sorted
    /// newest-first, and the sequence is truncated to the size bound.
    pub fn upsert(&mut self, entity: E) -> UpsertOutcome {
        let Some(id) = entity.id().map(str::to_string) else {
            return UpsertOutcome::Ignored;
        };

        let replaced = match self.index.get(&id) {
            Some(&pos) => {
                self.items[pos] = entity;
                true
            }
            None => {
                self.items.insert(0, entity);
                false
            }
        };

        if E::KIND.ordered {
            sort_newest_first(&mut self.items);
        }

        let evicted = self.items.len().saturating_sub(self.max_size);
        self.items.truncate(self.max_size);
        self.reindex();

        if replaced {
            UpsertOutcome::Replaced { evicted }
        } else {
            UpsertOutcome::Inserted { evicted }
        }
    }

    /// Look up an entity by identity
    pub fn get(&self, id: &str) -> Option<&E> {
        self.index.get(id).map(|&pos| &self.items[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Entities in rendering order
    pub fn items(&self) -> &[E] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.items.iter()
    }

    /// Identities in rendering order
    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().filter_map(Entity::id).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    /// Verify that the index and the sequence describe the same identity set
    /// and that every index entry points at the right position.
    pub fn is_consistent(&self) -> bool {
        self.index.len() == self.items.len()
            && self.items.iter().enumerate().all(|(pos, item)| {
                item.id()
                    .is_some_and(|id| self.index.get(id).copied() == Some(pos))
            })
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (pos, item) in self.items.iter().enumerate() {
            if let Some(id) = item.id() {
                self.index.insert(id.to_string(), pos);
            }
        }
    }
}

impl<E: Entity> Default for EntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable sort, newest first; entities without a timestamp go last
fn sort_newest_first<E: Entity>(items: &mut [E]) {
    items.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
}

/// The three collections managed together by the orchestrator
#[derive(Debug, Clone, Default)]
pub struct EntityStores {
    pub events: EntityStore<Event>,
    pub assets: EntityStore<Asset>,
    pub alerts: EntityStore<Alert>,
}

impl EntityStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all three collections from one snapshot
    pub fn replace_all(&mut self, snapshot: Snapshot) {
        self.events.replace_all(snapshot.events);
        self.assets.replace_all(snapshot.assets);
        self.alerts.replace_all(snapshot.alerts);
    }

    /// Copy the current contents into a snapshot (for persistence)
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            events: self.events.items().to_vec(),
            assets: self.assets.items().to_vec(),
            alerts: self.alerts.items().to_vec(),
        }
    }

    pub fn total(&self) -> usize {
        self.events.len() + self.assets.len() + self.alerts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn event(id: &str, minute: i64) -> Event {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Event {
            event_id: id.to_string(),
            created_at: Some(base + Duration::minutes(minute)),
            ..Default::default()
        }
    }

    fn asset(id: &str) -> Asset {
        Asset {
            asset_id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_without_identity_is_noop() {
        let mut store: EntityStore<Event> = EntityStore::new();
        let outcome = store.upsert(Event::default());

        assert_eq!(outcome, UpsertOutcome::Ignored);
        assert!(store.is_empty());
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let mut once: EntityStore<Event> = EntityStore::new();
        let mut twice: EntityStore<Event> = EntityStore::new();
        for store in [&mut once, &mut twice] {
            store.upsert(event("a", 1));
            store.upsert(event("b", 1));
            store.upsert(event("c", 3));
        }

        once.upsert(event("b", 2));
        twice.upsert(event("b", 2));
        twice.upsert(event("b", 2));

        assert_eq!(once.items(), twice.items());
        assert!(twice.is_consistent());
    }

    #[test]
    fn test_replace_is_last_write_wins() {
        let mut store: EntityStore<Asset> = EntityStore::new();
        let mut first = asset("a1");
        first.name = "relay".to_string();
        first.speed_kmh = Some(40.0);
        store.upsert(first);

        let mut second = asset("a1");
        second.status = crate::AssetStatus::Offline;
        let outcome = store.upsert(second.clone());

        assert_eq!(outcome, UpsertOutcome::Replaced { evicted: 0 });
        // no merge: fields missing from the second record are gone
        assert_eq!(store.get("a1"), Some(&second));
        assert_eq!(store.get("a1").unwrap().speed_kmh, None);
    }

    #[test]
    fn test_events_sorted_newest_first() {
        let mut store: EntityStore<Event> = EntityStore::new();
        store.upsert(event("old", 1));
        store.upsert(event("new", 10));
        store.upsert(event("mid", 5));

        assert_eq!(store.ids(), vec!["new", "mid", "old"]);

        // moving an entity in time re-sorts it
        store.upsert(event("old", 20));
        assert_eq!(store.ids(), vec!["old", "new", "mid"]);
    }

    #[test]
    fn test_untimestamped_events_sort_last() {
        let mut store: EntityStore<Event> = EntityStore::new();
        store.upsert(Event {
            event_id: "bare".to_string(),
            ..Default::default()
        });
        store.upsert(event("dated", 1));

        assert_eq!(store.ids(), vec!["dated", "bare"]);
    }

    #[test]
    fn test_assets_keep_arrival_order() {
        let mut store: EntityStore<Asset> = EntityStore::new();
        store.upsert(asset("a1"));
        store.upsert(asset("a2"));
        store.upsert(asset("a3"));
        assert_eq!(store.ids(), vec!["a3", "a2", "a1"]);

        // replace keeps position
        store.upsert(asset("a2"));
        assert_eq!(store.ids(), vec!["a3", "a2", "a1"]);
    }

    #[test]
    fn test_bound_evicts_oldest_arrivals() {
        let mut store: EntityStore<Asset> = EntityStore::with_max_size(3);
        for id in ["a1", "a2", "a3"] {
            store.upsert(asset(id));
        }

        let outcome = store.upsert(asset("a4"));
        assert_eq!(outcome, UpsertOutcome::Inserted { evicted: 1 });
        assert_eq!(store.ids(), vec!["a4", "a3", "a2"]);
        assert!(!store.contains("a1"));
        assert!(store.is_consistent());
    }

    #[test]
    fn test_301_increasing_event_upserts_keep_newest_300() {
        let mut store: EntityStore<Event> = EntityStore::new();
        for i in 0..301 {
            store.upsert(event(&format!("e{i}"), i));
            assert!(store.len() <= 300);
        }

        assert_eq!(store.len(), 300);
        assert!(!store.contains("e0"));
        assert!(store.contains("e1"));
        assert_eq!(store.items()[0].event_id, "e300");
        assert_eq!(store.items()[299].event_id, "e1");
        assert!(store.is_consistent());
    }

    #[test]
    fn test_replace_all_skips_missing_and_duplicate_ids() {
        let mut store: EntityStore<Event> = EntityStore::new();
        store.upsert(event("stale", 1));

        let mut dup = event("e1", 9);
        dup.event_type = "second".to_string();
        let retained = store.replace_all(vec![event("e1", 5), Event::default(), dup, event("e2", 6)]);

        assert_eq!(retained, 2);
        assert_eq!(store.ids(), vec!["e1", "e2"]);
        assert_eq!(store.get("e1").unwrap().event_type, "");
        assert!(!store.contains("stale"));
        assert!(store.is_consistent());
    }

    #[test]
    fn test_replace_all_does_not_sort_or_cap() {
        let mut store: EntityStore<Event> = EntityStore::with_max_size(2);
        store.replace_all(vec![event("a", 1), event("b", 2), event("c", 3)]);

        assert_eq!(store.ids(), vec!["a", "b", "c"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_stores_snapshot_round_trip() {
        let mut stores = EntityStores::new();
        stores.replace_all(Snapshot {
            events: vec![event("e1", 1)],
            assets: vec![asset("a1"), asset("a2")],
            alerts: vec![],
        });

        assert_eq!(stores.total(), 3);
        let snapshot = stores.to_snapshot();
        assert_eq!(snapshot.events.len(), 1);
        assert_eq!(snapshot.assets.len(), 2);
    }
}
