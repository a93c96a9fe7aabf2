//! Fusion Core Entities: Pure-logic telemetry model and bounded stores
//!
//! # Overview
//!
//! This crate holds everything about the dashboard's data that does not
//! touch the network or the disk:
//!
//! - **Entities**: `Event`, `Asset` and `Alert`, behind the `Entity` trait
//! - **Entity Store**: identity-indexed, size-bounded collections with
//!   newest-first ordering for events and alerts
//! - **Snapshot**: one consistent set of all three collections
//! - **KPIs**: pure derivations for cards and chips
//!
//! # Architecture
//!
//! ```text
//!   full snapshot ──► replace_all ──┐
//!                                   ▼
//!                        ┌─────────────────────┐
//!                        │  EntityStore<E>     │
//!                        │  items: Vec<E>      │◄── upsert ◄── push update
//!                        │  index: id -> pos   │
//!                        └──────────┬──────────┘
//!                                   │ read-only
//!                                   ▼
//!                              Kpis::compute
//! ```
//!
//! # Example
//!
//! ```
//! use fusion_core_entities::{Asset, EntityStore};
//! use serde_json::json;
//!
//! let mut assets: EntityStore<Asset> = EntityStore::new();
//! let update: Asset = serde_json::from_value(json!({"asset_id": "a1", "status": "offline"})).unwrap();
//!
//! assets.upsert(update.clone());
//! assets.upsert(update);
//! assert_eq!(assets.len(), 1);
//! ```

pub mod entity;
pub mod kpi;
pub mod snapshot;
pub mod store;

pub use entity::{
    parse_timestamp, Alert, Asset, AssetStatus, Entity, EntityKind, Event, Priority, Severity,
};
pub use kpi::{freshness_tone, Kpis, Tone};
pub use snapshot::Snapshot;
pub use store::{EntityStore, EntityStores, UpsertOutcome};
