//! Fusion Connect: client-side connectivity for the Fusion dashboard API
//!
//! This crate owns every conversation with the backend. It knows nothing
//! about when to fetch or what to do with the results; scheduling and state
//! live in the sync orchestrator of the `fusion` crate.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!                 │  ApiClient   │  base URL, per-request timeout
//!                 └──────┬───────┘
//!        ┌───────────────┼───────────────┬──────────────┐
//!        ▼               ▼               ▼              ▼
//! SnapshotFetcher   HealthProber     SseChannel     AdminClient
//! (SnapshotSource)  (HealthSource)   (LiveChannel)
//!  GET api/events   GET api/health   GET api/stream  POST api/admin/*
//!  GET api/assets                    text/event-stream
//!  GET api/alerts
//! ```
//!
//! - **SnapshotSource**: all three collections at once, or an error
//! - **HealthSource**: one status report per probe
//! - **LiveChannel**: auto-reconnecting push stream of named events
//!
//! The orchestrator depends on the traits only, so tests can drive it with
//! in-memory fakes.
//!
//! # Example
//!
//! ```rust,no_run
//! use fusion_connect::{ApiClient, QueryLimits, SnapshotFetcher, SnapshotSource};
//! use std::time::Duration;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = ApiClient::new("http://localhost:8000", Duration::from_secs(10))?;
//!     let fetcher = SnapshotFetcher::new(client, QueryLimits::default());
//!
//!     let snapshot = fetcher.fetch_all().await?;
//!     println!("{}", snapshot.summary());
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod channel;
pub mod client;
pub mod error;
pub mod health;
pub mod snapshot;

pub use admin::{
    AdminClient, AdminNotice, AdminState, CooldownTracker, DeletedCounts, Rates, ResetResponse,
    Scenario, ScenarioResponse,
};
pub use channel::{
    ChannelEvent, ChannelSignal, ChannelState, ChannelSubscription, LiveChannel, LiveEvent,
    Payload, SseChannel, DEFAULT_RETRY,
};
pub use client::ApiClient;
pub use error::{ConnectError, ConnectResult};
pub use health::{HealthClass, HealthCounts, HealthProber, HealthReport, HealthSource};
pub use snapshot::{decode_items, QueryLimits, SnapshotFetcher, SnapshotSource};
