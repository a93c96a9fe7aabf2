//! Sync layer: keeps the three entity collections fresh
//!
//! - **orchestrator**: the `SyncOrchestrator` actor and its lifecycle
//! - **view**: the read-only `SyncView` projection consumers subscribe to

pub mod orchestrator;
pub mod view;

pub use orchestrator::{SyncDeps, SyncOrchestrator, SyncSettings};
pub use view::SyncView;

use fusion_connect::{ApiClient, HealthProber, SnapshotFetcher, SseChannel};
use std::sync::Arc;

use crate::cache::LocalCacheStore;
use crate::config::FusionConfig;
use crate::error::Result;

/// HTTP/SSE collaborators and the configured cache for `config`
pub fn build_deps(config: &FusionConfig) -> Result<SyncDeps> {
    let client = ApiClient::new(&config.api.base_url, config.api.request_timeout())?;

    Ok(SyncDeps {
        snapshots: Arc::new(SnapshotFetcher::new(client.clone(), config.api.limits)),
        health: Arc::new(HealthProber::new(client.clone())),
        channel: Arc::new(SseChannel::new(client)),
        cache: Arc::new(LocalCacheStore::from_config(&config.cache)),
    })
}
