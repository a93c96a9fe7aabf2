/*!
 * Fusion - client-side sync engine for the Fusion operations dashboard
 *
 * Keeps three entity collections (events, assets, alerts) fresh and
 * trustworthy while the network misbehaves:
 * - Instant start from a versioned local cache when it is fresh enough
 * - Periodic authoritative snapshots as a consistency backstop
 * - Incremental server-pushed updates over server-sent events
 * - Health polling and a bounded, visible error log
 * - A single idempotent start/stop lifecycle
 *
 * Consumers subscribe to read-only `SyncView` projections; only the
 * orchestrator mutates state.
 */

pub mod cache;
pub mod cli_style;
pub mod config;
pub mod error;
pub mod logging;
pub mod status;
pub mod sync;

// Re-export commonly used types
pub use cache::{is_fresh, CacheBackend, CacheMeta, CacheSnapshot, LocalCacheStore};
pub use config::{FusionConfig, LogLevel};
pub use error::{FusionError, Result};
pub use status::{DataSource, Liveness, SystemStatus};
pub use sync::{build_deps, SyncDeps, SyncOrchestrator, SyncSettings, SyncView};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
