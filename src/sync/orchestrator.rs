//! Sync Orchestrator: cache hydration, snapshot/health scheduling and live
//! event routing behind one start/stop lifecycle.
//!
//! All mutable state lives in a single actor task. Timers, completed
//! fetches/probes and the live channel feed it through one `select!`, so
//! mutations are applied one at a time in arrival order:
//!
//! ```text
//!   snapshot timer ──► spawn fetch ──┐
//!   health timer ────► spawn probe ──┤ completions
//!                                    ▼
//!   live channel ───────────────► SyncActor ──► watch<Arc<SyncView>>
//!                                    │
//!                                    └──► cache writer ──► LocalCacheStore
//! ```
//!
//! Cache writes run on the blocking pool, one at a time and in snapshot
//! order, so file I/O never stalls the actor.

use chrono::Utc;
use fusion_connect::{
    AdminNotice, ChannelEvent, ChannelSignal, ChannelSubscription, ConnectResult, HealthReport,
    HealthSource, LiveChannel, LiveEvent, Payload, SnapshotSource,
};
use fusion_core_entities::{
    Alert, Asset, Entity, EntityStore, EntityStores, Event, Snapshot, UpsertOutcome,
};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{is_fresh, CacheMeta, LocalCacheStore};
use crate::config::FusionConfig;
use crate::error::{FusionError, Result};
use crate::status::{DataSource, SystemStatus, DEFAULT_ERROR_CAPACITY};
use crate::sync::view::SyncView;

/// Longest raw payload echoed into a log line
const MAX_LOGGED_PAYLOAD: usize = 120;

/// Timing and retention knobs
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub snapshot_interval: Duration,
    pub health_interval: Duration,
    pub cache_ttl: Duration,
    pub error_capacity: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            snapshot_interval: Duration::from_secs(120),
            health_interval: Duration::from_secs(3),
            cache_ttl: Duration::from_millis(90_000),
            error_capacity: DEFAULT_ERROR_CAPACITY,
        }
    }
}

impl From<&FusionConfig> for SyncSettings {
    fn from(config: &FusionConfig) -> Self {
        Self {
            snapshot_interval: config.sync.snapshot_interval(),
            health_interval: config.sync.health_interval(),
            cache_ttl: config.cache.ttl(),
            error_capacity: config.sync.error_log_capacity,
        }
    }
}

/// Collaborators, passed in explicitly so independent instances can coexist
#[derive(Clone)]
pub struct SyncDeps {
    pub snapshots: Arc<dyn SnapshotSource>,
    pub health: Arc<dyn HealthSource>,
    pub channel: Arc<dyn LiveChannel>,
    pub cache: Arc<LocalCacheStore>,
}

/// Handle to a running orchestrator
///
/// `stop()` is idempotent. Dropping the handle stops the orchestrator too.
///
/// # Example
///
/// ```rust,no_run
/// use fusion::config::FusionConfig;
/// use fusion::sync::{build_deps, SyncOrchestrator, SyncSettings};
///
/// # async fn example() -> fusion::Result<()> {
/// let config = FusionConfig::default();
/// let orchestrator = SyncOrchestrator::start(SyncSettings::from(&config), build_deps(&config)?);
///
/// let mut views = orchestrator.subscribe();
/// views.changed().await.ok();
/// println!("{}", views.borrow().status.summary(chrono::Utc::now()));
///
/// orchestrator.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SyncOrchestrator {
    alive: Arc<AtomicBool>,
    cancel: CancellationToken,
    views: watch::Receiver<Arc<SyncView>>,
    handle: Option<JoinHandle<()>>,
}

impl SyncOrchestrator {
    /// Read the cache, open the live channel and start both timers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(settings: SyncSettings, deps: SyncDeps) -> Self {
        let alive = Arc::new(AtomicBool::new(true));
        let cancel = CancellationToken::new();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (cache_tx, cache_rx) = mpsc::unbounded_channel();

        let mut stores = EntityStores::new();
        let mut status = SystemStatus::with_error_capacity(settings.error_capacity);

        let cached = deps.cache.load();
        let fresh = is_fresh(cached.as_ref().map(|c| &c.meta), settings.cache_ttl);
        if let (true, Some(cached)) = (fresh, cached) {
            info!(
                "💾 Hydrated from cache saved at {} ({})",
                cached.meta.saved_at.as_deref().unwrap_or("?"),
                cached.snapshot.summary()
            );
            stores.replace_all(cached.snapshot);
            status.source = DataSource::Cache;
        } else {
            info!("🌐 Cache missing or stale, fetching snapshot now");
            status.source = DataSource::Network;
        }

        let (views_tx, views) = watch::channel(Arc::new(SyncView::default()));
        let collections = Collections::of(&stores);
        let mut actor = SyncActor {
            settings,
            snapshots: deps.snapshots,
            health: deps.health,
            stores,
            collections,
            status,
            revision: 0,
            views: views_tx,
            alive: alive.clone(),
            cancel: cancel.clone(),
            completions: completions_tx.clone(),
            cache_writes: Some(cache_tx),
        };
        actor.publish();

        let writer = tokio::spawn(write_cache(deps.cache, cache_rx, completions_tx));
        let subscription = deps.channel.open();
        let handle = tokio::spawn(actor.run(subscription, completions_rx, writer, !fresh));

        Self {
            alive,
            cancel,
            views,
            handle: Some(handle),
        }
    }

    /// Receiver that sees every published view
    pub fn subscribe(&self) -> watch::Receiver<Arc<SyncView>> {
        self.views.clone()
    }

    /// Latest published view
    pub fn view(&self) -> Arc<SyncView> {
        self.views.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Make the orchestrator inert. Returns `true` only for the call that
    /// actually stopped it.
    pub fn stop(&self) -> bool {
        if !self.alive.swap(false, Ordering::AcqRel) {
            return false;
        }
        info!("🛑 Sync orchestrator stopping");
        self.cancel.cancel();
        true
    }

    /// Stop and wait for the actor to wind down
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Sync actor ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SyncOrchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Results handed back from spawned work
enum Completion {
    Snapshot(ConnectResult<Snapshot>),
    Health(ConnectResult<HealthReport>),
    CacheWrite(Result<CacheMeta>),
}

/// Published copies of the store contents, rebuilt only when a store changes
struct Collections {
    events: Arc<[Event]>,
    assets: Arc<[Asset]>,
    alerts: Arc<[Alert]>,
}

impl Collections {
    fn of(stores: &EntityStores) -> Self {
        Self {
            events: stores.events.items().into(),
            assets: stores.assets.items().into(),
            alerts: stores.alerts.items().into(),
        }
    }
}

struct SyncActor {
    settings: SyncSettings,
    snapshots: Arc<dyn SnapshotSource>,
    health: Arc<dyn HealthSource>,
    stores: EntityStores,
    collections: Collections,
    status: SystemStatus,
    revision: u64,
    views: watch::Sender<Arc<SyncView>>,
    alive: Arc<AtomicBool>,
    cancel: CancellationToken,
    completions: mpsc::UnboundedSender<Completion>,
    /// Dropped on exit so the writer drains and stops
    cache_writes: Option<mpsc::UnboundedSender<Snapshot>>,
}

impl SyncActor {
    async fn run(
        mut self,
        mut subscription: ChannelSubscription,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        writer: JoinHandle<()>,
        fetch_now: bool,
    ) {
        info!(
            "🔄 Sync orchestrator running | snapshot every {}s | health every {}s",
            self.settings.snapshot_interval.as_secs(),
            self.settings.health_interval.as_secs()
        );

        if fetch_now {
            self.spawn_snapshot();
        }

        let period = self.settings.snapshot_interval;
        let mut snapshot_timer = interval_at(Instant::now() + period, period);
        snapshot_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // first tick fires immediately
        let mut health_timer = interval(self.settings.health_interval);
        health_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut channel_open = true;

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                Some(completion) = completions.recv() => {
                    if !self.is_alive() {
                        break;
                    }
                    match completion {
                        Completion::Snapshot(result) => self.apply_snapshot(result),
                        Completion::Health(result) => self.apply_health(result),
                        Completion::CacheWrite(result) => self.apply_cache_write(result),
                    }
                }

                signal = subscription.next(), if channel_open => match signal {
                    Some(signal) if self.is_alive() => self.apply_signal(signal),
                    Some(_) => break,
                    None => {
                        warn!("Live channel feed ended");
                        channel_open = false;
                    }
                },

                _ = snapshot_timer.tick() => self.spawn_snapshot(),

                _ = health_timer.tick() => self.spawn_probe(),
            }
        }

        subscription.close();

        // let a pending cache write finish before reporting the actor as done
        self.cache_writes.take();
        if let Err(e) = writer.await {
            warn!("Cache writer ended abnormally: {}", e);
        }
        debug!("Sync actor exited");
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    fn spawn_snapshot(&self) {
        debug!("Snapshot fetch started");
        let source = self.snapshots.clone();
        let completions = self.completions.clone();
        let alive = self.alive.clone();
        tokio::spawn(async move {
            let result = source.fetch_all().await;
            if alive.load(Ordering::Acquire) {
                let _ = completions.send(Completion::Snapshot(result));
            }
        });
    }

    fn spawn_probe(&self) {
        let source = self.health.clone();
        let completions = self.completions.clone();
        let alive = self.alive.clone();
        tokio::spawn(async move {
            let result = source.probe().await;
            if alive.load(Ordering::Acquire) {
                let _ = completions.send(Completion::Health(result));
            }
        });
    }

    fn apply_snapshot(&mut self, result: ConnectResult<Snapshot>) {
        let now = Utc::now();
        match result {
            Ok(snapshot) => {
                info!("📥 Snapshot applied: {}", snapshot.summary());
                self.stores.replace_all(snapshot);
                self.collections = Collections::of(&self.stores);
                self.status.record_full_sync(now);

                if let Some(ref writes) = self.cache_writes {
                    let _ = writes.send(self.stores.to_snapshot());
                }
            }
            Err(e) => {
                warn!("Snapshot fetch failed, keeping current data: {}", e);
                self.status.record_error("snapshot", e.to_string(), now);
            }
        }
        self.publish();
    }

    fn apply_health(&mut self, result: ConnectResult<HealthReport>) {
        let now = Utc::now();
        match result {
            Ok(report) => {
                debug!("Health probe: {}", report.classify());
                self.status.record_health(report, now);
            }
            Err(e) => {
                warn!("Health probe failed: {}", e);
                self.status.record_health_failure(e.to_string(), now);
            }
        }
        self.publish();
    }

    fn apply_cache_write(&mut self, result: Result<CacheMeta>) {
        match result {
            Ok(meta) => debug!(
                "Cache written at {}",
                meta.saved_at.as_deref().unwrap_or("?")
            ),
            Err(e) => {
                warn!("Cache write failed: {}", e);
                self.status.record_error("cache", e.to_string(), Utc::now());
                self.publish();
            }
        }
    }

    fn apply_signal(&mut self, signal: ChannelSignal) {
        let previous = self.status.channel.state;
        self.status.channel.state = previous.on_signal(&signal);
        if previous != self.status.channel.state {
            info!(
                "📡 Live channel {} -> {}",
                previous, self.status.channel.state
            );
        }

        match signal {
            ChannelSignal::Event(event) => {
                self.status.channel.last_event_time = Some(Utc::now());
                self.route(event);
            }
            ChannelSignal::Error(message) => debug!("Live channel error: {}", message),
            ChannelSignal::Connecting | ChannelSignal::Opened => {}
        }
        self.publish();
    }

    fn route(&mut self, event: ChannelEvent) {
        match event.route() {
            LiveEvent::Hello(_) | LiveEvent::Heartbeat => {}
            LiveEvent::EventCreated(payload) => {
                if upsert_payload(&mut self.stores.events, &payload) {
                    self.collections.events = self.stores.events.items().into();
                }
            }
            LiveEvent::AssetUpdated(payload) => {
                if upsert_payload(&mut self.stores.assets, &payload) {
                    self.collections.assets = self.stores.assets.items().into();
                }
            }
            LiveEvent::AlertRaised(payload) => {
                if upsert_payload(&mut self.stores.alerts, &payload) {
                    self.collections.alerts = self.stores.alerts.items().into();
                }
            }
            LiveEvent::AdminNotice(payload) => self.apply_admin_notice(&payload),
            LiveEvent::Other { name, .. } => debug!("Ignoring live event '{}'", name),
        }
    }

    fn apply_admin_notice(&mut self, payload: &Payload) {
        let Some(notice) = payload.as_json().and_then(AdminNotice::from_value) else {
            warn!("Unreadable admin notice: {}", describe_payload(payload));
            return;
        };

        info!("🎛️  Admin: {}", notice.summary());
        // server data was wiped; don't wait for the next scheduled snapshot
        if notice.kind == "simulation_reset" {
            self.spawn_snapshot();
        }
        self.status.last_admin_notice = Some(notice);
    }

    fn publish(&mut self) {
        self.revision += 1;
        let view = SyncView {
            revision: self.revision,
            events: self.collections.events.clone(),
            assets: self.collections.assets.clone(),
            alerts: self.collections.alerts.clone(),
            status: self.status.clone(),
        };
        self.views.send_replace(Arc::new(view));
    }
}

/// Decode one entity from a live payload and merge it; `true` if the store changed
fn upsert_payload<E: Entity>(store: &mut EntityStore<E>, payload: &Payload) -> bool {
    let entity = match payload {
        Payload::Json(value) => match E::deserialize(value) {
            Ok(entity) => entity,
            Err(e) => {
                warn!("Malformed {} payload ignored: {}", E::KIND, e);
                return false;
            }
        },
        Payload::Raw(_) => {
            warn!(
                "Non-JSON {} payload ignored: {}",
                E::KIND,
                describe_payload(payload)
            );
            return false;
        }
    };

    match store.upsert(entity) {
        UpsertOutcome::Ignored => {
            debug!("{} payload without identity ignored", E::KIND);
            false
        }
        outcome => {
            if outcome.evicted() > 0 {
                debug!("{}: evicted {} beyond bound", E::KIND, outcome.evicted());
            }
            true
        }
    }
}

/// Persist snapshots in arrival order on the blocking pool
async fn write_cache(
    cache: Arc<LocalCacheStore>,
    mut snapshots: mpsc::UnboundedReceiver<Snapshot>,
    completions: mpsc::UnboundedSender<Completion>,
) {
    while let Some(snapshot) = snapshots.recv().await {
        let cache = cache.clone();
        let result = tokio::task::spawn_blocking(move || cache.save(&snapshot))
            .await
            .unwrap_or_else(|e| Err(FusionError::Cache(e.to_string())));
        let _ = completions.send(Completion::CacheWrite(result));
    }
}

fn describe_payload(payload: &Payload) -> String {
    let text = match payload {
        Payload::Json(value) => value.to_string(),
        Payload::Raw(raw) => raw.clone(),
    };
    if text.chars().count() > MAX_LOGGED_PAYLOAD {
        let cut: String = text.chars().take(MAX_LOGGED_PAYLOAD).collect();
        format!("{}…", cut)
    } else {
        text
    }
}
