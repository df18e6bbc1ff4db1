//! The assembled core.

use crate::advisory::OfflineAdvisory;
use crate::error::{CoreError, Result};
use bridge_traits::{
    CommandStatus, LifecycleObserver, LifecycleState, RemoteCommand, SettingsStore,
};
use core_library::{Catalog, StreakCounter, StreakRecord, Track};
use core_playback::{
    AssetCache, BackgroundGuard, CacheConfig, EngineConfig, NowPlayingIntegration,
    PlaybackEngine, PrefetchReport, Prefetcher,
};
use core_runtime::config::CoreConfig;
use core_runtime::connectivity::ConnectivityObserver;
use core_runtime::events::{CoreEvent, EventBus, Receiver, StreakEvent};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Every core service, built from one [`CoreConfig`].
///
/// `new` only constructs; [`start`](Self::start) launches the observers and
/// restores the last played track. Call [`shutdown`](Self::shutdown) before
/// dropping to persist the position and release host resources.
pub struct CoreService {
    event_bus: EventBus,
    catalog: Arc<Catalog>,
    settings: Arc<dyn SettingsStore>,
    connectivity: Arc<ConnectivityObserver>,
    advisory: Arc<OfflineAdvisory>,
    cache: Arc<AssetCache>,
    prefetcher: Arc<Prefetcher>,
    engine: Arc<PlaybackEngine>,
    now_playing: Option<Arc<NowPlayingIntegration>>,
    guard: Arc<BackgroundGuard>,
    streak: StreakCounter,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    prefetch_on_reconnect: bool,
    reconnect_prefetch: Arc<Mutex<Option<JoinHandle<PrefetchReport>>>>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CoreService {
    /// Build the core around the built-in catalog.
    pub async fn new(config: CoreConfig) -> Result<Self> {
        Self::with_catalog(config, Catalog::builtin()).await
    }

    #[instrument(skip_all, fields(tracks = catalog.track_count()))]
    pub async fn with_catalog(config: CoreConfig, catalog: Catalog) -> Result<Self> {
        config.validate()?;

        let cache_config = CacheConfig::new()
            .with_cache_directory(config.cache_directory_name.clone())
            .with_download_timeout(config.download_timeout)
            .with_max_concurrent_downloads(config.max_concurrent_downloads);
        cache_config
            .validate()
            .map_err(CoreError::InitializationFailed)?;

        let settings = config.settings_store().await?;
        let event_bus = EventBus::default();
        let catalog = Arc::new(catalog);

        let connectivity = Arc::new(ConnectivityObserver::new(
            config.network_monitor.clone(),
            event_bus.clone(),
        ));
        let advisory = Arc::new(OfflineAdvisory::new(
            config.offline_advisory_duration,
            event_bus.clone(),
        ));

        let cache = Arc::new(AssetCache::new(
            cache_config,
            Arc::clone(&config.file_system),
            Arc::clone(&config.http_client),
            Arc::clone(&config.resource_bundle),
            event_bus.clone(),
        ));
        let prefetcher = Arc::new(Prefetcher::new(Arc::clone(&cache), event_bus.clone()));

        let engine = PlaybackEngine::new(
            Arc::clone(&config.playback_adapter),
            Arc::clone(&cache),
            Arc::clone(&settings),
            Arc::clone(&catalog),
            event_bus.clone(),
            EngineConfig {
                position_tick: config.position_tick,
                cache_on_play: config.cache_on_play,
            },
        );

        let now_playing = config
            .media_controls
            .clone()
            .map(|controls| NowPlayingIntegration::new(Arc::clone(&engine), controls));
        let guard = BackgroundGuard::new(
            config.idle_timer.clone(),
            config.background_task_host.clone(),
        );
        let streak = StreakCounter::load(Arc::clone(&settings), Arc::clone(&config.clock)).await;

        info!(
            cache = %core_runtime::logging::strip_path(&config.cache_directory().to_string_lossy()),
            "Core services built"
        );

        Ok(Self {
            event_bus,
            catalog,
            settings,
            connectivity,
            advisory,
            cache,
            prefetcher,
            engine,
            now_playing,
            guard,
            streak,
            lifecycle_observer: config.lifecycle_observer.clone(),
            prefetch_on_reconnect: config.prefetch_on_reconnect,
            reconnect_prefetch: Arc::new(Mutex::new(None)),
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Start observers and restore the last played track, paused.
    pub async fn start(&self) {
        self.connectivity.start().await;
        self.advisory.start(self.connectivity.subscribe()).await;
        self.watch_reconnects().await;
        self.watch_lifecycle().await;

        self.guard.watch_playback(self.engine.subscribe()).await;
        self.guard.watch_revocations().await;
        if let Some(now_playing) = &self.now_playing {
            now_playing.start().await;
        }

        self.engine.restore_last_played().await;
        info!("Core started");
    }

    /// Persist the position, stop every observer and release host resources.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;

        self.cancel.cancel();
        for task in self.tasks.lock().await.drain(..) {
            let _ = task.await;
        }
        if let Some(prefetch) = self.reconnect_prefetch.lock().await.take() {
            prefetch.abort();
        }

        if let Some(now_playing) = &self.now_playing {
            now_playing.shutdown().await;
        }
        self.guard.shutdown().await;
        self.advisory.shutdown().await;
        self.connectivity.shutdown().await;
        info!("Core stopped");
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn engine(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    pub fn connectivity(&self) -> &ConnectivityObserver {
        &self.connectivity
    }

    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    /// Offline advisory text while it should be shown.
    pub fn offline_advisory(&self) -> watch::Receiver<Option<String>> {
        self.advisory.subscribe()
    }

    // ========================================================================
    // Playback
    // ========================================================================

    pub async fn play(&self, track: &Track) {
        self.engine.play(track).await;
    }

    /// Route a remote transport command. Fails when no media controls were
    /// configured.
    pub async fn handle_remote_command(&self, command: RemoteCommand) -> CommandStatus {
        match &self.now_playing {
            Some(now_playing) => now_playing.handle_command(command).await,
            None => {
                debug!(?command, "Remote command without media controls");
                CommandStatus::CommandFailed
            }
        }
    }

    /// Foreground/background transition: persist the position when leaving
    /// the foreground, then update the extended-execution grant.
    pub async fn handle_lifecycle(&self, state: LifecycleState) {
        route_lifecycle(&self.engine, &self.guard, state).await;
    }

    // ========================================================================
    // Cache
    // ========================================================================

    pub async fn prefetch_all(&self) -> PrefetchReport {
        self.prefetcher.prefetch_all(&self.catalog).await
    }

    pub async fn clear_cache(&self) -> Result<()> {
        self.cache.clear_cache().await?;
        Ok(())
    }

    // ========================================================================
    // Streak
    // ========================================================================

    pub async fn streak(&self) -> StreakRecord {
        self.streak.record().await
    }

    /// Add `delta` days, persist and announce the new value.
    pub async fn update_streak(&self, delta: i64) -> Result<StreakRecord> {
        let record = self.streak.update_streak(delta).await?;
        let _ = self.event_bus.emit(CoreEvent::Streak(StreakEvent::Changed {
            days: record.days,
            last_updated: record
                .last_updated
                .map(|at| at.to_rfc3339())
                .unwrap_or_default(),
        }));
        Ok(record)
    }

    pub async fn increment_streak(&self) -> Result<StreakRecord> {
        self.update_streak(1).await
    }

    pub async fn decrement_streak(&self) -> Result<StreakRecord> {
        self.update_streak(-1).await
    }

    pub async fn formatted_last_updated(&self) -> String {
        self.streak.formatted_last_updated().await
    }

    // ========================================================================
    // Observers
    // ========================================================================

    /// Prefetch the catalog whenever connectivity goes from offline to
    /// online. A run still in flight is not doubled up.
    async fn watch_reconnects(&self) {
        if !self.prefetch_on_reconnect {
            return;
        }

        let mut connectivity = self.connectivity.subscribe();
        let mut was_connected = *connectivity.borrow_and_update();
        let prefetcher = Arc::clone(&self.prefetcher);
        let catalog = Arc::clone(&self.catalog);
        let running = Arc::clone(&self.reconnect_prefetch);
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = connectivity.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                let connected = *connectivity.borrow_and_update();
                if connected && !was_connected {
                    let mut running = running.lock().await;
                    if running.as_ref().is_some_and(|task| !task.is_finished()) {
                        debug!("Prefetch already running; reconnect ignored");
                    } else {
                        info!("Back online; prefetching catalog");
                        *running = Some(prefetcher.spawn_prefetch_all(Arc::clone(&catalog)));
                    }
                }
                was_connected = connected;
            }
        });
        self.tasks.lock().await.push(handle);
    }

    async fn watch_lifecycle(&self) {
        let Some(observer) = self.lifecycle_observer.clone() else {
            debug!("No lifecycle observer");
            return;
        };

        match observer.get_state().await {
            Ok(LifecycleState::Foreground) => {}
            Ok(state) => route_lifecycle(&self.engine, &self.guard, state).await,
            Err(e) => warn!(error = %e, "Initial lifecycle state unavailable"),
        }

        let mut changes = match observer.subscribe_changes().await {
            Ok(changes) => changes,
            Err(e) => {
                warn!(error = %e, "Lifecycle changes unavailable");
                return;
            }
        };

        let engine = Arc::clone(&self.engine);
        let guard = Arc::clone(&self.guard);
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    next = changes.next() => match next {
                        Some(state) => route_lifecycle(&engine, &guard, state).await,
                        None => break,
                    },
                }
            }
        });
        self.tasks.lock().await.push(handle);
    }
}

async fn route_lifecycle(engine: &PlaybackEngine, guard: &BackgroundGuard, state: LifecycleState) {
    debug!(?state, "Lifecycle transition");
    if matches!(state, LifecycleState::Background | LifecycleState::Suspended) {
        engine.persist_position().await;
    }
    guard.on_lifecycle(state).await;
}
