//! # Playback Engine
//!
//! Owns the single active audio session and publishes its state.
//!
//! ## States
//!
//! ```text
//! Idle ──play──> Loading ──ok──> Playing <──toggle──> Paused
//!   ^               │                 │                 ^
//!   │             error               └──end of track───┘
//!   └──── stop ─────┴──────────────────────────────────────
//! ```
//!
//! - Public operations never return errors. Failures are logged, announced as
//!   [`PlaybackEvent::Error`] and leave the engine in a safe state.
//! - Operations other than `play` are no-ops while Idle.
//! - Published state is a [`PlaybackSnapshot`] on a `watch` channel; a
//!   periodic tick refreshes the position while playing.
//! - The last played track identity is written when a new track is loaded;
//!   the elapsed position when playback stops or the app is backgrounded.

use crate::cache::AssetCache;
use crate::error::{PlaybackError, Result};
use crate::speed::PlaybackSpeed;
use bridge_traits::{
    error::BridgeError, PlaybackAdapter, PlaybackSessionId, PlaybackState, PreparedSession,
    SettingsStore,
};
use core_library::{Catalog, Track, TrackIdentity};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

/// Settings key holding the JSON identity of the last loaded track.
pub const LAST_PLAYED_KEY: &str = "lastPlayedMeditation";
/// Settings key holding the last elapsed position in seconds.
pub const LAST_POSITION_KEY: &str = "lastPlayedPosition";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineState {
    Idle,
    Loading,
    Paused,
    Playing,
}

/// Published engine state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub state: EngineState,
    pub track: Option<Track>,
    pub position: Duration,
    pub duration: Duration,
    pub speed: PlaybackSpeed,
    /// Bumped on every explicit seek, so observers can tell a jump from a tick.
    pub seek_generation: u64,
}

impl PlaybackSnapshot {
    fn idle(speed: PlaybackSpeed, seek_generation: u64) -> Self {
        Self {
            state: EngineState::Idle,
            track: None,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            speed,
            seek_generation,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == EngineState::Playing
    }

    /// Position as a fraction of the duration, `0.0` when nothing is loaded.
    pub fn progress(&self) -> f64 {
        if self.duration.is_zero() {
            return 0.0;
        }
        (self.position.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    pub fn elapsed_label(&self) -> String {
        format_elapsed(self.position)
    }
}

/// `mm:ss`, with minutes growing past two digits for long tracks.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval of the position-sampling tick
    pub position_tick: Duration,
    /// Cache a track in the background when it is played from the bundle
    pub cache_on_play: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            position_tick: Duration::from_millis(500),
            cache_on_play: true,
        }
    }
}

struct ActiveSession {
    id: PlaybackSessionId,
    track: Track,
    duration: Duration,
    position: Duration,
    /// Reached the natural end; resuming starts over.
    finished: bool,
}

struct EngineInner {
    state: EngineState,
    session: Option<ActiveSession>,
    speed: PlaybackSpeed,
    seek_generation: u64,
    tick: Option<JoinHandle<()>>,
}

impl EngineInner {
    fn stop_tick(&mut self) {
        if let Some(handle) = self.tick.take() {
            handle.abort();
        }
    }
}

pub struct PlaybackEngine {
    me: Weak<PlaybackEngine>,
    adapter: Arc<dyn PlaybackAdapter>,
    cache: Arc<AssetCache>,
    settings: Arc<dyn SettingsStore>,
    catalog: Arc<Catalog>,
    event_bus: EventBus,
    config: EngineConfig,
    inner: Mutex<EngineInner>,
    snapshot: watch::Sender<PlaybackSnapshot>,
}

impl PlaybackEngine {
    pub fn new(
        adapter: Arc<dyn PlaybackAdapter>,
        cache: Arc<AssetCache>,
        settings: Arc<dyn SettingsStore>,
        catalog: Arc<Catalog>,
        event_bus: EventBus,
        config: EngineConfig,
    ) -> Arc<Self> {
        let speed = PlaybackSpeed::default();
        let (snapshot, _) = watch::channel(PlaybackSnapshot::idle(speed, 0));

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            adapter,
            cache,
            settings,
            catalog,
            event_bus,
            config,
            inner: Mutex::new(EngineInner {
                state: EngineState::Idle,
                session: None,
                speed,
                seek_generation: 0,
                tick: None,
            }),
            snapshot,
        })
    }

    /// Latest published state.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver that sees the current snapshot and every change after it.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot.subscribe()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Load and start `track`, or toggle it if it is already loaded.
    ///
    /// Any previous session is unloaded before the new one is opened. If the
    /// track cannot be resolved or opened the engine ends up Idle.
    #[instrument(skip(self, track), fields(asset = %track.asset_name))]
    pub async fn play(&self, track: &Track) {
        let mut inner = self.inner.lock().await;

        let same_track = inner
            .session
            .as_ref()
            .is_some_and(|s| s.track.asset_name == track.asset_name);
        if same_track {
            debug!("Track already loaded; toggling");
            self.toggle_locked(&mut inner).await;
            return;
        }

        self.teardown_locked(&mut inner).await;
        inner.state = EngineState::Loading;
        self.publish(&inner);

        match self.open_track(&mut inner, track, true).await {
            Ok(()) => {
                info!(title = %track.title, "Playback started");
                self.announce_loaded(&inner);
                self.emit(PlaybackEvent::Started {
                    title: track.title.clone(),
                    position_ms: 0,
                });
                self.start_tick(&mut inner);
                self.publish(&inner);

                if let Err(e) = self.persist_identity(track).await {
                    warn!(error = %e, "Failed to persist last played track");
                }
            }
            Err(e) => self.fail_load(&mut inner, track, e),
        }
    }

    /// Flip between Playing and Paused. No-op while Idle.
    pub async fn toggle_play_pause(&self) {
        let mut inner = self.inner.lock().await;
        self.toggle_locked(&mut inner).await;
    }

    /// Resume if paused. Returns `false` if the engine was not paused.
    pub async fn play_if_paused(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state != EngineState::Paused {
            return false;
        }
        self.resume_locked(&mut inner).await
    }

    /// Pause if playing. Returns `false` if the engine was not playing.
    pub async fn pause_if_playing(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state != EngineState::Playing {
            return false;
        }
        self.pause_locked(&mut inner).await
    }

    async fn toggle_locked(&self, inner: &mut EngineInner) {
        match inner.state {
            EngineState::Playing => {
                self.pause_locked(inner).await;
            }
            EngineState::Paused => {
                self.resume_locked(inner).await;
            }
            EngineState::Idle | EngineState::Loading => debug!("Nothing loaded; toggle ignored"),
        }
    }

    async fn pause_locked(&self, inner: &mut EngineInner) -> bool {
        let Some(id) = inner.session.as_ref().map(|s| s.id) else {
            return false;
        };

        if let Err(e) = self.adapter.pause(id).await {
            warn!(error = %e, "Pause failed");
            return false;
        }
        inner.stop_tick();

        let position = self.adapter.get_position(id).await.ok();
        let Some(session) = inner.session.as_mut() else {
            return false;
        };
        if let Some(position) = position {
            session.position = position.min(session.duration);
        }
        let event = PlaybackEvent::Paused {
            title: session.track.title.clone(),
            position_ms: session.position.as_millis() as u64,
        };

        inner.state = EngineState::Paused;
        self.emit(event);
        self.publish(inner);
        true
    }

    async fn resume_locked(&self, inner: &mut EngineInner) -> bool {
        let Some(session) = inner.session.as_mut() else {
            return false;
        };

        if session.finished && session.position >= session.duration {
            if let Err(e) = self.adapter.seek(session.id, Duration::ZERO).await {
                warn!(error = %e, "Rewind failed");
                return false;
            }
            session.position = Duration::ZERO;
        }

        if let Err(e) = self.adapter.play(session.id).await {
            warn!(error = %e, "Resume failed");
            return false;
        }
        session.finished = false;
        let event = PlaybackEvent::Started {
            title: session.track.title.clone(),
            position_ms: session.position.as_millis() as u64,
        };

        inner.state = EngineState::Playing;
        self.start_tick(inner);
        self.emit(event);
        self.publish(inner);
        true
    }

    /// Unload the current track and return to Idle.
    ///
    /// The elapsed position is persisted first.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if inner.session.is_none() {
            return;
        }

        self.persist_position_locked(&mut inner).await;

        if let Some(session) = inner.session.as_ref() {
            self.emit(PlaybackEvent::Stopped {
                title: session.track.title.clone(),
                position_ms: session.position.as_millis() as u64,
            });
        }

        self.teardown_locked(&mut inner).await;
        inner.state = EngineState::Idle;
        self.publish(&inner);
        info!("Playback stopped");
    }

    /// Persist position and release the adapter session.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        self.persist_position_locked(&mut inner).await;
        self.teardown_locked(&mut inner).await;
        inner.state = EngineState::Idle;
        self.publish(&inner);
    }

    // ========================================================================
    // Position & Speed
    // ========================================================================

    /// Seek to `fraction` of the duration.
    ///
    /// Fractions outside `[0, 1]` are clamped; NaN is ignored.
    pub async fn seek(&self, fraction: f64) {
        if fraction.is_nan() {
            warn!("Ignoring NaN seek");
            return;
        }
        let fraction = fraction.clamp(0.0, 1.0);

        let mut inner = self.inner.lock().await;
        let Some(duration) = inner.session.as_ref().map(|s| s.duration) else {
            return;
        };
        self.seek_locked(&mut inner, duration.mul_f64(fraction)).await;
    }

    /// Seek to an absolute position, clamped to the duration. Returns
    /// `false` while Idle or if the adapter rejects the seek.
    pub async fn seek_to(&self, position: Duration) -> bool {
        let mut inner = self.inner.lock().await;
        self.seek_locked(&mut inner, position).await
    }

    /// Jump ahead by `interval`, stopping at the end.
    pub async fn skip_forward(&self, interval: Duration) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(target) = self.current_position(&inner).await.map(|p| p + interval) else {
            return false;
        };
        self.seek_locked(&mut inner, target).await
    }

    /// Jump back by `interval`, stopping at zero.
    pub async fn skip_backward(&self, interval: Duration) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(target) = self
            .current_position(&inner)
            .await
            .map(|p| p.saturating_sub(interval))
        else {
            return false;
        };
        self.seek_locked(&mut inner, target).await
    }

    async fn current_position(&self, inner: &EngineInner) -> Option<Duration> {
        let session = inner.session.as_ref()?;
        if inner.state == EngineState::Playing {
            if let Ok(position) = self.adapter.get_position(session.id).await {
                return Some(position.min(session.duration));
            }
        }
        Some(session.position)
    }

    async fn seek_locked(&self, inner: &mut EngineInner, target: Duration) -> bool {
        let Some(session) = inner.session.as_mut() else {
            debug!("Nothing loaded; seek ignored");
            return false;
        };
        let target = target.min(session.duration);

        if let Err(e) = self.adapter.seek(session.id, target).await {
            warn!(error = %e, "Seek failed");
            return false;
        }
        session.position = target;
        session.finished = target >= session.duration;
        let duration = session.duration;

        inner.seek_generation += 1;
        self.emit(PlaybackEvent::PositionChanged {
            position_ms: target.as_millis() as u64,
            duration_ms: duration.as_millis() as u64,
        });
        self.publish(inner);
        true
    }

    /// Change speed from a raw rate. Rates outside the allowed set are
    /// logged and ignored.
    pub async fn set_playback_speed(&self, rate: f32) {
        match PlaybackSpeed::try_from(rate) {
            Ok(speed) => self.set_speed(speed).await,
            Err(e) => warn!(error = %e, "Playback speed unchanged"),
        }
    }

    /// Apply `speed` to the live session (if any) and to later loads.
    pub async fn set_speed(&self, speed: PlaybackSpeed) {
        let mut inner = self.inner.lock().await;

        if let Some(id) = inner.session.as_ref().map(|s| s.id) {
            if let Err(e) = self.adapter.set_rate(id, speed.as_f32()).await {
                warn!(error = %e, %speed, "Adapter rejected playback rate");
                return;
            }
        }

        inner.speed = speed;
        debug!(%speed, "Playback speed changed");
        self.emit(PlaybackEvent::SpeedChanged {
            rate: speed.as_f32(),
        });
        self.publish(&inner);
    }

    // ========================================================================
    // Last Played
    // ========================================================================

    /// Write the elapsed position of the loaded track.
    pub async fn persist_position(&self) {
        let mut inner = self.inner.lock().await;
        self.persist_position_locked(&mut inner).await;
    }

    async fn persist_position_locked(&self, inner: &mut EngineInner) {
        let Some(position) = self.current_position(inner).await else {
            return;
        };
        if let Some(session) = inner.session.as_mut() {
            session.position = position;
        }

        match self
            .settings
            .set_f64(LAST_POSITION_KEY, position.as_secs_f64())
            .await
        {
            Ok(()) => debug!(position_ms = position.as_millis() as u64, "Position persisted"),
            Err(e) => warn!(error = %e, "Failed to persist position"),
        }
    }

    async fn persist_identity(&self, track: &Track) -> Result<()> {
        let json = serde_json::to_string(&track.identity())?;
        self.settings
            .set_string(LAST_PLAYED_KEY, &json)
            .await
            .map_err(|e| PlaybackError::Persistence(e.to_string()))?;
        // A position saved for the previous track no longer applies
        self.settings
            .delete(LAST_POSITION_KEY)
            .await
            .map_err(|e| PlaybackError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn load_last_played(&self) -> Result<Option<(Track, Duration)>> {
        let raw = self
            .settings
            .get_string(LAST_PLAYED_KEY)
            .await
            .map_err(|e| PlaybackError::Persistence(e.to_string()))?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let identity: TrackIdentity = serde_json::from_str(&raw)?;
        let track = match self.catalog.find_by_asset_name(&identity.asset_name) {
            Some(track) => track.clone(),
            None => identity.into_track(),
        };

        let seconds = match self.settings.get_f64(LAST_POSITION_KEY).await {
            Ok(value) => value.unwrap_or(0.0),
            Err(e) => {
                warn!(error = %e, "Failed to read last position");
                0.0
            }
        };
        let position = if seconds.is_finite() && seconds > 0.0 {
            Duration::from_secs_f64(seconds)
        } else {
            Duration::ZERO
        };

        Ok(Some((track, position)))
    }

    /// Load the persisted last-played track, paused at its saved position.
    ///
    /// Does nothing unless the engine is Idle. Nothing is re-persisted.
    /// Returns `true` if a track was loaded.
    #[instrument(skip(self))]
    pub async fn restore_last_played(&self) -> bool {
        let (track, position) = match self.load_last_played().await {
            Ok(Some(saved)) => saved,
            Ok(None) => {
                debug!("No last played track");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable last played track");
                return false;
            }
        };

        let mut inner = self.inner.lock().await;
        if inner.state != EngineState::Idle {
            debug!("Engine busy; skipping restore");
            return false;
        }

        inner.state = EngineState::Loading;
        self.publish(&inner);

        if let Err(e) = self.open_track(&mut inner, &track, false).await {
            self.fail_load(&mut inner, &track, e);
            return false;
        }

        self.announce_loaded(&inner);
        if !position.is_zero() {
            self.seek_locked(&mut inner, position).await;
        }
        self.publish(&inner);
        info!(title = %track.title, "Restored last played track");
        true
    }

    // ========================================================================
    // Session Management
    // ========================================================================

    /// Resolve and open `track`, optionally starting playback.
    async fn open_track(&self, inner: &mut EngineInner, track: &Track, autoplay: bool) -> Result<()> {
        let location = self.cache.resolve(&track.asset_name).await?;
        let from_bundle = !location.is_cached();
        let source = location.into_source();

        let prepared = self
            .adapter
            .prepare(source.clone())
            .await
            .map_err(|e| open_failure(track, e))?;

        if let Err(e) = self.start_session(&prepared, inner.speed, autoplay).await {
            if let Err(unload_err) = self.adapter.unload(prepared.id).await {
                warn!(error = %unload_err, "Failed to release rejected session");
            }
            return Err(open_failure(track, e));
        }

        inner.session = Some(ActiveSession {
            id: prepared.id,
            track: track.clone(),
            duration: prepared.duration,
            position: Duration::ZERO,
            finished: false,
        });
        inner.state = if autoplay {
            EngineState::Playing
        } else {
            EngineState::Paused
        };

        if from_bundle && self.config.cache_on_play {
            debug!("Caching bundled asset in the background");
            drop(self.cache.spawn_cache_asset(source, track.asset_name.clone()));
        }

        Ok(())
    }

    async fn start_session(
        &self,
        prepared: &PreparedSession,
        speed: PlaybackSpeed,
        autoplay: bool,
    ) -> std::result::Result<(), BridgeError> {
        self.adapter.set_rate(prepared.id, speed.as_f32()).await?;
        if autoplay {
            self.adapter.play(prepared.id).await?;
        }
        Ok(())
    }

    fn fail_load(&self, inner: &mut EngineInner, track: &Track, e: PlaybackError) {
        error!(kind = %e.kind(), error = %e, "Failed to load track");
        inner.state = EngineState::Idle;
        self.emit(PlaybackEvent::Error {
            title: Some(track.title.clone()),
            message: e.to_string(),
            recoverable: false,
        });
        self.publish(inner);
    }

    fn announce_loaded(&self, inner: &EngineInner) {
        if let Some(session) = inner.session.as_ref() {
            self.emit(PlaybackEvent::TrackLoaded {
                title: session.track.title.clone(),
                asset_name: session.track.asset_name.clone(),
                duration_ms: session.duration.as_millis() as u64,
            });
        }
    }

    /// Stop the tick and release the adapter session.
    async fn teardown_locked(&self, inner: &mut EngineInner) {
        inner.stop_tick();

        if let Some(session) = inner.session.take() {
            if let Err(e) = self.adapter.unload(session.id).await {
                warn!(error = %e, "Failed to unload previous session");
            }
            debug!(title = %session.track.title, "Session released");
        }
    }

    fn start_tick(&self, inner: &mut EngineInner) {
        inner.stop_tick();

        let Some(session) = inner.session.as_ref().map(|s| s.id) else {
            return;
        };
        let engine = self.me.clone();
        let period = self.config.position_tick;

        inner.tick = Some(tokio::spawn(run_tick(engine, session, period)));
    }

    /// One tick: refresh the position and detect the end of the track.
    /// Returns `false` when the tick should stop.
    async fn sample(&self, id: PlaybackSessionId) -> bool {
        let mut inner = self.inner.lock().await;

        let current = inner.session.as_ref().is_some_and(|s| s.id == id);
        if !current || inner.state != EngineState::Playing {
            return false;
        }

        match self.adapter.state(id).await {
            Ok(PlaybackState::Completed) => {
                self.finish_locked(&mut inner).await;
                return false;
            }
            Ok(PlaybackState::Error { message }) => {
                error!(%message, "Playback error");
                inner.tick = None;
                inner.state = EngineState::Paused;
                let title = inner.session.as_ref().map(|s| s.track.title.clone());
                self.emit(PlaybackEvent::Error {
                    title,
                    message,
                    recoverable: true,
                });
                self.publish(&inner);
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Adapter state unavailable");
            }
        }

        let position = match self.adapter.get_position(id).await {
            Ok(position) => position,
            Err(e) => {
                warn!(error = %e, "Position unavailable");
                return true;
            }
        };

        let Some(session) = inner.session.as_mut() else {
            return false;
        };
        session.position = position.min(session.duration);
        self.emit(PlaybackEvent::PositionChanged {
            position_ms: session.position.as_millis() as u64,
            duration_ms: session.duration.as_millis() as u64,
        });
        self.publish(&inner);
        true
    }

    /// End of track: Paused at the end position, tick stopped.
    async fn finish_locked(&self, inner: &mut EngineInner) {
        // Called from the tick task itself; dropping the handle detaches it.
        inner.tick = None;

        let Some(session) = inner.session.as_mut() else {
            return;
        };
        if let Err(e) = self.adapter.pause(session.id).await {
            debug!(error = %e, "Pause after completion failed");
        }
        session.position = session.duration;
        session.finished = true;
        let title = session.track.title.clone();

        inner.state = EngineState::Paused;
        info!(%title, "Track finished");
        self.emit(PlaybackEvent::Finished { title });
        self.publish(inner);
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    fn publish(&self, inner: &EngineInner) {
        let snapshot = match inner.session.as_ref() {
            Some(session) => PlaybackSnapshot {
                state: inner.state,
                track: Some(session.track.clone()),
                position: session.position,
                duration: session.duration,
                speed: inner.speed,
                seek_generation: inner.seek_generation,
            },
            None => PlaybackSnapshot {
                state: inner.state,
                ..PlaybackSnapshot::idle(inner.speed, inner.seek_generation)
            },
        };
        self.snapshot.send_replace(snapshot);
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.event_bus.emit(CoreEvent::Playback(event));
    }
}

fn open_failure(track: &Track, e: BridgeError) -> PlaybackError {
    PlaybackError::PlaybackOpenFailure {
        asset: track.asset_name.clone(),
        message: e.to_string(),
    }
}

async fn run_tick(engine: Weak<PlaybackEngine>, session: PlaybackSessionId, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(engine) = engine.upgrade() else {
            break;
        };
        if !engine.sample(session).await {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::ZERO), "00:00");
        assert_eq!(format_elapsed(Duration::from_millis(65_900)), "01:05");
        assert_eq!(format_elapsed(Duration::from_secs(3_725)), "62:05");
    }

    #[test]
    fn test_progress() {
        let mut snapshot = PlaybackSnapshot::idle(PlaybackSpeed::Normal, 0);
        assert_eq!(snapshot.progress(), 0.0);

        snapshot.duration = Duration::from_secs(200);
        snapshot.position = Duration::from_secs(50);
        assert_eq!(snapshot.progress(), 0.25);
        assert_eq!(snapshot.elapsed_label(), "00:50");
        assert!(!snapshot.is_playing());
    }
}
