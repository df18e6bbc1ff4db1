//! Fakes shared by the playback integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::{DirectoryBundle, TokioFileSystem};
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::{
    AudioSource, HttpClient, PlaybackAdapter, PlaybackSessionId, PlaybackState, PreparedSession,
    SettingsStore,
};
use core_library::{Catalog, Section, Track};
use core_playback::{AssetCache, CacheConfig, EngineConfig, PlaybackEngine, PlaybackSnapshot};
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncRead;
use tokio::sync::watch;

pub const DEFAULT_DURATION: Duration = Duration::from_secs(300);

// ============================================================================
// Playback adapter
// ============================================================================

#[derive(Debug, Clone)]
struct FakeSession {
    key: String,
    duration: Duration,
    position: Duration,
    playing: bool,
    completed: bool,
    rate: f32,
}

#[derive(Default)]
struct AdapterState {
    sessions: HashMap<PlaybackSessionId, FakeSession>,
    durations: HashMap<String, Duration>,
    failing: HashSet<String>,
    prepared: usize,
}

/// In-memory player whose position only moves when the test says so.
#[derive(Default)]
pub struct ScriptedAdapter {
    state: Mutex<AdapterState>,
}

fn source_key(source: &AudioSource) -> String {
    match source {
        AudioSource::LocalFile { path } => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        AudioSource::RemoteStream { url } => url.rsplit('/').next().unwrap_or(url).to_string(),
    }
}

impl ScriptedAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_duration(&self, file_name: &str, duration: Duration) {
        self.state
            .lock()
            .unwrap()
            .durations
            .insert(file_name.to_string(), duration);
    }

    /// Make `prepare` fail for `file_name`, as for a corrupt file.
    pub fn fail_prepare(&self, file_name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing
            .insert(file_name.to_string());
    }

    pub fn prepared_count(&self) -> usize {
        self.state.lock().unwrap().prepared
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    fn with_only_session<T>(&self, f: impl FnOnce(&mut FakeSession) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        assert_eq!(state.sessions.len(), 1, "expected exactly one open session");
        let session = state.sessions.values_mut().next().unwrap();
        f(session)
    }

    pub fn open_file(&self) -> String {
        self.with_only_session(|s| s.key.clone())
    }

    pub fn is_playing(&self) -> bool {
        self.with_only_session(|s| s.playing)
    }

    pub fn rate(&self) -> f32 {
        self.with_only_session(|s| s.rate)
    }

    pub fn position(&self) -> Duration {
        self.with_only_session(|s| s.position)
    }

    /// Move the playhead of the open session.
    pub fn advance_to(&self, position: Duration) {
        self.with_only_session(|s| s.position = position.min(s.duration));
    }

    /// Reach the natural end of the open session.
    pub fn complete(&self) {
        self.with_only_session(|s| {
            s.position = s.duration;
            s.completed = true;
        });
    }

    fn with_session<T>(
        &self,
        id: PlaybackSessionId,
        f: impl FnOnce(&mut FakeSession) -> T,
    ) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        state
            .sessions
            .get_mut(&id)
            .map(f)
            .ok_or_else(|| BridgeError::NotFound(format!("session {:?}", id)))
    }
}

#[async_trait]
impl PlaybackAdapter for ScriptedAdapter {
    async fn prepare(&self, source: AudioSource) -> Result<PreparedSession> {
        let key = source_key(&source);
        let mut state = self.state.lock().unwrap();

        if state.failing.contains(&key) {
            return Err(BridgeError::OperationFailed(format!("cannot decode {}", key)));
        }

        let duration = state
            .durations
            .get(&key)
            .copied()
            .unwrap_or(DEFAULT_DURATION);
        let id = PlaybackSessionId::new();
        state.sessions.insert(
            id,
            FakeSession {
                key,
                duration,
                position: Duration::ZERO,
                playing: false,
                completed: false,
                rate: 1.0,
            },
        );
        state.prepared += 1;

        Ok(PreparedSession { id, duration })
    }

    async fn play(&self, session: PlaybackSessionId) -> Result<()> {
        self.with_session(session, |s| s.playing = true)
    }

    async fn pause(&self, session: PlaybackSessionId) -> Result<()> {
        self.with_session(session, |s| s.playing = false)
    }

    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> Result<()> {
        self.with_session(session, |s| {
            s.position = position.min(s.duration);
            s.completed = false;
        })
    }

    async fn set_rate(&self, session: PlaybackSessionId, rate: f32) -> Result<()> {
        self.with_session(session, |s| s.rate = rate)
    }

    async fn get_position(&self, session: PlaybackSessionId) -> Result<Duration> {
        self.with_session(session, |s| s.position)
    }

    async fn state(&self, session: PlaybackSessionId) -> Result<PlaybackState> {
        self.with_session(session, |s| {
            if s.completed && s.playing {
                PlaybackState::Completed
            } else if s.playing {
                PlaybackState::Playing
            } else {
                PlaybackState::Paused
            }
        })
    }

    async fn unload(&self, session: PlaybackSessionId) -> Result<()> {
        self.state.lock().unwrap().sessions.remove(&session);
        Ok(())
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// HTTP client serving fixed bodies, or failing every request when offline.
#[derive(Default)]
pub struct ScriptedHttp {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    offline: std::sync::atomic::AtomicBool,
}

impl ScriptedHttp {
    pub fn offline() -> Arc<Self> {
        let http = Self::default();
        http.offline.store(true, std::sync::atomic::Ordering::SeqCst);
        Arc::new(http)
    }

    pub fn serve(&self, url: &str, body: &[u8]) {
        self.bodies
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_vec());
    }
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn download_stream(&self, url: String) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        if self.offline.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed(format!(
                "The Internet connection appears to be offline: {}",
                url
            )));
        }
        match self.bodies.lock().unwrap().get(&url) {
            Some(body) => Ok(Box::new(std::io::Cursor::new(body.clone()))),
            None => Err(BridgeError::OperationFailed(format!("HTTP 404 for {}", url))),
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn values_reset(&self) {
        self.values.lock().unwrap().clear();
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self.raw(key))
    }
    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_string(key, &value.to_string()).await
    }
    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self.raw(key).and_then(|v| v.parse().ok()))
    }
    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.set_string(key, &value.to_string()).await
    }
    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.raw(key).and_then(|v| v.parse().ok()))
    }
    async fn set_f64(&self, key: &str, value: f64) -> Result<()> {
        self.set_string(key, &value.to_string()).await
    }
    async fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        Ok(self.raw(key).and_then(|v| v.parse().ok()))
    }
    async fn delete(&self, key: &str) -> Result<()> {
        self.values.lock().unwrap().remove(key);
        Ok(())
    }
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.values.lock().unwrap().contains_key(key))
    }
    async fn clear_all(&self) -> Result<()> {
        self.values.lock().unwrap().clear();
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Two sections, six tracks.
pub fn small_catalog() -> Catalog {
    Catalog::new(vec![
        Section::new(
            "Morning",
            vec![
                Track::new("Arrival", "assets/01-Arrival.mp3"),
                Track::new("Breath", "assets/02-Breath.mp3"),
                Track::new("Body Scan", "assets/03-Body-Scan.mp3"),
            ],
        ),
        Section::new(
            "Evening",
            vec![
                Track::new("Posture", "assets/04-Posture.mp3"),
                Track::new("Stillness", "assets/05-Stillness.mp3"),
                Track::new("Closing", "assets/06-Closing.mp3"),
            ],
        ),
    ])
    .unwrap()
}

pub struct Harness {
    pub dir: TempDir,
    pub bundle_dir: PathBuf,
    pub adapter: Arc<ScriptedAdapter>,
    pub settings: Arc<MemorySettings>,
    pub http: Arc<ScriptedHttp>,
    pub cache: Arc<AssetCache>,
    pub catalog: Arc<Catalog>,
    pub bus: EventBus,
}

impl Harness {
    /// Every catalog track is bundled; nothing is cached; offline.
    pub async fn new() -> Self {
        let catalog = small_catalog();
        let dir = tempfile::tempdir().unwrap();
        let bundle_dir = dir.path().join("bundle");
        tokio::fs::create_dir_all(&bundle_dir).await.unwrap();
        for track in catalog.tracks() {
            tokio::fs::write(bundle_dir.join(track.file_name()), track.title.as_bytes())
                .await
                .unwrap();
        }

        let http = ScriptedHttp::offline();
        let bus = EventBus::new(256);
        let cache = Arc::new(AssetCache::new(
            CacheConfig::default(),
            Arc::new(TokioFileSystem::with_cache_directory(dir.path().join("cache"))),
            http.clone(),
            Arc::new(DirectoryBundle::new(&bundle_dir)),
            bus.clone(),
        ));

        Self {
            dir,
            bundle_dir,
            adapter: ScriptedAdapter::new(),
            settings: Arc::new(MemorySettings::default()),
            http,
            cache,
            catalog: Arc::new(catalog),
            bus,
        }
    }

    pub fn track(&self, index: usize) -> Track {
        self.catalog.tracks().nth(index).cloned().unwrap()
    }

    pub fn engine_config() -> EngineConfig {
        EngineConfig {
            position_tick: Duration::from_millis(20),
            cache_on_play: false,
        }
    }

    pub fn engine(&self) -> Arc<PlaybackEngine> {
        self.engine_with(Self::engine_config())
    }

    pub fn engine_with(&self, config: EngineConfig) -> Arc<PlaybackEngine> {
        PlaybackEngine::new(
            self.adapter.clone(),
            self.cache.clone(),
            self.settings.clone(),
            self.catalog.clone(),
            self.bus.clone(),
            config,
        )
    }
}

/// Wait until the engine publishes a snapshot matching `predicate`.
pub async fn wait_for<F>(rx: &mut watch::Receiver<PlaybackSnapshot>, predicate: F) -> PlaybackSnapshot
where
    F: Fn(&PlaybackSnapshot) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if predicate(&snapshot) {
                    return snapshot.clone();
                }
            }
            rx.changed().await.expect("engine dropped");
        }
    })
    .await
    .expect("timed out waiting for engine state")
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(check: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never became true");
}

/// Everything currently queued on `rx`.
pub fn drain(rx: &mut Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
