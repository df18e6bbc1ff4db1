//! # Core Configuration Module
//!
//! Provides configuration management for the meditation core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary dependencies and settings for the core library.
//! It enforces fail-fast validation to ensure all required bridges are provided
//! before initialization.
//!
//! ## Required Dependencies
//!
//! - `FileSystemAccess` - Cache directory I/O
//! - `HttpClient` - Remote asset downloads
//! - `ResourceBundle` - Audio shipped with the app
//! - `PlaybackAdapter` - Native audio player
//! - `SettingsStore` - Streak and last-played persistence
//!
//! ## Optional Dependencies
//!
//! - `NetworkMonitor` - Reachability (absent: assumed online)
//! - `LifecycleObserver` - Foreground/background transitions
//! - `BackgroundTaskHost` - Extended execution grants
//! - `IdleTimer` - Keep-awake during playback
//! - `MediaControls` - Lock screen / now-playing surface
//! - `Clock` - Defaults to [`SystemClock`]
//!
//! When the `desktop-shims` feature is enabled, `bridge-desktop`
//! implementations are injected for every bridge left unset.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .cache_dir("/path/to/cache")
//!     .build()?;
//! let settings = config.settings_store().await?;
//! ```
//!
//! ## Error Handling
//!
//! The builder validates all required dependencies and provides actionable error
//! messages when capabilities are missing.

use crate::error::{Error, Result};
use bridge_traits::{
    BackgroundTaskHost, Clock, FileSystemAccess, HttpClient, IdleTimer, LifecycleObserver,
    MediaControls, NetworkMonitor, PlaybackAdapter, ResourceBundle, SettingsStore, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Name of the directory (under `cache_dir`) holding cached audio.
pub const DEFAULT_CACHE_DIRECTORY_NAME: &str = "MeditationCache";
/// Interval of the playback position sampling tick.
pub const DEFAULT_POSITION_TICK: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 4;
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);
/// How long the offline advisory stays visible.
pub const DEFAULT_OFFLINE_ADVISORY_DURATION: Duration = Duration::from_secs(5);

/// Core configuration.
///
/// This struct holds all dependencies and settings required to initialize
/// the core library. Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base directory for cached audio and local state
    pub cache_dir: PathBuf,

    /// Subdirectory of `cache_dir` holding cached audio files
    pub cache_directory_name: String,

    /// Path to the SQLite settings database (desktop default store)
    pub database_path: PathBuf,

    /// Playback position sampling interval
    pub position_tick: Duration,

    /// Upper bound on simultaneous cache downloads
    pub max_concurrent_downloads: usize,

    /// Upper bound on a single cache transfer
    pub download_timeout: Duration,

    /// How long the offline advisory stays visible
    pub offline_advisory_duration: Duration,

    /// Prefetch the catalog when connectivity comes back
    pub prefetch_on_reconnect: bool,

    /// Cache a track in the background when it is played from the bundle
    pub cache_on_play: bool,

    pub http_client: Arc<dyn HttpClient>,
    pub file_system: Arc<dyn FileSystemAccess>,
    pub resource_bundle: Arc<dyn ResourceBundle>,
    pub playback_adapter: Arc<dyn PlaybackAdapter>,
    pub clock: Arc<dyn Clock>,

    /// Settings store; resolved lazily by [`CoreConfig::settings_store`]
    settings_store: Option<Arc<dyn SettingsStore>>,

    pub network_monitor: Option<Arc<dyn NetworkMonitor>>,
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    pub background_task_host: Option<Arc<dyn BackgroundTaskHost>>,
    pub idle_timer: Option<Arc<dyn IdleTimer>>,
    pub media_controls: Option<Arc<dyn MediaControls>>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("cache_dir", &self.cache_dir)
            .field("cache_directory_name", &self.cache_directory_name)
            .field("database_path", &self.database_path)
            .field("position_tick", &self.position_tick)
            .field("max_concurrent_downloads", &self.max_concurrent_downloads)
            .field("download_timeout", &self.download_timeout)
            .field("offline_advisory_duration", &self.offline_advisory_duration)
            .field("prefetch_on_reconnect", &self.prefetch_on_reconnect)
            .field("cache_on_play", &self.cache_on_play)
            .field(
                "settings_store",
                &self.settings_store.as_ref().map(|_| "SettingsStore { ... }"),
            )
            .field(
                "network_monitor",
                &self.network_monitor.as_ref().map(|_| "NetworkMonitor { ... }"),
            )
            .field(
                "lifecycle_observer",
                &self
                    .lifecycle_observer
                    .as_ref()
                    .map(|_| "LifecycleObserver { ... }"),
            )
            .field(
                "background_task_host",
                &self
                    .background_task_host
                    .as_ref()
                    .map(|_| "BackgroundTaskHost { ... }"),
            )
            .field("idle_timer", &self.idle_timer.as_ref().map(|_| "IdleTimer { ... }"))
            .field(
                "media_controls",
                &self.media_controls.as_ref().map(|_| "MediaControls { ... }"),
            )
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Full path of the audio cache directory.
    pub fn cache_directory(&self) -> PathBuf {
        self.cache_dir.join(&self.cache_directory_name)
    }

    /// Returns the injected settings store, or opens the desktop default.
    ///
    /// Opening SQLite is async, so this cannot happen inside `build()`.
    pub async fn settings_store(&self) -> Result<Arc<dyn SettingsStore>> {
        match &self.settings_store {
            Some(store) => Ok(Arc::clone(store)),
            None => provide_default_settings_store(&self.database_path).await,
        }
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.cache_directory_name.is_empty()
            || self.cache_directory_name.contains(['/', '\\'])
            || self.cache_directory_name == ".."
        {
            return Err(Error::Config(format!(
                "Cache directory name '{}' must be a single path component",
                self.cache_directory_name
            )));
        }

        if self.position_tick < Duration::from_millis(50) || self.position_tick > Duration::from_secs(10)
        {
            return Err(Error::Config(
                "Position tick must be between 50ms and 10s".to_string(),
            ));
        }

        if self.max_concurrent_downloads == 0 {
            return Err(Error::Config(
                "Max concurrent downloads must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_downloads > 32 {
            return Err(Error::Config(
                "Max concurrent downloads exceeds maximum of 32".to_string(),
            ));
        }

        if self.download_timeout.is_zero() {
            return Err(Error::Config(
                "Download timeout must be greater than 0".to_string(),
            ));
        }

        if self.offline_advisory_duration.is_zero()
            || self.offline_advisory_duration > Duration::from_secs(60)
        {
            return Err(Error::Config(
                "Offline advisory duration must be between 1ms and 60s".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, purpose: &str, desktop_default: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: ensure the 'desktop-shims' feature is enabled to use the default {}. \
             Mobile: inject the platform-native adapter.",
            capability, purpose, desktop_default
        ),
    }
}

#[cfg(feature = "desktop-shims")]
mod defaults {
    use super::*;
    use bridge_desktop::{
        DesktopBackgroundTaskHost, DesktopIdleTimer, DesktopLifecycleObserver,
        DesktopNetworkMonitor, DirectoryBundle, LoggingMediaControls, ReqwestHttpClient,
        TokioFileSystem,
    };

    pub fn http_client() -> Result<Arc<dyn HttpClient>> {
        let client = ReqwestHttpClient::new()
            .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
        Ok(Arc::new(client))
    }

    pub fn file_system(cache_dir: &std::path::Path) -> Result<Arc<dyn FileSystemAccess>> {
        Ok(Arc::new(TokioFileSystem::with_cache_directory(
            cache_dir.to_path_buf(),
        )))
    }

    pub fn resource_bundle() -> Result<Arc<dyn ResourceBundle>> {
        Ok(Arc::new(DirectoryBundle::beside_executable()))
    }

    #[cfg(feature = "audio-output")]
    pub fn playback_adapter() -> Result<Arc<dyn PlaybackAdapter>> {
        let adapter = bridge_desktop::RodioPlaybackAdapter::new()
            .map_err(|e| Error::Internal(format!("Failed to open audio output: {}", e)))?;
        Ok(Arc::new(adapter))
    }

    #[cfg(not(feature = "audio-output"))]
    pub fn playback_adapter() -> Result<Arc<dyn PlaybackAdapter>> {
        Ok(Arc::new(bridge_desktop::HeadlessPlaybackAdapter::new()))
    }

    pub fn network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
        Some(Arc::new(DesktopNetworkMonitor::new()))
    }

    pub fn lifecycle_observer() -> Option<Arc<dyn LifecycleObserver>> {
        Some(Arc::new(DesktopLifecycleObserver::new()))
    }

    pub fn background_task_host() -> Option<Arc<dyn BackgroundTaskHost>> {
        Some(Arc::new(DesktopBackgroundTaskHost::new()))
    }

    pub fn idle_timer() -> Option<Arc<dyn IdleTimer>> {
        Some(Arc::new(DesktopIdleTimer::new()))
    }

    pub fn media_controls() -> Option<Arc<dyn MediaControls>> {
        Some(Arc::new(LoggingMediaControls::new()))
    }
}

#[cfg(not(feature = "desktop-shims"))]
mod defaults {
    use super::*;

    pub fn http_client() -> Result<Arc<dyn HttpClient>> {
        Err(capability_missing(
            "HttpClient",
            "downloading assets into the cache",
            "ReqwestHttpClient",
        ))
    }

    pub fn file_system(_cache_dir: &std::path::Path) -> Result<Arc<dyn FileSystemAccess>> {
        Err(capability_missing(
            "FileSystemAccess",
            "the offline audio cache",
            "TokioFileSystem",
        ))
    }

    pub fn resource_bundle() -> Result<Arc<dyn ResourceBundle>> {
        Err(capability_missing(
            "ResourceBundle",
            "locating bundled audio",
            "DirectoryBundle",
        ))
    }

    pub fn playback_adapter() -> Result<Arc<dyn PlaybackAdapter>> {
        Err(capability_missing(
            "PlaybackAdapter",
            "audio playback",
            "HeadlessPlaybackAdapter",
        ))
    }

    pub fn network_monitor() -> Option<Arc<dyn NetworkMonitor>> {
        None
    }

    pub fn lifecycle_observer() -> Option<Arc<dyn LifecycleObserver>> {
        None
    }

    pub fn background_task_host() -> Option<Arc<dyn BackgroundTaskHost>> {
        None
    }

    pub fn idle_timer() -> Option<Arc<dyn IdleTimer>> {
        None
    }

    pub fn media_controls() -> Option<Arc<dyn MediaControls>> {
        None
    }
}

#[cfg(feature = "desktop-shims")]
async fn provide_default_settings_store(
    database_path: &std::path::Path,
) -> Result<Arc<dyn SettingsStore>> {
    let store = bridge_desktop::SqliteSettingsStore::new(database_path.to_path_buf())
        .await
        .map_err(|e| Error::Internal(format!("Failed to initialize default SettingsStore: {}", e)))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
async fn provide_default_settings_store(
    _database_path: &std::path::Path,
) -> Result<Arc<dyn SettingsStore>> {
    Err(capability_missing(
        "SettingsStore",
        "streak and last-played persistence",
        "SqliteSettingsStore",
    ))
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](CoreConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    cache_dir: Option<PathBuf>,
    cache_directory_name: Option<String>,
    database_path: Option<PathBuf>,
    position_tick: Option<Duration>,
    max_concurrent_downloads: Option<usize>,
    download_timeout: Option<Duration>,
    offline_advisory_duration: Option<Duration>,
    prefetch_on_reconnect: Option<bool>,
    cache_on_play: Option<bool>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    resource_bundle: Option<Arc<dyn ResourceBundle>>,
    playback_adapter: Option<Arc<dyn PlaybackAdapter>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    clock: Option<Arc<dyn Clock>>,
    network_monitor: Option<Arc<dyn NetworkMonitor>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    background_task_host: Option<Arc<dyn BackgroundTaskHost>>,
    idle_timer: Option<Arc<dyn IdleTimer>>,
    media_controls: Option<Arc<dyn MediaControls>>,
}

impl CoreConfigBuilder {
    /// Sets the base cache directory (required).
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .cache_dir("/path/to/cache");
    /// ```
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    /// Name of the audio cache subdirectory.
    ///
    /// Default: `MeditationCache`
    pub fn cache_directory_name(mut self, name: impl Into<String>) -> Self {
        self.cache_directory_name = Some(name.into());
        self
    }

    /// Sets the settings database path.
    ///
    /// Default: `<cache_dir>/settings.db`
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Playback position sampling interval.
    ///
    /// Default: 500ms
    pub fn position_tick(mut self, interval: Duration) -> Self {
        self.position_tick = Some(interval);
        self
    }

    /// Maximum number of simultaneous cache downloads.
    ///
    /// Default: 4
    pub fn max_concurrent_downloads(mut self, limit: usize) -> Self {
        self.max_concurrent_downloads = Some(limit);
        self
    }

    /// Upper bound on a single cache transfer.
    ///
    /// Default: 120s
    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = Some(timeout);
        self
    }

    /// How long the offline advisory stays visible.
    ///
    /// Default: 5s
    pub fn offline_advisory_duration(mut self, duration: Duration) -> Self {
        self.offline_advisory_duration = Some(duration);
        self
    }

    /// Prefetch every catalog asset when connectivity returns.
    ///
    /// Default: true
    pub fn prefetch_on_reconnect(mut self, enabled: bool) -> Self {
        self.prefetch_on_reconnect = Some(enabled);
        self
    }

    /// Cache tracks in the background when played from the bundle.
    ///
    /// Default: true
    pub fn cache_on_play(mut self, enabled: bool) -> Self {
        self.cache_on_play = Some(enabled);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn resource_bundle(mut self, bundle: Arc<dyn ResourceBundle>) -> Self {
        self.resource_bundle = Some(bundle);
        self
    }

    pub fn playback_adapter(mut self, adapter: Arc<dyn PlaybackAdapter>) -> Self {
        self.playback_adapter = Some(adapter);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Time source used for streak timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn network_monitor(mut self, monitor: Arc<dyn NetworkMonitor>) -> Self {
        self.network_monitor = Some(monitor);
        self
    }

    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    pub fn background_task_host(mut self, host: Arc<dyn BackgroundTaskHost>) -> Self {
        self.background_task_host = Some(host);
        self
    }

    pub fn idle_timer(mut self, timer: Arc<dyn IdleTimer>) -> Self {
        self.idle_timer = Some(timer);
        self
    }

    pub fn media_controls(mut self, controls: Arc<dyn MediaControls>) -> Self {
        self.media_controls = Some(controls);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if the cache directory is missing, a required bridge
    /// is missing and no desktop default is available, or a value is out of
    /// range.
    pub fn build(self) -> Result<CoreConfig> {
        let cache_dir = self.cache_dir.ok_or_else(|| {
            Error::Config("Cache directory is required. Use .cache_dir() to set it.".to_string())
        })?;

        let database_path = self
            .database_path
            .unwrap_or_else(|| cache_dir.join("settings.db"));

        let http_client = match self.http_client {
            Some(client) => client,
            None => defaults::http_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => defaults::file_system(&cache_dir)?,
        };

        let resource_bundle = match self.resource_bundle {
            Some(bundle) => bundle,
            None => defaults::resource_bundle()?,
        };

        let playback_adapter = match self.playback_adapter {
            Some(adapter) => adapter,
            None => defaults::playback_adapter()?,
        };

        #[cfg(not(feature = "desktop-shims"))]
        if self.settings_store.is_none() {
            return Err(capability_missing(
                "SettingsStore",
                "streak and last-played persistence",
                "SqliteSettingsStore",
            ));
        }

        let config = CoreConfig {
            cache_dir,
            cache_directory_name: self
                .cache_directory_name
                .unwrap_or_else(|| DEFAULT_CACHE_DIRECTORY_NAME.to_string()),
            database_path,
            position_tick: self.position_tick.unwrap_or(DEFAULT_POSITION_TICK),
            max_concurrent_downloads: self
                .max_concurrent_downloads
                .unwrap_or(DEFAULT_MAX_CONCURRENT_DOWNLOADS),
            download_timeout: self.download_timeout.unwrap_or(DEFAULT_DOWNLOAD_TIMEOUT),
            offline_advisory_duration: self
                .offline_advisory_duration
                .unwrap_or(DEFAULT_OFFLINE_ADVISORY_DURATION),
            prefetch_on_reconnect: self.prefetch_on_reconnect.unwrap_or(true),
            cache_on_play: self.cache_on_play.unwrap_or(true),
            http_client,
            file_system,
            resource_bundle,
            playback_adapter,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            settings_store: self.settings_store,
            network_monitor: self.network_monitor.or_else(defaults::network_monitor),
            lifecycle_observer: self.lifecycle_observer.or_else(defaults::lifecycle_observer),
            background_task_host: self
                .background_task_host
                .or_else(defaults::background_task_host),
            idle_timer: self.idle_timer.or_else(defaults::idle_timer),
            media_controls: self.media_controls.or_else(defaults::media_controls),
        };

        config.validate()?;

        Ok(config)
    }
}
