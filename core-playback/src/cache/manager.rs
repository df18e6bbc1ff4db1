//! # Asset Cache
//!
//! Maps a logical asset name to a playable location and installs cache
//! entries.
//!
//! - One file per asset name under `<cache dir>/<cache_directory>/`, named by
//!   the asset name with `assets/` stripped
//! - Transfers are staged next to the destination and renamed into place, so
//!   a reader never sees a half-written file
//! - Concurrent transfers are throttled by a semaphore and bounded by
//!   `download_timeout`
//! - The cache directory is created lazily; if that fails the cache behaves
//!   as if nothing were ever cached

use crate::cache::config::CacheConfig;
use crate::error::{PlaybackError, Result};
use bridge_traits::{
    error::BridgeError, AudioSource, FileSystemAccess, HttpClient, ResourceBundle,
};
use core_library::file_name_for;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::logging::{redact_url, strip_path};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Where a resolved asset can be played from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLocation {
    /// File in the cache directory
    Cached(PathBuf),
    /// Resource shipped with the app
    Bundled(AudioSource),
}

impl AssetLocation {
    pub fn is_cached(&self) -> bool {
        matches!(self, AssetLocation::Cached(_))
    }

    pub fn into_source(self) -> AudioSource {
        match self {
            AssetLocation::Cached(path) => AudioSource::LocalFile { path },
            AssetLocation::Bundled(source) => source,
        }
    }
}

/// Presence-based cache of bundled audio.
pub struct AssetCache {
    config: CacheConfig,
    fs: Arc<dyn FileSystemAccess>,
    http_client: Arc<dyn HttpClient>,
    bundle: Arc<dyn ResourceBundle>,
    event_bus: EventBus,
    download_semaphore: Arc<Semaphore>,
    directory_ready: AtomicBool,
}

impl AssetCache {
    pub fn new(
        config: CacheConfig,
        fs: Arc<dyn FileSystemAccess>,
        http_client: Arc<dyn HttpClient>,
        bundle: Arc<dyn ResourceBundle>,
        event_bus: EventBus,
    ) -> Self {
        let download_semaphore = Arc::new(Semaphore::new(config.max_concurrent_downloads.max(1)));

        Self {
            config,
            fs,
            http_client,
            bundle,
            event_bus,
            download_semaphore,
            directory_ready: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Path of the cache directory. Does not create it.
    pub async fn directory(&self) -> Result<PathBuf> {
        let base = self.fs.get_cache_directory().await?;
        Ok(base.join(&self.config.cache_directory))
    }

    /// Destination path for `asset_name`, whether or not it is cached yet.
    pub async fn cache_path_for(&self, asset_name: &str) -> Result<PathBuf> {
        Ok(self.directory().await?.join(file_name_for(asset_name)))
    }

    /// Create the cache directory on first use.
    ///
    /// Returns `None` (after logging) when the directory cannot be created.
    async fn ensure_directory(&self) -> Option<PathBuf> {
        let dir = match self.directory().await {
            Ok(dir) => dir,
            Err(e) => {
                warn!(error = %e, "Cache directory unavailable");
                return None;
            }
        };

        if self.directory_ready.load(Ordering::Acquire) {
            return Some(dir);
        }

        if let Err(e) = self.fs.create_dir_all(&dir).await {
            error!(error = %e, "Failed to create cache directory; caching disabled");
            return None;
        }

        self.directory_ready.store(true, Ordering::Release);
        debug!(dir = %strip_path(&dir.to_string_lossy()), "Cache directory ready");
        Some(dir)
    }

    /// Cached file for `asset_name`, if present on disk.
    async fn cached_path(&self, asset_name: &str) -> Option<PathBuf> {
        let path = self.ensure_directory().await?.join(file_name_for(asset_name));

        match self.fs.exists(&path).await {
            Ok(true) => Some(path),
            Ok(false) => None,
            Err(e) => {
                warn!(asset = asset_name, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    /// Existence check only; the file content is never validated.
    pub async fn is_cached(&self, asset_name: &str) -> bool {
        self.cached_path(asset_name).await.is_some()
    }

    /// Bundled location for `asset_name`.
    pub async fn bundled_source(&self, asset_name: &str) -> Result<AudioSource> {
        match self.bundle.locate(file_name_for(asset_name)).await {
            Ok(Some(source)) => Ok(source),
            Ok(None) => Err(PlaybackError::ResourceNotFound(asset_name.to_string())),
            Err(e) => {
                warn!(asset = asset_name, error = %e, "Bundle lookup failed");
                Err(PlaybackError::ResourceNotFound(asset_name.to_string()))
            }
        }
    }

    /// Resolve a playable location. The cache always wins over the bundle.
    #[instrument(skip(self))]
    pub async fn resolve(&self, asset_name: &str) -> Result<AssetLocation> {
        if let Some(path) = self.cached_path(asset_name).await {
            debug!("Resolved from cache");
            return Ok(AssetLocation::Cached(path));
        }

        let source = self.bundled_source(asset_name).await?;
        debug!("Resolved from bundle");
        Ok(AssetLocation::Bundled(source))
    }

    /// Copy `source` into the cache as `asset_name`.
    ///
    /// The transfer lands in a staging file that is renamed over the
    /// destination on success and deleted on failure, so the previous cache
    /// state survives any error.
    #[instrument(skip(self, source), fields(asset = %asset_name))]
    pub async fn cache_asset(&self, source: AudioSource, asset_name: &str) -> Result<PathBuf> {
        let result = self.cache_asset_inner(&source, asset_name).await;

        let event = match &result {
            Ok(path) => {
                info!(file = %strip_path(&path.to_string_lossy()), "Asset cached");
                CacheEvent::AssetCached {
                    asset_name: asset_name.to_string(),
                }
            }
            Err(e) => {
                warn!(kind = %e.kind(), error = %e, "Caching failed");
                CacheEvent::AssetFailed {
                    asset_name: asset_name.to_string(),
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                }
            }
        };
        let _ = self.event_bus.emit(CoreEvent::Cache(event));

        result
    }

    async fn cache_asset_inner(&self, source: &AudioSource, asset_name: &str) -> Result<PathBuf> {
        let dir = self
            .ensure_directory()
            .await
            .ok_or_else(|| PlaybackError::InstallFailure {
                asset: asset_name.to_string(),
                message: "cache directory unavailable".to_string(),
            })?;

        let _permit = self.download_semaphore.acquire().await.map_err(|_| {
            PlaybackError::TransferFailure {
                asset: asset_name.to_string(),
                message: "download queue closed".to_string(),
            }
        })?;

        let file_name = file_name_for(asset_name);
        let destination = dir.join(file_name);
        let staging = dir.join(format!(".{}.{}.part", file_name, Uuid::new_v4()));

        let transfer = match timeout(
            self.config.download_timeout,
            self.transfer(source, &staging),
        )
        .await
        {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(PlaybackError::TransferFailure {
                asset: asset_name.to_string(),
                message: e.to_string(),
            }),
            Err(_) => Err(PlaybackError::TransferTimedOut {
                asset: asset_name.to_string(),
                timeout: self.config.download_timeout,
            }),
        };

        let bytes = match transfer {
            Ok(bytes) => bytes,
            Err(e) => {
                self.discard_staging(&staging).await;
                return Err(e);
            }
        };

        if let Err(e) = self.fs.rename(&staging, &destination).await {
            self.discard_staging(&staging).await;
            return Err(PlaybackError::InstallFailure {
                asset: asset_name.to_string(),
                message: e.to_string(),
            });
        }

        debug!(bytes, "Installed cache entry");
        Ok(destination)
    }

    /// Stream `source` into `staging`, returning the byte count.
    async fn transfer(
        &self,
        source: &AudioSource,
        staging: &Path,
    ) -> std::result::Result<u64, BridgeError> {
        let mut reader = self.open_source(source).await?;
        let mut writer = self.fs.open_write_stream(staging).await?;

        let bytes = tokio::io::copy(&mut reader, &mut writer).await?;
        writer.shutdown().await?;

        Ok(bytes)
    }

    async fn open_source(
        &self,
        source: &AudioSource,
    ) -> std::result::Result<Box<dyn AsyncRead + Send + Unpin>, BridgeError> {
        match source {
            AudioSource::LocalFile { path } => {
                debug!(file = %strip_path(&path.to_string_lossy()), "Copying bundled file");
                self.fs.open_read_stream(path).await
            }
            AudioSource::RemoteStream { url } => {
                debug!(url = %redact_url(url), "Downloading");
                self.http_client.download_stream(url.clone()).await
            }
        }
    }

    async fn discard_staging(&self, staging: &Path) {
        if let Ok(true) = self.fs.exists(staging).await {
            if let Err(e) = self.fs.delete_file(staging).await {
                warn!(error = %e, "Failed to remove staging file");
            }
        }
    }

    /// Start [`cache_asset`](Self::cache_asset) in the background.
    pub fn spawn_cache_asset(
        self: &Arc<Self>,
        source: AudioSource,
        asset_name: String,
    ) -> JoinHandle<Result<PathBuf>> {
        let cache = Arc::clone(self);
        tokio::spawn(async move { cache.cache_asset(source, &asset_name).await })
    }

    /// Remove every cached file and leave an empty directory behind.
    ///
    /// The old directory is swapped out with a single rename before it is
    /// deleted, so the cache is never observed half-emptied.
    #[instrument(skip(self))]
    pub async fn clear_cache(&self) -> Result<()> {
        let dir = self.directory().await?;

        if self.fs.exists(&dir).await? {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let trash = dir.with_file_name(format!(".{}.{}.trash", name, Uuid::new_v4()));

            self.fs.rename(&dir, &trash).await?;
            self.directory_ready.store(false, Ordering::Release);
            self.fs.create_dir_all(&dir).await?;

            if let Err(e) = self.fs.delete_dir_all(&trash).await {
                warn!(error = %e, "Failed to delete old cache contents");
            }
        } else {
            self.fs.create_dir_all(&dir).await?;
        }

        self.directory_ready.store(true, Ordering::Release);
        info!("Cache cleared");
        let _ = self.event_bus.emit(CoreEvent::Cache(CacheEvent::Cleared));
        Ok(())
    }
}
