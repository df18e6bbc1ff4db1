//! Cache configuration

use std::time::Duration;

/// Configuration for the asset cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory name under the platform cache directory (default: `MeditationCache`)
    pub cache_directory: String,

    /// Upper bound on a single transfer (default: 120s)
    pub download_timeout: Duration,

    /// Number of concurrent transfers allowed (default: 4)
    pub max_concurrent_downloads: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_directory: "MeditationCache".to_string(),
            download_timeout: Duration::from_secs(120),
            max_concurrent_downloads: 4,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_max_concurrent_downloads(mut self, count: usize) -> Self {
        self.max_concurrent_downloads = count;
        self
    }

    pub fn with_cache_directory(mut self, dir: impl Into<String>) -> Self {
        self.cache_directory = dir.into();
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_downloads == 0 {
            return Err("max_concurrent_downloads must be at least 1".to_string());
        }

        if self.download_timeout.is_zero() {
            return Err("download_timeout must be greater than 0".to_string());
        }

        if self.cache_directory.is_empty() {
            return Err("cache_directory cannot be empty".to_string());
        }

        Ok(())
    }
}
