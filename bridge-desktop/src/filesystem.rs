//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::FileSystemAccess,
};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const APP_DIR_NAME: &str = "cutting-machinery";

/// Tokio-based file system implementation
///
/// Provides async file I/O operations using:
/// - `tokio::fs` for async operations
/// - `dirs` for the platform cache location
pub struct TokioFileSystem {
    cache_dir: PathBuf,
}

impl TokioFileSystem {
    /// Create a new file system accessor rooted at the platform cache directory
    pub fn new() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR_NAME);

        Self { cache_dir }
    }

    /// Create a new file system accessor with a custom cache directory
    pub fn with_cache_directory(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        Ok(self.cache_dir.clone())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path).await.map_err(Self::map_io_error)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent).await?;
        }

        fs::write(path, data.as_ref())
            .await
            .map_err(Self::map_io_error)?;
        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path)
            .await
            .map_err(Self::map_io_error)?;
        debug!(path = ?path, "Deleted directory");
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        // rename(2) replaces `to` atomically on the same filesystem
        fs::rename(from, to).await.map_err(Self::map_io_error)?;
        debug!(from = ?from, to = ?to, "Renamed file");
        Ok(())
    }

    async fn open_read_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn tokio::io::AsyncRead + Send + Unpin>> {
        let file = fs::File::open(path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, "Opened file for reading");
        Ok(Box::new(file))
    }

    async fn open_write_stream(
        &self,
        path: &Path,
    ) -> Result<Box<dyn tokio::io::AsyncWrite + Send + Unpin>> {
        let file = fs::File::create(path).await.map_err(Self::map_io_error)?;
        debug!(path = ?path, "Opened file for writing");
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_custom_cache_directory() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::with_cache_directory(dir.path().to_path_buf());

        assert_eq!(fs.get_cache_directory().await.unwrap(), dir.path());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::with_cache_directory(dir.path().to_path_buf());
        let test_file = dir.path().join("nested").join("test-file.txt");

        let data = Bytes::from("Hello, World!");
        fs.write_file(&test_file, data.clone()).await.unwrap();

        assert!(fs.exists(&test_file).await.unwrap());
        assert_eq!(fs.read_file(&test_file).await.unwrap(), data);

        fs.delete_file(&test_file).await.unwrap();
        assert!(!fs.exists(&test_file).await.unwrap());
    }

    #[tokio::test]
    async fn test_rename_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::with_cache_directory(dir.path().to_path_buf());
        let staged = dir.path().join(".Hour.mp3.part");
        let dest = dir.path().join("Hour.mp3");

        fs.write_file(&dest, Bytes::from("old")).await.unwrap();
        fs.write_file(&staged, Bytes::from("new")).await.unwrap();
        fs.rename(&staged, &dest).await.unwrap();

        assert!(!fs.exists(&staged).await.unwrap());
        assert_eq!(fs.read_file(&dest).await.unwrap(), Bytes::from("new"));
    }

    #[tokio::test]
    async fn test_streams() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::with_cache_directory(dir.path().to_path_buf());
        let path = dir.path().join("stream.bin");

        let mut writer = fs.open_write_stream(&path).await.unwrap();
        writer.write_all(b"abc").await.unwrap();
        writer.shutdown().await.unwrap();

        let mut reader = fs.open_read_stream(&path).await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"abc");
    }

    #[tokio::test]
    async fn test_delete_dir_all() {
        let dir = tempfile::tempdir().unwrap();
        let fs = TokioFileSystem::with_cache_directory(dir.path().to_path_buf());
        let cache = dir.path().join("MeditationCache");

        fs.write_file(&cache.join("a.mp3"), Bytes::from("a")).await.unwrap();
        fs.delete_dir_all(&cache).await.unwrap();

        assert!(!fs.exists(&cache).await.unwrap());
    }
}
