//! Resource bundles for desktop builds.

use async_trait::async_trait;
use bridge_traits::{error::Result, playback::AudioSource, resource::ResourceBundle};
use std::path::PathBuf;
use tracing::debug;

/// Bundle backed by a directory on disk (e.g. `assets/` next to the binary).
#[derive(Debug, Clone)]
pub struct DirectoryBundle {
    root: PathBuf,
}

impl DirectoryBundle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<executable dir>/assets`, falling back to `./assets`.
    pub fn beside_executable() -> Self {
        let root = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("assets")))
            .unwrap_or_else(|| PathBuf::from("assets"));
        Self { root }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[async_trait]
impl ResourceBundle for DirectoryBundle {
    async fn locate(&self, file_name: &str) -> Result<Option<AudioSource>> {
        let path = self.root.join(file_name);
        if tokio::fs::try_exists(&path).await? {
            Ok(Some(AudioSource::local(path)))
        } else {
            debug!(file = file_name, root = ?self.root, "Resource not in bundle");
            Ok(None)
        }
    }
}

/// Bundle served from a static HTTP origin.
///
/// Every name resolves to a URL; whether it exists is only known once it is
/// downloaded.
#[derive(Debug, Clone)]
pub struct HttpBundle {
    base_url: String,
}

impl HttpBundle {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ResourceBundle for HttpBundle {
    async fn locate(&self, file_name: &str) -> Result<Option<AudioSource>> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), file_name);
        Ok(Some(AudioSource::remote(url)))
    }
}
