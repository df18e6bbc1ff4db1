//! Now-playing surface for desktop.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    media::{MediaControls, NowPlayingInfo, RemoteCommandKind},
};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Media controls that log and remember what the core publishes.
///
/// Desktop shells can poll [`now_playing`](Self::now_playing) to render a
/// mini player or forward the data to MPRIS/SMTC.
#[derive(Debug, Default)]
pub struct LoggingMediaControls {
    now_playing: RwLock<Option<NowPlayingInfo>>,
    commands: RwLock<Vec<RemoteCommandKind>>,
}

impl LoggingMediaControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn now_playing(&self) -> Option<NowPlayingInfo> {
        self.now_playing.read().await.clone()
    }

    pub async fn enabled_commands(&self) -> Vec<RemoteCommandKind> {
        self.commands.read().await.clone()
    }
}

#[async_trait]
impl MediaControls for LoggingMediaControls {
    async fn set_now_playing(&self, info: Option<NowPlayingInfo>) -> Result<()> {
        match &info {
            Some(np) => debug!(
                title = %np.title,
                elapsed_ms = np.elapsed.as_millis() as u64,
                duration_ms = np.duration.as_millis() as u64,
                rate = np.rate,
                "Now playing updated"
            ),
            None => info!("Now playing cleared"),
        }
        *self.now_playing.write().await = info;
        Ok(())
    }

    async fn set_enabled_commands(&self, commands: &[RemoteCommandKind]) -> Result<()> {
        debug!(?commands, "Remote commands updated");
        *self.commands.write().await = commands.to_vec();
        Ok(())
    }
}
