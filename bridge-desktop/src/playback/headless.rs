use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    playback::{AudioSource, PlaybackAdapter, PlaybackSessionId, PlaybackState, PreparedSession},
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::probe_duration;

#[derive(Debug)]
struct VirtualSession {
    duration: Duration,
    /// Position at the moment `started_at` was taken.
    anchor: Duration,
    started_at: Option<Instant>,
    rate: f32,
}

impl VirtualSession {
    fn position(&self) -> Duration {
        let moved = match self.started_at {
            Some(started) => started.elapsed().mul_f32(self.rate),
            None => Duration::ZERO,
        };
        (self.anchor + moved).min(self.duration)
    }

    fn rebase(&mut self) {
        self.anchor = self.position();
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }
}

/// Player that advances a virtual position in real (tokio) time.
///
/// Durations come from the file's metadata; remote sources need a
/// duration supplied up front via [`with_remote_duration`](Self::with_remote_duration).
#[derive(Debug, Default)]
pub struct HeadlessPlaybackAdapter {
    sessions: Mutex<HashMap<PlaybackSessionId, VirtualSession>>,
    remote_duration: Option<Duration>,
}

impl HeadlessPlaybackAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duration to assume for remote streams, which are never fetched.
    pub fn with_remote_duration(mut self, duration: Duration) -> Self {
        self.remote_duration = Some(duration);
        self
    }

    /// Number of sessions currently open.
    pub async fn open_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    async fn with_session<T>(
        &self,
        id: PlaybackSessionId,
        f: impl FnOnce(&mut VirtualSession) -> T,
    ) -> Result<T> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .get_mut(&id)
            .map(f)
            .ok_or_else(|| BridgeError::NotFound(format!("Playback session {:?}", id)))
    }
}

#[async_trait]
impl PlaybackAdapter for HeadlessPlaybackAdapter {
    async fn prepare(&self, source: AudioSource) -> Result<PreparedSession> {
        let duration = match &source {
            AudioSource::LocalFile { path } => probe_duration(path).await?,
            AudioSource::RemoteStream { url } => self.remote_duration.ok_or_else(|| {
                BridgeError::NotAvailable(format!("Headless adapter cannot probe {}", url))
            })?,
        };

        let id = PlaybackSessionId::new();
        self.sessions.lock().await.insert(
            id,
            VirtualSession {
                duration,
                anchor: Duration::ZERO,
                started_at: None,
                rate: 1.0,
            },
        );
        debug!(session = ?id, duration_ms = duration.as_millis() as u64, "Headless session prepared");

        Ok(PreparedSession { id, duration })
    }

    async fn play(&self, session: PlaybackSessionId) -> Result<()> {
        self.with_session(session, |s| {
            if s.started_at.is_none() {
                s.started_at = Some(Instant::now());
            }
        })
        .await
    }

    async fn pause(&self, session: PlaybackSessionId) -> Result<()> {
        self.with_session(session, |s| {
            s.anchor = s.position();
            s.started_at = None;
        })
        .await
    }

    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> Result<()> {
        self.with_session(session, |s| {
            s.anchor = position.min(s.duration);
            if s.started_at.is_some() {
                s.started_at = Some(Instant::now());
            }
        })
        .await
    }

    async fn set_rate(&self, session: PlaybackSessionId, rate: f32) -> Result<()> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(BridgeError::OperationFailed(format!("Invalid rate {}", rate)));
        }
        self.with_session(session, |s| {
            s.rebase();
            s.rate = rate;
        })
        .await
    }

    async fn get_position(&self, session: PlaybackSessionId) -> Result<Duration> {
        self.with_session(session, |s| s.position()).await
    }

    async fn state(&self, session: PlaybackSessionId) -> Result<PlaybackState> {
        self.with_session(session, |s| {
            if s.position() >= s.duration && s.started_at.is_some() {
                PlaybackState::Completed
            } else if s.started_at.is_some() {
                PlaybackState::Playing
            } else {
                PlaybackState::Paused
            }
        })
        .await
    }

    async fn unload(&self, session: PlaybackSessionId) -> Result<()> {
        self.sessions.lock().await.remove(&session);
        debug!(session = ?session, "Headless session unloaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote() -> AudioSource {
        AudioSource::remote("https://cdn.example.com/Hour.mp3")
    }

    #[tokio::test]
    async fn test_remote_without_duration_is_rejected() {
        let adapter = HeadlessPlaybackAdapter::new();
        assert!(adapter.prepare(remote()).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_local_file_is_rejected() {
        let adapter = HeadlessPlaybackAdapter::new();
        let result = adapter
            .prepare(AudioSource::local("/definitely/not/here.mp3"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_advances_with_rate() {
        let adapter = HeadlessPlaybackAdapter::new().with_remote_duration(Duration::from_secs(60));
        let session = adapter.prepare(remote()).await.unwrap();
        assert_eq!(adapter.state(session.id).await.unwrap(), PlaybackState::Paused);

        adapter.set_rate(session.id, 2.0).await.unwrap();
        adapter.play(session.id).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        assert_eq!(
            adapter.get_position(session.id).await.unwrap(),
            Duration::from_secs(10)
        );

        adapter.pause(session.id).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(
            adapter.get_position(session.id).await.unwrap(),
            Duration::from_secs(10)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaching_the_end_completes() {
        let adapter = HeadlessPlaybackAdapter::new().with_remote_duration(Duration::from_secs(3));
        let session = adapter.prepare(remote()).await.unwrap();

        adapter.play(session.id).await.unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;

        assert_eq!(
            adapter.state(session.id).await.unwrap(),
            PlaybackState::Completed
        );
        assert_eq!(
            adapter.get_position(session.id).await.unwrap(),
            Duration::from_secs(3)
        );
    }

    #[tokio::test]
    async fn test_unload_releases_session() {
        let adapter = HeadlessPlaybackAdapter::new().with_remote_duration(Duration::from_secs(3));
        let session = adapter.prepare(remote()).await.unwrap();
        assert_eq!(adapter.open_sessions().await, 1);

        adapter.unload(session.id).await.unwrap();
        assert_eq!(adapter.open_sessions().await, 0);
        assert!(adapter.play(session.id).await.is_err());
    }
}
