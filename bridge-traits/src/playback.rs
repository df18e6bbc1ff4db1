//! Playback bridge traits and supporting audio types.
//!
//! These abstractions allow the core playback engine to drive
//! platform-specific audio players while preserving a consistent,
//! async-first API surface. Host applications provide a concrete
//! [`PlaybackAdapter`] that satisfies their platform constraints.

use crate::error::Result;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Location of playable audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Local file accessible to the host runtime.
    LocalFile { path: PathBuf },
    /// Remote HTTP(S) resource to be fetched by the host.
    RemoteStream { url: String },
}

impl AudioSource {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        AudioSource::LocalFile { path: path.into() }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        AudioSource::RemoteStream { url: url.into() }
    }

    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, AudioSource::RemoteStream { .. })
    }
}

/// Unique identifier for playback sessions managed by a host adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackSessionId(Uuid);

impl PlaybackSessionId {
    /// Generate a new session identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Construct an identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PlaybackSessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Playback lifecycle state as reported by the adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Preparing,
    Playing,
    Paused,
    /// The stream reached its natural end.
    Completed,
    Error { message: String },
}

/// A session that has been opened and is ready to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedSession {
    pub id: PlaybackSessionId,
    /// Total duration of the stream.
    pub duration: Duration,
}

/// Trait for platform-specific playback adapters that drive native audio players.
///
/// Sessions start paused at position zero after [`prepare`](PlaybackAdapter::prepare).
#[async_trait::async_trait]
pub trait PlaybackAdapter: Send + Sync {
    /// Open the audio resource. Implementations may allocate native
    /// resources, configure routes, or decode headers.
    async fn prepare(&self, source: AudioSource) -> Result<PreparedSession>;

    /// Begin or resume playback for the provided session.
    async fn play(&self, session: PlaybackSessionId) -> Result<()>;

    /// Pause playback without releasing the session.
    async fn pause(&self, session: PlaybackSessionId) -> Result<()>;

    /// Seek to an absolute position within the stream.
    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> Result<()>;

    /// Change the playback rate (1.0 = normal speed).
    async fn set_rate(&self, session: PlaybackSessionId, rate: f32) -> Result<()>;

    /// Query the current playback position.
    async fn get_position(&self, session: PlaybackSessionId) -> Result<Duration>;

    /// Fetch the adapter's current understanding of the session state.
    async fn state(&self, session: PlaybackSessionId) -> Result<PlaybackState>;

    /// Release resources associated with a playback session.
    async fn unload(&self, session: PlaybackSessionId) -> Result<()>;
}
