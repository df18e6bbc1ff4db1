//! OS media-control surface (lock screen, control center, MPRIS).
//!
//! The core pushes now-playing metadata down and advertises which remote
//! transport commands it currently handles. Commands themselves are routed
//! back up by the host through the core's command dispatcher.

use std::time::Duration;

use crate::error::Result;

/// Metadata mirrored into the OS now-playing surface.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingInfo {
    pub title: String,
    pub artist: String,
    pub elapsed: Duration,
    pub duration: Duration,
    /// Effective rate: the playback speed while playing, `0.0` while paused.
    pub rate: f32,
}

/// Remote transport commands a host can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteCommandKind {
    Play,
    Pause,
    SeekForward,
    SeekBackward,
    ChangePlaybackPosition,
}

impl RemoteCommandKind {
    pub const ALL: [RemoteCommandKind; 5] = [
        RemoteCommandKind::Play,
        RemoteCommandKind::Pause,
        RemoteCommandKind::SeekForward,
        RemoteCommandKind::SeekBackward,
        RemoteCommandKind::ChangePlaybackPosition,
    ];
}

/// A remote transport command as delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoteCommand {
    Play,
    Pause,
    /// Skip ahead by `interval`
    SeekForward { interval: Duration },
    /// Skip back by `interval`
    SeekBackward { interval: Duration },
    /// Jump to an absolute position
    ChangePlaybackPosition { position: Duration },
}

impl RemoteCommand {
    pub fn kind(&self) -> RemoteCommandKind {
        match self {
            RemoteCommand::Play => RemoteCommandKind::Play,
            RemoteCommand::Pause => RemoteCommandKind::Pause,
            RemoteCommand::SeekForward { .. } => RemoteCommandKind::SeekForward,
            RemoteCommand::SeekBackward { .. } => RemoteCommandKind::SeekBackward,
            RemoteCommand::ChangePlaybackPosition { .. } => {
                RemoteCommandKind::ChangePlaybackPosition
            }
        }
    }
}

/// Result reported back to the OS for a remote command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    /// The precondition was not met (e.g. pause while already paused).
    CommandFailed,
}

/// Platform now-playing surface
///
/// - **iOS**: `MPNowPlayingInfoCenter` + `MPRemoteCommandCenter`
/// - **Android**: `MediaSession`
/// - **Desktop**: MPRIS / SMTC, or logging only
#[async_trait::async_trait]
pub trait MediaControls: Send + Sync {
    /// Replace the now-playing metadata. `None` clears the surface.
    async fn set_now_playing(&self, info: Option<NowPlayingInfo>) -> Result<()>;

    /// Replace the set of commands the surface should offer.
    ///
    /// An empty slice disables every command.
    async fn set_enabled_commands(&self, commands: &[RemoteCommandKind]) -> Result<()>;
}
