//! Now-playing integration.
//!
//! Mirrors engine snapshots into the host [`MediaControls`] surface and routes
//! remote transport commands back into the [`PlaybackEngine`].
//!
//! Handlers live in a table keyed by [`RemoteCommandKind`]. Whenever the
//! loaded track changes the table is cleared and rebuilt in one step, so a
//! command can never reach two handlers.

use crate::engine::{EngineState, PlaybackEngine, PlaybackSnapshot};
use crate::speed::PlaybackSpeed;
use bridge_traits::{CommandStatus, MediaControls, NowPlayingInfo, RemoteCommand, RemoteCommandKind};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Artist shown for every track.
pub const ARTIST: &str = "The Cutting Machinery";

type CommandHandler = Box<dyn Fn(RemoteCommand) -> BoxFuture<'static, CommandStatus> + Send + Sync>;

fn status(ok: bool) -> CommandStatus {
    if ok {
        CommandStatus::Success
    } else {
        CommandStatus::CommandFailed
    }
}

fn handler<F>(f: F) -> CommandHandler
where
    F: Fn(RemoteCommand) -> BoxFuture<'static, CommandStatus> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Build the full set of transport bindings against `engine`.
fn bindings(engine: &Arc<PlaybackEngine>) -> Vec<(RemoteCommandKind, CommandHandler)> {
    let play = Arc::clone(engine);
    let pause = Arc::clone(engine);
    let forward = Arc::clone(engine);
    let backward = Arc::clone(engine);
    let position = Arc::clone(engine);

    vec![
        (
            RemoteCommandKind::Play,
            handler(move |_| {
                let engine = Arc::clone(&play);
                async move { status(engine.play_if_paused().await) }.boxed()
            }),
        ),
        (
            RemoteCommandKind::Pause,
            handler(move |_| {
                let engine = Arc::clone(&pause);
                async move { status(engine.pause_if_playing().await) }.boxed()
            }),
        ),
        (
            RemoteCommandKind::SeekForward,
            handler(move |command| {
                let engine = Arc::clone(&forward);
                async move {
                    match command {
                        RemoteCommand::SeekForward { interval } => {
                            status(engine.skip_forward(interval).await)
                        }
                        _ => CommandStatus::CommandFailed,
                    }
                }
                .boxed()
            }),
        ),
        (
            RemoteCommandKind::SeekBackward,
            handler(move |command| {
                let engine = Arc::clone(&backward);
                async move {
                    match command {
                        RemoteCommand::SeekBackward { interval } => {
                            status(engine.skip_backward(interval).await)
                        }
                        _ => CommandStatus::CommandFailed,
                    }
                }
                .boxed()
            }),
        ),
        (
            RemoteCommandKind::ChangePlaybackPosition,
            handler(move |command| {
                let engine = Arc::clone(&position);
                async move {
                    match command {
                        RemoteCommand::ChangePlaybackPosition { position } => {
                            status(engine.seek_to(position).await)
                        }
                        _ => CommandStatus::CommandFailed,
                    }
                }
                .boxed()
            }),
        ),
    ]
}

/// Fields whose change warrants republishing now-playing info. Position
/// alone does not: the surface extrapolates from the rate.
#[derive(Debug, Clone, PartialEq)]
struct MirrorKey {
    asset_name: Option<String>,
    state: EngineState,
    speed: PlaybackSpeed,
    seek_generation: u64,
    duration: Duration,
}

impl MirrorKey {
    fn of(snapshot: &PlaybackSnapshot) -> Self {
        Self {
            asset_name: snapshot.track.as_ref().map(|t| t.asset_name.clone()),
            state: snapshot.state,
            speed: snapshot.speed,
            seek_generation: snapshot.seek_generation,
            duration: snapshot.duration,
        }
    }
}

/// Now-playing metadata for `snapshot`, or `None` when nothing is loaded.
pub fn now_playing_info(snapshot: &PlaybackSnapshot) -> Option<NowPlayingInfo> {
    let track = snapshot.track.as_ref()?;
    if matches!(snapshot.state, EngineState::Idle | EngineState::Loading) {
        return None;
    }

    Some(NowPlayingInfo {
        title: track.title.clone(),
        artist: ARTIST.to_string(),
        elapsed: snapshot.position,
        duration: snapshot.duration,
        rate: if snapshot.is_playing() {
            snapshot.speed.as_f32()
        } else {
            0.0
        },
    })
}

pub struct NowPlayingIntegration {
    engine: Arc<PlaybackEngine>,
    controls: Arc<dyn MediaControls>,
    handlers: Mutex<HashMap<RemoteCommandKind, CommandHandler>>,
    registrations: AtomicU64,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl NowPlayingIntegration {
    pub fn new(engine: Arc<PlaybackEngine>, controls: Arc<dyn MediaControls>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            controls,
            handlers: Mutex::new(HashMap::new()),
            registrations: AtomicU64::new(0),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        })
    }

    /// Start mirroring engine state. Calling `start` twice does nothing.
    pub async fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }

        let integration = Arc::clone(self);
        let mut snapshots = self.engine.subscribe();
        let cancel = self.cancel.clone();

        *task = Some(tokio::spawn(async move {
            let mut last_track: Option<Option<String>> = None;
            let mut last_key: Option<MirrorKey> = None;

            loop {
                let snapshot = snapshots.borrow_and_update().clone();
                let key = MirrorKey::of(&snapshot);

                if last_track.as_ref() != Some(&key.asset_name) {
                    integration.refresh_handlers(snapshot.track.is_some()).await;
                    last_track = Some(key.asset_name.clone());
                }
                if last_key.as_ref() != Some(&key) {
                    integration.mirror(&snapshot).await;
                    last_key = Some(key);
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = snapshots.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Now-playing mirror stopped");
        }));
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            let _ = task.await;
        }
        self.handlers.lock().await.clear();
        if let Err(e) = self.controls.set_enabled_commands(&[]).await {
            warn!(error = %e, "Failed to disable remote commands");
        }
        if let Err(e) = self.controls.set_now_playing(None).await {
            warn!(error = %e, "Failed to clear now-playing info");
        }
    }

    /// Push `snapshot` to the media surface.
    pub async fn mirror(&self, snapshot: &PlaybackSnapshot) {
        if let Err(e) = self.controls.set_now_playing(now_playing_info(snapshot)).await {
            warn!(error = %e, "Failed to update now-playing info");
        }
    }

    /// Rebuild the handler table: clear, then bind every command if a track
    /// is loaded.
    pub async fn refresh_handlers(&self, track_loaded: bool) {
        let mut handlers = self.handlers.lock().await;
        handlers.clear();

        if track_loaded {
            handlers.extend(bindings(&self.engine));
        }

        let enabled: Vec<RemoteCommandKind> = RemoteCommandKind::ALL
            .into_iter()
            .filter(|kind| handlers.contains_key(kind))
            .collect();
        self.registrations.fetch_add(1, Ordering::Relaxed);
        drop(handlers);

        if let Err(e) = self.controls.set_enabled_commands(&enabled).await {
            warn!(error = %e, "Failed to update remote commands");
        }
        debug!(commands = enabled.len(), "Remote command handlers refreshed");
    }

    /// Number of times the handler table has been rebuilt.
    pub fn registrations(&self) -> u64 {
        self.registrations.load(Ordering::Relaxed)
    }

    /// Number of bound commands.
    pub async fn bound_commands(&self) -> usize {
        self.handlers.lock().await.len()
    }

    /// Dispatch a remote command to its handler.
    pub async fn handle_command(&self, command: RemoteCommand) -> CommandStatus {
        let pending = {
            let handlers = self.handlers.lock().await;
            handlers.get(&command.kind()).map(|handler| handler(command))
        };

        match pending {
            Some(pending) => {
                let result = pending.await;
                debug!(?command, ?result, "Remote command handled");
                result
            }
            None => {
                debug!(?command, "No handler bound");
                CommandStatus::CommandFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::Track;

    fn snapshot(state: EngineState) -> PlaybackSnapshot {
        PlaybackSnapshot {
            state,
            track: Some(Track::new("Posture", "assets/03-Posture.mp3")),
            position: Duration::from_secs(30),
            duration: Duration::from_secs(300),
            speed: PlaybackSpeed::OneAndHalf,
            seek_generation: 0,
        }
    }

    #[test]
    fn test_rate_is_speed_while_playing() {
        let info = now_playing_info(&snapshot(EngineState::Playing)).unwrap();
        assert_eq!(info.title, "Posture");
        assert_eq!(info.artist, ARTIST);
        assert_eq!(info.rate, 1.5);
        assert_eq!(info.elapsed, Duration::from_secs(30));
    }

    #[test]
    fn test_rate_is_zero_while_paused() {
        let info = now_playing_info(&snapshot(EngineState::Paused)).unwrap();
        assert_eq!(info.rate, 0.0);
    }

    #[test]
    fn test_nothing_published_when_unloaded() {
        let mut idle = snapshot(EngineState::Idle);
        assert!(now_playing_info(&idle).is_none());
        idle.track = None;
        idle.state = EngineState::Paused;
        assert!(now_playing_info(&idle).is_none());
    }

    #[test]
    fn test_mirror_key_ignores_position() {
        let a = snapshot(EngineState::Playing);
        let mut b = a.clone();
        b.position = Duration::from_secs(31);
        assert_eq!(MirrorKey::of(&a), MirrorKey::of(&b));

        b.seek_generation = 1;
        assert_ne!(MirrorKey::of(&a), MirrorKey::of(&b));
    }
}
