use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    playback::{AudioSource, PlaybackAdapter, PlaybackSessionId, PlaybackState, PreparedSession},
};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use super::probe_duration_blocking;

type Reply<T> = oneshot::Sender<Result<T>>;

enum AudioCommand {
    Prepare(PathBuf, Reply<PreparedSession>),
    Play(PlaybackSessionId, Reply<()>),
    Pause(PlaybackSessionId, Reply<()>),
    Seek(PlaybackSessionId, Duration, Reply<()>),
    SetRate(PlaybackSessionId, f32, Reply<()>),
    Position(PlaybackSessionId, Reply<Duration>),
    State(PlaybackSessionId, Reply<PlaybackState>),
    Unload(PlaybackSessionId, Reply<()>),
}

struct SinkEntry {
    sink: Sink,
    duration: Duration,
}

/// Plays through the default output device with `rodio`.
///
/// `OutputStream` is not `Send`, so the stream and every `Sink` live on a
/// dedicated thread; async calls are forwarded to it as commands.
pub struct RodioPlaybackAdapter {
    commands: mpsc::Sender<AudioCommand>,
}

impl RodioPlaybackAdapter {
    /// Open the default output device.
    pub fn new() -> Result<Self> {
        let (commands, rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match OutputStreamBuilder::open_default_stream() {
                Ok(mut stream) => {
                    stream.log_on_drop(false);
                    let _ = ready_tx.send(Ok(()));
                    run_audio_thread(&stream, rx);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })
            .map_err(BridgeError::Io)?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { commands }),
            Ok(Err(message)) => Err(BridgeError::NotAvailable(format!(
                "No audio output device: {}",
                message
            ))),
            Err(_) => Err(BridgeError::NotAvailable(
                "Audio thread exited during startup".to_string(),
            )),
        }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> AudioCommand) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| BridgeError::NotAvailable("Audio thread stopped".to_string()))?;
        rx.await
            .map_err(|_| BridgeError::NotAvailable("Audio thread dropped request".to_string()))?
    }
}

fn run_audio_thread(stream: &OutputStream, rx: mpsc::Receiver<AudioCommand>) {
    let mut sinks: HashMap<PlaybackSessionId, SinkEntry> = HashMap::new();

    while let Ok(command) = rx.recv() {
        match command {
            AudioCommand::Prepare(path, reply) => {
                let result = open_sink(stream, &path).map(|entry| {
                    let id = PlaybackSessionId::new();
                    let prepared = PreparedSession {
                        id,
                        duration: entry.duration,
                    };
                    sinks.insert(id, entry);
                    prepared
                });
                if let Err(e) = &result {
                    error!(path = ?path, error = %e, "Failed to open audio file");
                }
                let _ = reply.send(result);
            }
            AudioCommand::Play(id, reply) => {
                let _ = reply.send(with_sink(&sinks, id, |e| e.sink.play()));
            }
            AudioCommand::Pause(id, reply) => {
                let _ = reply.send(with_sink(&sinks, id, |e| e.sink.pause()));
            }
            AudioCommand::Seek(id, position, reply) => {
                let result = with_sink(&sinks, id, |e| {
                    e.sink
                        .try_seek(position.min(e.duration))
                        .map_err(|err| BridgeError::OperationFailed(format!("Seek failed: {}", err)))
                })
                .and_then(|r| r);
                let _ = reply.send(result);
            }
            AudioCommand::SetRate(id, rate, reply) => {
                let _ = reply.send(with_sink(&sinks, id, |e| e.sink.set_speed(rate)));
            }
            AudioCommand::Position(id, reply) => {
                let _ = reply.send(with_sink(&sinks, id, |e| e.sink.get_pos().min(e.duration)));
            }
            AudioCommand::State(id, reply) => {
                let _ = reply.send(with_sink(&sinks, id, |e| {
                    if e.sink.empty() {
                        PlaybackState::Completed
                    } else if e.sink.is_paused() {
                        PlaybackState::Paused
                    } else {
                        PlaybackState::Playing
                    }
                }));
            }
            AudioCommand::Unload(id, reply) => {
                if let Some(entry) = sinks.remove(&id) {
                    entry.sink.stop();
                    debug!(session = ?id, "Sink released");
                }
                let _ = reply.send(Ok(()));
            }
        }
    }

    debug!("Audio command channel closed; stopping output thread");
}

fn open_sink(stream: &OutputStream, path: &Path) -> Result<SinkEntry> {
    let file = File::open(path)?;
    let source = Decoder::new(BufReader::new(file)).map_err(|e| {
        BridgeError::OperationFailed(format!("Cannot decode {}: {}", path.display(), e))
    })?;

    let duration = match source.total_duration() {
        Some(duration) => duration,
        None => probe_duration_blocking(path).unwrap_or_else(|e| {
            warn!(path = ?path, error = %e, "Duration unknown");
            Duration::ZERO
        }),
    };

    let sink = Sink::connect_new(stream.mixer());
    sink.append(source);
    sink.pause();

    Ok(SinkEntry { sink, duration })
}

fn with_sink<T>(
    sinks: &HashMap<PlaybackSessionId, SinkEntry>,
    id: PlaybackSessionId,
    f: impl FnOnce(&SinkEntry) -> T,
) -> Result<T> {
    sinks
        .get(&id)
        .map(f)
        .ok_or_else(|| BridgeError::NotFound(format!("Playback session {:?}", id)))
}

#[async_trait]
impl PlaybackAdapter for RodioPlaybackAdapter {
    async fn prepare(&self, source: AudioSource) -> Result<PreparedSession> {
        match source {
            AudioSource::LocalFile { path } => {
                self.request(|reply| AudioCommand::Prepare(path, reply)).await
            }
            AudioSource::RemoteStream { url } => Err(BridgeError::NotAvailable(format!(
                "Streaming playback is not supported; cache {} first",
                url
            ))),
        }
    }

    async fn play(&self, session: PlaybackSessionId) -> Result<()> {
        self.request(|reply| AudioCommand::Play(session, reply)).await
    }

    async fn pause(&self, session: PlaybackSessionId) -> Result<()> {
        self.request(|reply| AudioCommand::Pause(session, reply)).await
    }

    async fn seek(&self, session: PlaybackSessionId, position: Duration) -> Result<()> {
        self.request(|reply| AudioCommand::Seek(session, position, reply))
            .await
    }

    async fn set_rate(&self, session: PlaybackSessionId, rate: f32) -> Result<()> {
        self.request(|reply| AudioCommand::SetRate(session, rate, reply))
            .await
    }

    async fn get_position(&self, session: PlaybackSessionId) -> Result<Duration> {
        self.request(|reply| AudioCommand::Position(session, reply))
            .await
    }

    async fn state(&self, session: PlaybackSessionId) -> Result<PlaybackState> {
        self.request(|reply| AudioCommand::State(session, reply)).await
    }

    async fn unload(&self, session: PlaybackSessionId) -> Result<()> {
        self.request(|reply| AudioCommand::Unload(session, reply)).await
    }
}
