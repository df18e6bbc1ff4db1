//! # Event Bus System
//!
//! Provides an event-driven architecture for the meditation core using
//! `tokio::sync::broadcast`. Core modules publish typed events; host UIs and
//! other modules subscribe independently.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   emit    ┌───────────┐
//! │ Playback      ├──────────>│           │   subscribe   ┌────────────┐
//! └───────────────┘           │           ├──────────────>│ Host UI    │
//! ┌───────────────┐   emit    │ EventBus  │               └────────────┘
//! │ Asset cache   ├──────────>│ (broadcast│
//! └───────────────┘           │  channel) │   subscribe   ┌────────────┐
//! ┌───────────────┐   emit    │           ├──────────────>│ Subscriber │
//! │ Connectivity  ├──────────>│           │               └────────────┘
//! └───────────────┘           └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Cache(CacheEvent::AssetCached {
//!         asset_name: "Hour.mp3".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Cache(_)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep
//!   receiving.
//! - **`RecvError::Closed`**: every sender is gone; treat as shutdown.
//!
//! `emit` fails only when nobody is subscribed, which publishers ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Position ticks arrive twice a second while playing, so the buffer leaves
/// room for a UI that is briefly busy.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    Cache(CacheEvent),
    Connectivity(ConnectivityEvent),
    Streak(StreakEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
            CoreEvent::Connectivity(e) => e.description(),
            CoreEvent::Streak(e) => e.description(),
        }
    }

    /// Returns the severity level of the event, for log routing.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Cache(CacheEvent::AssetFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::PrefetchCompleted { all_succeeded: false, .. }) => {
                EventSeverity::Warning
            }
            CoreEvent::Connectivity(ConnectivityEvent::WentOffline) => EventSeverity::Warning,
            CoreEvent::Cache(CacheEvent::PrefetchCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Cache(CacheEvent::Cleared) => EventSeverity::Info,
            CoreEvent::Connectivity(ConnectivityEvent::CameOnline) => EventSeverity::Info,
            CoreEvent::Playback(PlaybackEvent::TrackLoaded { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A track was opened and is ready (paused at its start).
    TrackLoaded {
        title: String,
        asset_name: String,
        duration_ms: u64,
    },
    Started {
        title: String,
        position_ms: u64,
    },
    Paused {
        title: String,
        position_ms: u64,
    },
    /// The track reached its natural end and is parked paused at the end.
    Finished {
        title: String,
    },
    /// Emitted by the position tick while playing.
    PositionChanged {
        position_ms: u64,
        duration_ms: u64,
    },
    SpeedChanged {
        rate: f32,
    },
    /// Playback was torn down; the engine is idle.
    Stopped {
        title: String,
        position_ms: u64,
    },
    Error {
        title: Option<String>,
        message: String,
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackLoaded { .. } => "Track loaded",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Finished { .. } => "Track finished",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::SpeedChanged { .. } => "Playback speed changed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    AssetCached {
        asset_name: String,
    },
    AssetFailed {
        asset_name: String,
        /// One of `ResourceNotFound`, `TransferFailure`, `InstallFailure`
        kind: String,
        message: String,
    },
    PrefetchStarted {
        total: usize,
    },
    PrefetchCompleted {
        succeeded: usize,
        failed: usize,
        all_succeeded: bool,
    },
    Cleared,
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::AssetCached { .. } => "Asset cached",
            CacheEvent::AssetFailed { .. } => "Asset caching failed",
            CacheEvent::PrefetchStarted { .. } => "Prefetch started",
            CacheEvent::PrefetchCompleted { .. } => "Prefetch completed",
            CacheEvent::Cleared => "Cache cleared",
        }
    }
}

// ============================================================================
// Connectivity Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConnectivityEvent {
    WentOffline,
    CameOnline,
    /// The host should show the advisory text until `AdvisoryHidden`.
    AdvisoryShown {
        message: String,
    },
    AdvisoryHidden,
}

impl ConnectivityEvent {
    fn description(&self) -> &str {
        match self {
            ConnectivityEvent::WentOffline => "Network lost",
            ConnectivityEvent::CameOnline => "Network restored",
            ConnectivityEvent::AdvisoryShown { .. } => "Offline advisory shown",
            ConnectivityEvent::AdvisoryHidden => "Offline advisory hidden",
        }
    }
}

// ============================================================================
// Streak Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum StreakEvent {
    Changed {
        days: i64,
        /// RFC 3339 timestamp of the change
        last_updated: String,
    },
}

impl StreakEvent {
    fn description(&self) -> &str {
        match self {
            StreakEvent::Changed { .. } => "Streak changed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A receiver with an optional predicate applied before delivery.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only deliver events matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. `None` when nothing matching is queued.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
