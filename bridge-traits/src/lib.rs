//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the meditation core and
//! platform-specific implementations. Each trait represents a capability that
//! the core requires but that must be implemented differently per platform
//! (desktop, iOS, Android).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Streaming GET downloads for cache fills
//! - [`FileSystemAccess`](storage::FileSystemAccess) - File I/O and atomic installs
//! - [`ResourceBundle`](resource::ResourceBundle) - Audio shipped with the app
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//!
//! ### Platform Integration
//! - [`NetworkMonitor`](network::NetworkMonitor) - Reachability changes
//! - [`LifecycleObserver`](background::LifecycleObserver) - App foreground/background transitions
//! - [`BackgroundTaskHost`](background::BackgroundTaskHost) - Extended execution grants
//! - [`IdleTimer`](background::IdleTimer) - Keep the device awake during playback
//! - [`PlaybackAdapter`](playback::PlaybackAdapter) - Native audio player
//! - [`MediaControls`](media::MediaControls) - Lock screen / now-playing surface
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | iOS      | TBD                 | 📋 Planned |
//! | Android  | TBD                 | 📋 Planned |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type for consistent
//! error handling. Platform implementations should convert platform-specific
//! errors to `BridgeError` and include context such as file paths or URLs.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks.

pub mod background;
pub mod error;
pub mod http;
pub mod media;
pub mod network;
pub mod playback;
pub mod resource;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use background::{
    BackgroundTaskHost, GrantId, GrantRevocationStream, IdleTimer, LifecycleChangeStream,
    LifecycleObserver, LifecycleState,
};
pub use http::{HttpClient, RetryPolicy};
pub use media::{CommandStatus, MediaControls, NowPlayingInfo, RemoteCommand, RemoteCommandKind};
pub use network::{NetworkChangeStream, NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use playback::{AudioSource, PlaybackAdapter, PlaybackSessionId, PlaybackState, PreparedSession};
pub use resource::ResourceBundle;
pub use storage::{FileSystemAccess, SettingsStore};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
