//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with retry
//! - `FileSystemAccess` using `tokio::fs`
//! - `SettingsStore` using SQLite-backed key-value store
//! - `ResourceBundle` from a directory or a static HTTP origin
//! - `NetworkMonitor` using a TCP reachability probe
//! - `LifecycleObserver` driven by the host window (foreground by default)
//! - `BackgroundTaskHost` and `IdleTimer` as in-process bookkeeping
//! - `MediaControls` that log and remember the now-playing state
//! - `PlaybackAdapter`: headless by default, `rodio` output with `audio-output`
//!
//! ## Feature Flags
//!
//! - `audio-output`: play through the default audio device with `rodio`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let fs = TokioFileSystem::new();
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod background;
mod bundle;
mod filesystem;
mod http;
mod media;
mod network;
mod playback;
mod settings;

pub use background::{
    DesktopBackgroundTaskHost, DesktopIdleTimer, DesktopLifecycleObserver, UnsupportedIdleTimer,
};
pub use bundle::{DirectoryBundle, HttpBundle};
pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use media::LoggingMediaControls;
pub use network::DesktopNetworkMonitor;
pub use playback::HeadlessPlaybackAdapter;
#[cfg(feature = "audio-output")]
pub use playback::RodioPlaybackAdapter;
pub use settings::SqliteSettingsStore;
