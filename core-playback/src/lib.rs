//! # Playback & Offline Cache Module
//!
//! The audio side of the meditation core.
//!
//! ## Overview
//!
//! This module handles:
//! - Resolving assets from the offline cache or the app bundle
//! - Atomic cache installs and whole-catalog prefetch
//! - The single-session playback engine and its published state
//! - Mirroring playback into the OS now-playing surface and routing remote
//!   commands back
//! - Keeping the device awake and holding background execution while audio
//!   plays

pub mod background_guard;
pub mod cache;
pub mod engine;
pub mod error;
pub mod now_playing;
pub mod speed;

pub use background_guard::BackgroundGuard;
pub use cache::{AssetCache, AssetLocation, CacheConfig, PrefetchReport, Prefetcher};
pub use engine::{
    format_elapsed, EngineConfig, EngineState, PlaybackEngine, PlaybackSnapshot,
    LAST_PLAYED_KEY, LAST_POSITION_KEY,
};
pub use error::{FailureKind, PlaybackError, Result};
pub use now_playing::{now_playing_info, NowPlayingIntegration, ARTIST};
pub use speed::PlaybackSpeed;
