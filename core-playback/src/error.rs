//! # Playback Error Types
//!
//! Error types for asset caching and playback.
//!
//! Engine operations handle these locally (log and fall back to a safe
//! state); lower-level services return them so callers such as the
//! prefetcher can report why an asset failed.

use bridge_traits::error::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during caching and playback.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Asset is neither cached nor bundled.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    // ========================================================================
    // Cache Errors
    // ========================================================================
    /// Network or I/O error while copying an asset into staging.
    #[error("Transfer of {asset} failed: {message}")]
    TransferFailure { asset: String, message: String },

    /// The transfer did not finish within the download timeout.
    #[error("Transfer of {asset} timed out after {timeout:?}")]
    TransferTimedOut { asset: String, timeout: Duration },

    /// Filesystem error while moving a staged file into place.
    #[error("Installing {asset} into the cache failed: {message}")]
    InstallFailure { asset: String, message: String },

    // ========================================================================
    // Playback Control Errors
    // ========================================================================
    /// The audio resource could not be opened (corrupt file, device busy).
    #[error("Failed to open {asset} for playback: {message}")]
    PlaybackOpenFailure { asset: String, message: String },

    /// Speed outside the allowed set.
    #[error("Invalid playback speed: {0}")]
    InvalidSpeed(f32),

    /// Attempted operation when no track is loaded.
    #[error("No track loaded")]
    NoTrackLoaded,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Reading or writing persisted playback state failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification used in logs and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    ResourceNotFound,
    TransferFailure,
    InstallFailure,
    PlaybackOpenFailure,
    InvalidInput,
    Persistence,
    Platform,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ResourceNotFound => "ResourceNotFound",
            FailureKind::TransferFailure => "TransferFailure",
            FailureKind::InstallFailure => "InstallFailure",
            FailureKind::PlaybackOpenFailure => "PlaybackOpenFailure",
            FailureKind::InvalidInput => "InvalidInput",
            FailureKind::Persistence => "Persistence",
            FailureKind::Platform => "Platform",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PlaybackError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PlaybackError::ResourceNotFound(_) => FailureKind::ResourceNotFound,
            PlaybackError::TransferFailure { .. } | PlaybackError::TransferTimedOut { .. } => {
                FailureKind::TransferFailure
            }
            PlaybackError::InstallFailure { .. } => FailureKind::InstallFailure,
            PlaybackError::PlaybackOpenFailure { .. } => FailureKind::PlaybackOpenFailure,
            PlaybackError::InvalidSpeed(_) | PlaybackError::NoTrackLoaded => {
                FailureKind::InvalidInput
            }
            PlaybackError::Persistence(_) | PlaybackError::Serialization(_) => {
                FailureKind::Persistence
            }
            PlaybackError::Bridge(_) => FailureKind::Platform,
        }
    }

    /// Returns `true` if retrying later (e.g. once back online) may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), FailureKind::TransferFailure)
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
