//! Domain models for the meditation catalog
//!
//! Tracks and sections are immutable once built. A track is keyed by its
//! logical asset name (`assets/Hour.mp3`), which is independent of where the
//! audio actually lives.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Logical prefix of every asset name in the catalog.
pub const ASSET_PREFIX: &str = "assets/";

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionId(pub Uuid);

impl SectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// A single meditation recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: TrackId,
    /// Display title
    pub title: String,
    /// Stable logical key, e.g. `assets/01-App-Intro.mp3`
    pub asset_name: String,
}

impl Track {
    pub fn new(title: impl Into<String>, asset_name: impl Into<String>) -> Self {
        Self {
            id: TrackId::new(),
            title: title.into(),
            asset_name: asset_name.into(),
        }
    }

    /// File name used in the cache directory and the resource bundle.
    pub fn file_name(&self) -> &str {
        file_name_for(&self.asset_name)
    }

    /// The persisted identity of this track.
    pub fn identity(&self) -> TrackIdentity {
        TrackIdentity {
            title: self.title.clone(),
            asset_name: self.asset_name.clone(),
        }
    }

    /// Validate track data
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Track title cannot be empty".to_string());
        }

        let file_name = self.file_name();
        if file_name.is_empty() {
            return Err(format!("Asset name '{}' has no file name", self.asset_name));
        }

        if file_name.contains(['/', '\\']) || file_name == ".." {
            return Err(format!(
                "Asset name '{}' must name a single file",
                self.asset_name
            ));
        }

        Ok(())
    }
}

/// Strip the logical `assets/` prefix from an asset name.
///
/// ```
/// use core_library::models::file_name_for;
///
/// assert_eq!(file_name_for("assets/Hour.mp3"), "Hour.mp3");
/// assert_eq!(file_name_for("Hour.mp3"), "Hour.mp3");
/// ```
pub fn file_name_for(asset_name: &str) -> &str {
    asset_name.strip_prefix(ASSET_PREFIX).unwrap_or(asset_name)
}

/// Title and asset name of a track, as written to the settings store.
///
/// Serialized as `{"title": ..., "assetName": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackIdentity {
    pub title: String,
    pub asset_name: String,
}

impl TrackIdentity {
    /// Rebuild a track from a persisted identity that is no longer in the
    /// catalog.
    pub fn into_track(self) -> Track {
        Track::new(self.title, self.asset_name)
    }
}

/// An ordered group of tracks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: SectionId,
    pub title: String,
    /// Display order is significant
    pub tracks: Vec<Track>,
}

impl Section {
    pub fn new(title: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self {
            id: SectionId::new(),
            title: title.into(),
            tracks,
        }
    }

    /// Validate section data
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Section title cannot be empty".to_string());
        }

        for track in &self.tracks {
            track
                .validate()
                .map_err(|e| format!("Section '{}': {}", self.title, e))?;
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
