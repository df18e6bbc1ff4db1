//! The fixed catalog of sections and tracks.

use crate::error::{LibraryError, Result};
use crate::models::{Section, Track};
use std::collections::HashSet;

/// Ordered, immutable set of sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    sections: Vec<Section>,
}

impl Catalog {
    /// Build a catalog, rejecting invalid entries and duplicate cache file
    /// names (two asset names that would land on the same file).
    pub fn new(sections: Vec<Section>) -> Result<Self> {
        let mut seen = HashSet::new();

        for section in &sections {
            section.validate().map_err(|message| LibraryError::InvalidInput {
                field: "section".to_string(),
                message,
            })?;

            for track in &section.tracks {
                if !seen.insert(track.file_name().to_string()) {
                    return Err(LibraryError::InvalidInput {
                        field: "asset_name".to_string(),
                        message: format!("Duplicate asset '{}'", track.asset_name),
                    });
                }
            }
        }

        Ok(Self { sections })
    }

    pub fn empty() -> Self {
        Self {
            sections: Vec::new(),
        }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Every track in display order.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.sections.iter().flat_map(|section| section.tracks.iter())
    }

    pub fn track_count(&self) -> usize {
        self.sections.iter().map(|section| section.tracks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.track_count() == 0
    }

    pub fn find_by_asset_name(&self, asset_name: &str) -> Option<&Track> {
        self.tracks().find(|track| track.asset_name == asset_name)
    }

    /// The catalog shipped with the app.
    pub fn builtin() -> Self {
        Self {
            sections: vec![
                Section::new(
                    "Cutting Machinery Hour",
                    vec![Track::new("Cutting Machinery Hour", "assets/Hour.mp3")],
                ),
                Section::new(
                    "Earlier Talks",
                    vec![
                        Track::new("App Intro", "assets/01-App-Intro.mp3"),
                        Track::new("Pre-Flight", "assets/02-Pre-Flight.mp3"),
                        Track::new("Posture", "assets/03-Posture.mp3"),
                        Track::new("What's It All For", "assets/04-Whats-It-All-For.mp3"),
                        Track::new("How to Meditate", "assets/05-How-to-Meditate.mp3"),
                        Track::new("Why these Phases", "assets/06-Why-these-Phases.mp3"),
                        Track::new("Vinay and Lineage", "assets/07-Vinay-and-Lineage.mp3"),
                        Track::new("Bad Session Guide", "assets/08-Bad-Session-Guide.mp3"),
                        Track::new("Progress Guide", "assets/09-Progress-Guide.mp3"),
                        Track::new("Can't Meditate", "assets/10-Cant-Meditate.mp3"),
                    ],
                ),
                Section::new(
                    "Intermediate Talks",
                    vec![
                        Track::new("Nothing's Happening", "assets/42-Nothings-Happening.mp3"),
                        Track::new("Synchronicity and Magic", "assets/43-Sync-and-Magic.mp3"),
                        Track::new("Depression and Anger", "assets/44-Depression-and-Anger.mp3"),
                        Track::new("Reality and Meta-Reality", "assets/45-Reality-and-Meta.mp3"),
                        Track::new("Fun Stuff", "assets/46-Fun-Stuff.mp3"),
                    ],
                ),
            ],
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
