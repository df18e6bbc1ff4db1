//! # Library Module
//!
//! The meditation catalog and the streak counter.
//!
//! ## Overview
//!
//! This module provides:
//! - Track and section models keyed by logical asset name
//! - The built-in catalog (three sections, sixteen tracks)
//! - The persisted streak counter

pub mod catalog;
pub mod error;
pub mod models;
pub mod streak;

pub use catalog::Catalog;
pub use error::{LibraryError, Result};
pub use models::{file_name_for, Section, SectionId, Track, TrackId, TrackIdentity};
pub use streak::{StreakCounter, StreakRecord};
