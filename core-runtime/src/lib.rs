//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the meditation core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//! - Connectivity observation
//!
//! Other crates depend on this one for the async patterns, logging
//! conventions and event broadcasting used throughout the system.

pub mod config;
pub mod connectivity;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
