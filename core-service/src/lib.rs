//! Core service façade and bootstrap.
//!
//! This crate wires host-provided bridge implementations (filesystem, HTTP,
//! settings, resource bundle, playback adapter and the optional lifecycle,
//! network and media surfaces) into the meditation core. Desktop apps
//! typically enable the `desktop-shims` feature, which lets
//! [`CoreConfig`](core_runtime::config::CoreConfig) fill every unset bridge
//! from `bridge-desktop`.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//!
//! let config = CoreConfig::builder().cache_dir("/tmp/meditation").build()?;
//! let core = CoreService::new(config).await?;
//! core.start().await;
//!
//! let track = core.catalog().tracks().next().cloned().unwrap();
//! core.play(&track).await;
//! ```

pub mod advisory;
pub mod error;
pub mod service;

pub use advisory::{OfflineAdvisory, OFFLINE_MESSAGE};
pub use error::{CoreError, Result};
pub use service::CoreService;

pub use core_library::{Catalog, Section, StreakRecord, Track};
pub use core_playback::{EngineState, PlaybackSnapshot, PlaybackSpeed, PrefetchReport};
pub use core_runtime::config::{CoreConfig, CoreConfigBuilder};
pub use core_runtime::events::{CoreEvent, EventBus};
