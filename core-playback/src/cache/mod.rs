//! # Offline Cache Module
//!
//! Presence-based caching of the catalog's audio assets.
//!
//! ## Overview
//!
//! - [`AssetCache`] resolves an asset name to a cached file or a bundled
//!   resource and installs cache entries atomically
//! - [`Prefetcher`] walks the catalog and caches everything that is missing,
//!   aggregating results with a [`CountdownLatch`]
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     AssetCache                         │
//! │  - resolve()                           │
//! │  - is_cached()                         │
//! │  - cache_asset()                       │
//! │  - clear_cache()                       │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> FileSystemAccess (staging + rename)
//!          ├──> HttpClient (remote sources)
//!          └──> ResourceBundle (bundled sources)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_playback::cache::{AssetCache, Prefetcher};
//!
//! # async fn example(cache: std::sync::Arc<AssetCache>, catalog: &core_library::Catalog) {
//! let location = cache.resolve("assets/Hour.mp3").await;
//!
//! let prefetcher = Prefetcher::new(cache.clone(), core_runtime::events::EventBus::default());
//! let report = prefetcher.prefetch_all(catalog).await;
//! if !report.overall_success {
//!     println!("{} tracks still missing", report.failed());
//! }
//! # }
//! ```

pub mod config;
pub mod latch;
pub mod manager;
pub mod prefetch;

pub use config::CacheConfig;
pub use latch::{CountdownLatch, LatchCompletion};
pub use manager::{AssetCache, AssetLocation};
pub use prefetch::{PrefetchOutcome, PrefetchReport, PrefetchStatus, Prefetcher};
