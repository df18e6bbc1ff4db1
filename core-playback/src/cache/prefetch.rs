//! Bulk prefetch of the whole catalog into the asset cache.

use crate::cache::latch::CountdownLatch;
use crate::cache::manager::AssetCache;
use crate::error::FailureKind;
use core_library::Catalog;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// What happened to one track during a prefetch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrefetchStatus {
    AlreadyCached,
    Cached,
    Failed { kind: FailureKind, message: String },
}

impl PrefetchStatus {
    pub fn is_success(&self) -> bool {
        !matches!(self, PrefetchStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchOutcome {
    pub asset_name: String,
    pub status: PrefetchStatus,
}

/// Aggregate result of [`Prefetcher::prefetch_all`]. Outcomes are in
/// catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefetchReport {
    pub overall_success: bool,
    pub outcomes: Vec<PrefetchOutcome>,
}

impl PrefetchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status.is_success())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

pub struct Prefetcher {
    cache: Arc<AssetCache>,
    event_bus: EventBus,
}

impl Prefetcher {
    pub fn new(cache: Arc<AssetCache>, event_bus: EventBus) -> Self {
        Self { cache, event_bus }
    }

    /// Ensure every track in `catalog` is cached.
    ///
    /// Tracks are processed concurrently (the cache throttles actual
    /// transfers). A track whose bundled resource is missing counts as a
    /// failure without stopping the others. Returns once every track is
    /// accounted for; `overall_success` is `true` only if none failed.
    #[instrument(skip(self, catalog), fields(total = catalog.track_count()))]
    pub async fn prefetch_all(&self, catalog: &Catalog) -> PrefetchReport {
        let assets: Vec<String> = catalog.tracks().map(|t| t.asset_name.clone()).collect();
        let total = assets.len();

        info!("Prefetch started");
        let _ = self
            .event_bus
            .emit(CoreEvent::Cache(CacheEvent::PrefetchStarted { total }));

        let (latch, completion) = CountdownLatch::new(total);
        let results: Arc<Mutex<Vec<(usize, PrefetchOutcome)>>> =
            Arc::new(Mutex::new(Vec::with_capacity(total)));

        for (index, asset_name) in assets.into_iter().enumerate() {
            let cache = Arc::clone(&self.cache);
            let latch = latch.clone();
            let results = Arc::clone(&results);

            tokio::spawn(async move {
                let status = prefetch_one(&cache, &asset_name).await;
                let succeeded = status.is_success();

                if let Ok(mut results) = results.lock() {
                    results.push((index, PrefetchOutcome { asset_name, status }));
                }
                latch.count_down(succeeded);
            });
        }
        drop(latch);

        let overall_success = completion.wait().await;

        let mut results = match results.lock() {
            Ok(mut results) => std::mem::take(&mut *results),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        results.sort_by_key(|(index, _)| *index);

        let report = PrefetchReport {
            overall_success,
            outcomes: results.into_iter().map(|(_, outcome)| outcome).collect(),
        };

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            overall_success,
            "Prefetch finished"
        );
        let _ = self
            .event_bus
            .emit(CoreEvent::Cache(CacheEvent::PrefetchCompleted {
                succeeded: report.succeeded(),
                failed: report.failed(),
                all_succeeded: overall_success,
            }));

        report
    }

    /// Run [`prefetch_all`](Self::prefetch_all) in the background.
    pub fn spawn_prefetch_all(self: &Arc<Self>, catalog: Arc<Catalog>) -> JoinHandle<PrefetchReport> {
        let prefetcher = Arc::clone(self);
        tokio::spawn(async move { prefetcher.prefetch_all(&catalog).await })
    }
}

async fn prefetch_one(cache: &AssetCache, asset_name: &str) -> PrefetchStatus {
    if cache.is_cached(asset_name).await {
        debug!(asset = asset_name, "Already cached");
        return PrefetchStatus::AlreadyCached;
    }

    let source = match cache.bundled_source(asset_name).await {
        Ok(source) => source,
        Err(e) => {
            warn!(asset = asset_name, error = %e, "No bundled resource to prefetch");
            return PrefetchStatus::Failed {
                kind: e.kind(),
                message: e.to_string(),
            };
        }
    };

    match cache.cache_asset(source, asset_name).await {
        Ok(_) => PrefetchStatus::Cached,
        Err(e) => PrefetchStatus::Failed {
            kind: e.kind(),
            message: e.to_string(),
        },
    }
}
