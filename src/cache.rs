//! Time-windowed outage cache.
//!
//! Serves the last good result set for `ttl`, then refreshes it through the
//! [`OutageSource`]. At most one refresh runs at a time; callers arriving
//! while it is in flight get the current (possibly stale) data immediately.
//! When a refresh fails the stale data is kept, and the demo dataset is only
//! served when nothing has ever been cached.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::data::demo_outages;
use crate::fetcher::OutageSource;
use crate::models::Outage;

/// Last successful result set and when it was stored.
#[derive(Debug, Clone)]
struct Snapshot {
    outages: Arc<Vec<Outage>>,
    refreshed_at: Instant,
}

/// Shared cache state: the snapshot plus the in-flight refresh flag.
#[derive(Debug, Default)]
pub struct CacheState {
    data: RwLock<Option<Snapshot>>,
    refreshing: AtomicBool,
}

impl CacheState {
    /// Claims the refresh flag. `None` if a refresh is already running.
    fn try_begin_refresh(self: &Arc<Self>) -> Option<RefreshGuard> {
        self.refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard(Arc::clone(self)))
    }
}

/// Clears the refresh flag when dropped, so a failed or panicking refresh
/// can't leave the cache wedged.
struct RefreshGuard(Arc<CacheState>);

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.0.refreshing.store(false, Ordering::Release);
    }
}

/// Outage cache in front of an [`OutageSource`]. Cheap to clone.
#[derive(Clone)]
pub struct OutageCache {
    source: Arc<dyn OutageSource>,
    ttl: Duration,
    state: Arc<CacheState>,
}

impl OutageCache {
    pub fn new(source: Arc<dyn OutageSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            state: Arc::new(CacheState::default()),
        }
    }

    /// Returns the current outages. Never fails.
    pub async fn get_outages(&self) -> Arc<Vec<Outage>> {
        let cached = self.state.data.read().await.clone();

        if let Some(outages) = self.fresh(cached.as_ref()) {
            return outages;
        }

        self.refresh_or_fallback(cached).await
    }

    /// The snapshot's outages if it is younger than the TTL.
    fn fresh(&self, cached: Option<&Snapshot>) -> Option<Arc<Vec<Outage>>> {
        let snapshot = cached?;
        let age = snapshot.refreshed_at.elapsed();
        if age >= self.ttl {
            return None;
        }
        debug!(
            "Serving {} cached outages ({}s old)",
            snapshot.outages.len(),
            age.as_secs()
        );
        Some(Arc::clone(&snapshot.outages))
    }

    /// Claims the refresh flag and refreshes, or falls back to `cached` when
    /// another refresh is running.
    async fn refresh_or_fallback(&self, cached: Option<Snapshot>) -> Arc<Vec<Outage>> {
        let Some(guard) = self.state.try_begin_refresh() else {
            debug!("Refresh already in progress, serving current data");
            return Self::fallback(cached);
        };

        // Another refresh may have published between the stale read and the
        // claim above.
        let current = self.state.data.read().await.clone();
        if let Some(outages) = self.fresh(current.as_ref()) {
            return outages;
        }

        // The refresh runs detached so it still publishes its result if the
        // caller that triggered it goes away.
        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);
        let refresh = tokio::spawn(async move {
            let _guard = guard;
            Self::refresh(source.as_ref(), &state).await
        });

        match refresh.await {
            Ok(Some(outages)) => outages,
            Ok(None) => Self::fallback(current),
            Err(e) => {
                error!("Outage refresh task failed: {}", e);
                Self::fallback(current)
            }
        }
    }

    /// Fetches from the source and publishes a non-empty result.
    async fn refresh(source: &dyn OutageSource, state: &CacheState) -> Option<Arc<Vec<Outage>>> {
        info!("Refreshing outages from source");
        match source.fetch_outages().await {
            Ok(outages) if !outages.is_empty() => {
                let outages = Arc::new(outages);
                *state.data.write().await = Some(Snapshot {
                    outages: Arc::clone(&outages),
                    refreshed_at: Instant::now(),
                });
                info!("Cached {} outages", outages.len());
                Some(outages)
            }
            Ok(_) => {
                warn!("Source returned no outages");
                None
            }
            Err(e) => {
                warn!("Failed to fetch outages: {}", e);
                None
            }
        }
    }

    /// Stale data if there is any, demo data otherwise.
    fn fallback(cached: Option<Snapshot>) -> Arc<Vec<Outage>> {
        match cached {
            Some(snapshot) => {
                info!(
                    "Serving stale outages ({}s old)",
                    snapshot.refreshed_at.elapsed().as_secs()
                );
                snapshot.outages
            }
            None => {
                info!("No cached outages, serving demo data");
                Arc::new(demo_outages(Utc::now()))
            }
        }
    }

    /// Whether a refresh is currently running.
    pub fn is_refreshing(&self) -> bool {
        self.state.refreshing.load(Ordering::Acquire)
    }
}
