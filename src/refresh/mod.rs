//! Refresh orchestration.
//!
//! A refresh moves `Idle -> Running -> (Committed | Failed) -> Idle`. Only a
//! committed refresh touches the cache; a failed one leaves the previous
//! snapshot in place and waits for the next trigger.

mod scheduler;
#[cfg(test)]
pub(crate) mod testing;

pub use scheduler::{spawn_scheduler, SchedulerHandle};

use crate::cache::CacheStore;
use crate::error::ScrapeError;
use crate::geo::CoordinateResolver;
use crate::models::{Listing, Snapshot};
use crate::scrapers::ListingScraper;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

/// What started a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Scheduled,
    Manual,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Committed {
        count: usize,
        fetched_at: DateTime<Utc>,
    },
    /// Another refresh held the single-flight slot; nothing was started
    AlreadyRunning,
}

/// Process-wide refresh bookkeeping
#[derive(Debug, Default)]
pub struct RefreshState {
    running: AtomicBool,
    last_attempt: Mutex<Option<DateTime<Utc>>>,
    last_error: Mutex<Option<String>>,
}

impl RefreshState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn last_attempt(&self) -> Option<DateTime<Utc>> {
        *self.last_attempt.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Error of the most recent attempt, cleared by the next commit.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Claim the single-flight slot. `None` while another refresh runs.
    fn try_begin(&self) -> Option<RunningGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunningGuard { state: self })
    }

    fn record_attempt(&self, at: DateTime<Utc>) {
        *self.last_attempt.lock().unwrap_or_else(PoisonError::into_inner) = Some(at);
    }

    fn record_result(&self, error: Option<String>) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = error;
    }
}

/// Releases the single-flight slot on every exit path, panics included.
struct RunningGuard<'a> {
    state: &'a RefreshState,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.state.running.store(false, Ordering::Release);
    }
}

/// Runs the scrape → resolve → commit pipeline. The only writer of the cache.
pub struct Refresher {
    scraper: Arc<dyn ListingScraper>,
    resolver: CoordinateResolver,
    cache: Arc<CacheStore>,
    state: Arc<RefreshState>,
}

impl Refresher {
    pub fn new(
        scraper: Arc<dyn ListingScraper>,
        resolver: CoordinateResolver,
        cache: Arc<CacheStore>,
        state: Arc<RefreshState>,
    ) -> Self {
        Self {
            scraper,
            resolver,
            cache,
            state,
        }
    }

    pub fn state(&self) -> &Arc<RefreshState> {
        &self.state
    }

    /// Run one refresh unless one is already in flight.
    ///
    /// # Errors
    ///
    /// Returns the pipeline error after logging it; the cache is untouched.
    pub async fn run(&self, trigger: Trigger) -> Result<RefreshOutcome, ScrapeError> {
        let Some(_running) = self.state.try_begin() else {
            info!("Refresh already running; ignoring {:?} trigger", trigger);
            return Ok(RefreshOutcome::AlreadyRunning);
        };

        self.state.record_attempt(Utc::now());
        info!(
            "🔄 Refresh started ({:?}) from {}",
            trigger,
            self.scraper.source_name()
        );

        match self.build_listings().await {
            Ok(listings) => {
                let count = listings.len();
                let fetched_at = self.next_fetch_time();
                self.cache.write(Snapshot::new(listings, fetched_at));
                self.state.record_result(None);

                info!(
                    "✅ Refresh committed {} listings at {}",
                    count,
                    fetched_at.to_rfc3339()
                );
                Ok(RefreshOutcome::Committed { count, fetched_at })
            }
            Err(e) => {
                error!(error = %e, "Refresh failed; keeping previous snapshot");
                self.state.record_result(Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn build_listings(&self) -> Result<Vec<Listing>, ScrapeError> {
        let raw = self.scraper.scrape().await?;
        let coords = self.resolver.resolve_all(&raw).await;

        Ok(raw
            .into_iter()
            .zip(coords)
            .enumerate()
            .map(|(index, (raw, coords))| Listing::from_raw(index, raw, coords))
            .collect())
    }

    /// Commit time, strictly later than the snapshot it replaces.
    fn next_fetch_time(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.cache.read().fetched_at {
            Some(previous) if now <= previous => previous + chrono::Duration::microseconds(1),
            _ => now,
        }
    }
}
