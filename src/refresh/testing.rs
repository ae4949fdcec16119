//! In-memory scraper used by refresh, scheduler and API tests.

use crate::cache::CacheStore;
use crate::error::ScrapeError;
use crate::geo::{CoordinateResolver, DEFAULT_TOKEN_PREFIX};
use crate::models::{Position, RawListing};
use crate::refresh::{RefreshState, Refresher};
use crate::scrapers::ListingScraper;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Lets a test hold a scrape open: `entered` fires when the scrape starts,
/// the scrape then waits for `release`.
#[derive(Default)]
pub(crate) struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Clone)]
pub(crate) struct FakeScraper {
    listings: Vec<RawListing>,
    /// Per-call results consumed front to back; `listings` once exhausted
    script: Arc<Mutex<VecDeque<Result<Vec<RawListing>, String>>>>,
    always_fail: Option<String>,
    gate: Option<Arc<Gate>>,
    calls: Arc<AtomicUsize>,
}

impl Default for FakeScraper {
    fn default() -> Self {
        Self::returning(Self::sample_listings())
    }
}

impl FakeScraper {
    pub fn returning(listings: Vec<RawListing>) -> Self {
        Self {
            listings,
            script: Arc::new(Mutex::new(VecDeque::new())),
            always_fail: None,
            gate: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            always_fail: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// Succeed once, then fail with `message`.
    pub fn then_fail(self, message: &str) -> Self {
        {
            let mut script = self.script.lock().expect("script lock");
            script.push_back(Ok(self.listings.clone()));
            script.push_back(Err(message.to_string()));
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// One decodable token, one broken token, one address.
    pub fn sample_listings() -> Vec<RawListing> {
        vec![
            RawListing {
                title: "Izba".to_string(),
                price: "6 000 ₽".to_string(),
                image_urls: vec!["https://cdn.example.com/izba.jpg".to_string()],
                position: Position::Token("group_39.70,55.75".to_string()),
            },
            RawListing {
                title: "Loft".to_string(),
                price: "price not found".to_string(),
                image_urls: vec!["https://example.com/placeholder.png".to_string()],
                position: Position::Token("bad,token".to_string()),
            },
            RawListing {
                title: "Dacha".to_string(),
                price: "2 500 ₽".to_string(),
                image_urls: vec!["https://cdn.example.com/dacha.jpg".to_string()],
                position: Position::Address("Tula, Lenina 2".to_string()),
            },
        ]
    }
}

#[async_trait]
impl ListingScraper for FakeScraper {
    async fn scrape(&self) -> Result<Vec<RawListing>, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        if let Some(message) = &self.always_fail {
            return Err(ScrapeError::Session(message.clone()));
        }

        let scripted = self.script.lock().expect("script lock").pop_front();
        match scripted {
            Some(Ok(listings)) => Ok(listings),
            Some(Err(message)) => Err(ScrapeError::Session(message)),
            None => Ok(self.listings.clone()),
        }
    }

    fn source_name(&self) -> &'static str {
        "fake"
    }
}

/// A scraper that blocks inside `scrape` until the gate is released.
pub(crate) fn gated_scraper() -> (FakeScraper, Arc<Gate>) {
    let gate = Arc::new(Gate::default());
    let scraper = FakeScraper {
        gate: Some(Arc::clone(&gate)),
        ..FakeScraper::default()
    };
    (scraper, gate)
}

/// Refresher without a geocoder, plus the cache it writes to.
pub(crate) fn refresher_with(scraper: FakeScraper) -> (Refresher, Arc<CacheStore>) {
    let cache = Arc::new(CacheStore::new());
    let refresher = Refresher::new(
        Arc::new(scraper),
        CoordinateResolver::new(None, DEFAULT_TOKEN_PREFIX),
        Arc::clone(&cache),
        Arc::new(RefreshState::new()),
    );
    (refresher, cache)
}
