use crate::error::ScrapeError;
use crate::models::RawListing;
use crate::scrapers::browser::BrowserSession;
use crate::scrapers::traits::{ExtractionStrategy, ListingScraper};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Browser-based scraper: one fresh Chrome session per scrape, driven by
/// the configured extraction strategy.
pub struct PageScraper {
    session: BrowserSession,
    strategy: Arc<dyn ExtractionStrategy>,
}

impl PageScraper {
    pub fn new(session: BrowserSession, strategy: Arc<dyn ExtractionStrategy>) -> Self {
        Self { session, strategy }
    }
}

#[async_trait]
impl ListingScraper for PageScraper {
    async fn scrape(&self) -> Result<Vec<RawListing>, ScrapeError> {
        info!(
            "Starting browser scrape of {} ({} strategy)",
            self.session.target_url(),
            self.strategy.name()
        );

        let session = self.session.clone();
        let strategy = Arc::clone(&self.strategy);

        // headless_chrome blocks; keep it off the async workers
        let listings =
            tokio::task::spawn_blocking(move || session.run(|page| strategy.extract(page)))
                .await??;

        info!("✅ Scraped {} listings", listings.len());
        Ok(listings)
    }

    fn source_name(&self) -> &'static str {
        self.strategy.name()
    }
}
