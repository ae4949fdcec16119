use crate::error::ScrapeError;
use crate::models::RawListing;
use crate::scrapers::browser::PageDriver;
use async_trait::async_trait;

/// Produces raw listings for one refresh.
///
/// The refresh orchestrator only sees this seam, so tests can swap the
/// browser for an in-memory source.
#[async_trait]
pub trait ListingScraper: Send + Sync {
    /// Run one full scrape of the target page
    async fn scrape(&self) -> Result<Vec<RawListing>, ScrapeError>;

    /// Get the name of the scraper source
    fn source_name(&self) -> &'static str;
}

/// One way of reading listings off a loaded page.
///
/// Runs on a blocking worker thread inside a browser session.
pub trait ExtractionStrategy: Send + Sync {
    fn extract(&self, page: &dyn PageDriver) -> Result<Vec<RawListing>, ScrapeError>;

    fn name(&self) -> &'static str;
}
