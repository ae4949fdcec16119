use crate::error::ScrapeError;
use crate::models::{Position, RawListing};
use crate::scrapers::browser::PageDriver;
use crate::scrapers::fields::{all_matches, closest};
use crate::scrapers::strategy::ExtractContext;
use crate::scrapers::traits::ExtractionStrategy;
use crate::scrapers::types::css_list;
use scraper::Html;
use tracing::{debug, info, warn};

/// Enumerates map markers and reads each marker's card plus its position token.
///
/// A marker belongs to the nearest enclosing card. Markers whose card has
/// not rendered are retried by re-reading the page after a settle delay;
/// those still unresolved after the last attempt are skipped.
pub struct MarkerTokenStrategy {
    ctx: ExtractContext,
}

impl MarkerTokenStrategy {
    pub fn new(ctx: ExtractContext) -> Self {
        Self { ctx }
    }

    /// One pass over the document; `None` marks a marker without a card.
    fn collect(&self, html: &str) -> Vec<Option<RawListing>> {
        let document = Html::parse_document(html);
        let reader = self.ctx.reader();
        let rules = &self.ctx.rules;

        all_matches(document.root_element(), &rules.marker)
            .into_iter()
            .map(|marker| {
                let card = closest(marker, &rules.card)?;
                let fields = reader.read(card);
                let position = reader
                    .token(marker)
                    .map(Position::Token)
                    .or_else(|| reader.address(card).map(Position::Address))
                    .unwrap_or(Position::Unknown);

                Some(RawListing {
                    title: fields.title,
                    price: fields.price,
                    image_urls: fields.image_urls,
                    position,
                })
            })
            .collect()
    }
}

impl ExtractionStrategy for MarkerTokenStrategy {
    fn extract(&self, page: &dyn PageDriver) -> Result<Vec<RawListing>, ScrapeError> {
        let markers_css = css_list(&self.ctx.rules.raw.marker);
        page.wait_for_selector(&markers_css, self.ctx.timings.element_timeout)?;

        let attempts = self.ctx.timings.marker_retries + 1;
        let mut attempt = 1;

        let resolved = loop {
            let resolved = self.collect(&page.content()?);

            let unresolved = resolved.iter().filter(|r| r.is_none()).count();
            if unresolved == 0 || attempt >= attempts {
                break resolved;
            }
            debug!(
                "{} of {} markers have no card yet (attempt {}/{})",
                unresolved,
                resolved.len(),
                attempt,
                attempts
            );
            page.pause(self.ctx.timings.settle_delay);
            attempt += 1;
        };

        let total = resolved.len();
        let listings: Vec<RawListing> = resolved.into_iter().flatten().collect();
        if listings.len() < total {
            warn!(
                "Skipped {} of {} markers with no resolvable card",
                total - listings.len(),
                total
            );
        }
        info!("Extracted {} listings from {} map markers", listings.len(), total);

        Ok(listings)
    }

    fn name(&self) -> &'static str {
        "marker-token"
    }
}
