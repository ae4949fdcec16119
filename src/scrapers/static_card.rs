use crate::error::ScrapeError;
use crate::models::{Position, RawListing};
use crate::scrapers::browser::PageDriver;
use crate::scrapers::fields::all_matches;
use crate::scrapers::strategy::ExtractContext;
use crate::scrapers::traits::ExtractionStrategy;
use crate::scrapers::types::css_list;
use scraper::Html;
use tracing::{debug, info};

/// Reads listing cards straight from the rendered page.
///
/// The card list must appear within the element timeout, otherwise the
/// whole refresh fails. Missing fields inside a card only degrade.
pub struct StaticCardStrategy {
    ctx: ExtractContext,
}

impl StaticCardStrategy {
    pub fn new(ctx: ExtractContext) -> Self {
        Self { ctx }
    }
}

impl ExtractionStrategy for StaticCardStrategy {
    fn extract(&self, page: &dyn PageDriver) -> Result<Vec<RawListing>, ScrapeError> {
        let cards_css = css_list(&self.ctx.rules.raw.card);
        page.wait_for_selector(&cards_css, self.ctx.timings.element_timeout)?;

        let html = page.content()?;
        debug!("Downloaded {} bytes of HTML", html.len());

        let document = Html::parse_document(&html);
        let reader = self.ctx.reader();
        let cards = all_matches(document.root_element(), &self.ctx.rules.card);
        info!("Found {} listing cards", cards.len());

        let listings = cards
            .into_iter()
            .map(|card| {
                let fields = reader.read(card);
                let position = reader
                    .address(card)
                    .map_or(Position::Unknown, Position::Address);

                RawListing {
                    title: fields.title,
                    price: fields.price,
                    image_urls: fields.image_urls,
                    position,
                }
            })
            .collect();

        Ok(listings)
    }

    fn name(&self) -> &'static str {
        "static-card"
    }
}
