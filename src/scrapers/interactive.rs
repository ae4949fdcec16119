use crate::error::ScrapeError;
use crate::models::{Position, RawListing};
use crate::scrapers::browser::PageDriver;
use crate::scrapers::fields::{all_matches, first_match};
use crate::scrapers::strategy::ExtractContext;
use crate::scrapers::traits::ExtractionStrategy;
use crate::scrapers::types::css_list;
use scraper::Html;
use tracing::{debug, info, warn};

const PRESS_ESCAPE_JS: &str = r#"
    document.dispatchEvent(new KeyboardEvent('keydown', { key: 'Escape', bubbles: true }));
"#;

/// Clicks every map marker in turn and reads the popup it opens.
///
/// Strictly sequential: click, wait for the popup, read it, close it,
/// pause. A marker whose popup never shows up is skipped; a browser
/// failure aborts the whole extraction.
pub struct InteractivePopupStrategy {
    ctx: ExtractContext,
}

impl InteractivePopupStrategy {
    pub fn new(ctx: ExtractContext) -> Self {
        Self { ctx }
    }

    /// Click the marker until its popup renders, returning the page HTML with
    /// the popup open, or `None` once the retries are spent.
    ///
    /// Only a missing element is retried. Any other error means the session
    /// is gone and is returned as is. A popup identical to `stale` (the one
    /// that failed to close) does not count as opened.
    fn open_popup(
        &self,
        page: &dyn PageDriver,
        markers_css: &str,
        popup_css: &str,
        index: usize,
        stale: Option<&str>,
    ) -> Result<Option<String>, ScrapeError> {
        let attempts = self.ctx.timings.marker_retries + 1;

        for attempt in 1..=attempts {
            let opened = page
                .click(markers_css, index)
                .and_then(|()| page.wait_for_selector(popup_css, self.ctx.timings.popup_timeout));

            match opened {
                Ok(()) => {
                    let html = page.content()?;
                    if stale.is_none() || self.popup_html(&html).as_deref() != stale {
                        return Ok(Some(html));
                    }
                    debug!(
                        "Marker {} attempt {}/{} still shows the previous popup",
                        index, attempt, attempts
                    );
                }
                Err(e @ ScrapeError::ElementNotFound { .. }) => {
                    debug!("Marker {} popup attempt {}/{} failed: {}", index, attempt, attempts, e);
                }
                Err(e) => return Err(e),
            }
            page.pause(self.ctx.timings.settle_delay);
        }

        Ok(None)
    }

    /// Dismiss the open popup, returning its markup if it is still on screen.
    fn close_popup(&self, page: &dyn PageDriver) -> Result<Option<String>, ScrapeError> {
        let close_css = css_list(&self.ctx.rules.raw.popup_close);
        let clicked = if close_css.is_empty() {
            false
        } else {
            match page.click(&close_css, 0) {
                Ok(()) => true,
                Err(ScrapeError::ElementNotFound { .. }) => false,
                Err(e) => return Err(e),
            }
        };
        if !clicked {
            page.evaluate(PRESS_ESCAPE_JS)?;
        }

        page.pause(self.ctx.timings.settle_delay);
        Ok(self.popup_html(&page.content()?))
    }

    fn popup_html(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        first_match(document.root_element(), &self.ctx.rules.popup).map(|popup| popup.html())
    }

    fn read_popup(&self, html: &str, token: Option<String>) -> Option<RawListing> {
        let document = Html::parse_document(html);
        let reader = self.ctx.reader();
        let popup = first_match(document.root_element(), &self.ctx.rules.popup)?;
        let fields = reader.read(popup);

        let position = token
            .map(Position::Token)
            .or_else(|| reader.address(popup).map(Position::Address))
            .unwrap_or(Position::Unknown);

        Some(RawListing {
            title: fields.title,
            price: fields.price,
            image_urls: fields.image_urls,
            position,
        })
    }
}

impl ExtractionStrategy for InteractivePopupStrategy {
    fn extract(&self, page: &dyn PageDriver) -> Result<Vec<RawListing>, ScrapeError> {
        let markers_css = css_list(&self.ctx.rules.raw.marker);
        let popup_css = css_list(&self.ctx.rules.raw.popup);
        page.wait_for_selector(&markers_css, self.ctx.timings.element_timeout)?;

        // Tokens are read up front; the marker list is assumed stable while popups open
        let tokens: Vec<Option<String>> = {
            let document = Html::parse_document(&page.content()?);
            let reader = self.ctx.reader();
            all_matches(document.root_element(), &self.ctx.rules.marker)
                .into_iter()
                .map(|marker| reader.token(marker))
                .collect()
        };
        info!("Found {} map markers", tokens.len());

        let mut listings = Vec::with_capacity(tokens.len());
        let mut stale: Option<String> = None;
        for (index, token) in tokens.into_iter().enumerate() {
            match self.open_popup(page, &markers_css, &popup_css, index, stale.as_deref())? {
                Some(html) => match self.read_popup(&html, token) {
                    Some(listing) => {
                        debug!("Marker {}: {}", index, listing.title);
                        listings.push(listing);
                    }
                    None => warn!("Marker {} popup vanished before it could be read", index),
                },
                None => warn!("Skipping marker {}: popup never opened", index),
            }

            stale = self.close_popup(page)?;
            if stale.is_some() {
                warn!("Popup for marker {} is still open after closing", index);
            }
        }

        info!("Extracted {} listings from map popups", listings.len());
        Ok(listings)
    }

    fn name(&self) -> &'static str {
        "interactive"
    }
}
