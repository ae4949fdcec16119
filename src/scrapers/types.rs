use crate::error::ScrapeError;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Which extraction strategy drives the page
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Listing cards rendered in the page, address read from the card
    StaticCard,
    /// Cards paired with map markers that carry a position token
    MarkerToken,
    /// Click each map marker and read its popup
    Interactive,
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static-card" | "static" => Ok(Self::StaticCard),
            "marker-token" | "marker" => Ok(Self::MarkerToken),
            "interactive" | "interactive-popup" => Ok(Self::Interactive),
            other => Err(format!("unknown extraction strategy: {other}")),
        }
    }
}

/// Ordered fallback locator rules per field.
///
/// Each list is tried front to back; the first selector that yields a
/// non-empty value wins. Adapting to markup drift means editing this data,
/// usually through the JSON file named by `SELECTOR_RULES_PATH`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorRules {
    /// Listing container (card)
    pub card: Vec<String>,
    pub title: Vec<String>,
    pub price: Vec<String>,
    /// Media region inside a container; the whole container is used when none match
    pub media: Vec<String>,
    /// Image elements inside the media region
    pub image: Vec<String>,
    /// Attributes holding an image URL, in order of preference
    pub image_attrs: Vec<String>,
    pub address: Vec<String>,
    /// Map marker elements
    pub marker: Vec<String>,
    /// Attributes holding a marker's position token
    pub token_attrs: Vec<String>,
    /// Detail surface opened by clicking a marker
    pub popup: Vec<String>,
    /// Close control of the detail surface
    pub popup_close: Vec<String>,
}

impl Default for SelectorRules {
    fn default() -> Self {
        Self {
            card: strings(&[".hotel-card", ".hotel-card.map"]),
            title: strings(&["h2.hotel-info__title span", "h2.hotel-info__title"]),
            price: strings(&[".price-info__current-price", ".price-column"]),
            media: strings(&[".hotel-card__gallery", ".hotel-card__images", ".swiper-wrapper"]),
            image: strings(&["img"]),
            image_attrs: strings(&["src", "data-src", "data-lazy-src"]),
            address: strings(&[".hotel-info__address", ".hotel-card__address", "address"]),
            marker: strings(&[".map-marker", "[data-coords]"]),
            token_attrs: strings(&["data-coords", "data-id", "id"]),
            popup: strings(&[".ymaps-2-1-79-balloon", ".map-balloon"]),
            popup_close: strings(&[
                ".ymaps-2-1-79-balloon__close-button",
                ".map-balloon__close",
            ]),
        }
    }
}

impl SelectorRules {
    /// Parse every selector once so bad rules are rejected before the first refresh.
    pub fn compile(&self) -> Result<CompiledRules, ScrapeError> {
        Ok(CompiledRules {
            card: compile_list(&self.card)?,
            title: compile_list(&self.title)?,
            price: compile_list(&self.price)?,
            media: compile_list(&self.media)?,
            image: compile_list(&self.image)?,
            address: compile_list(&self.address)?,
            marker: compile_list(&self.marker)?,
            popup: compile_list(&self.popup)?,
            popup_close: compile_list(&self.popup_close)?,
            image_attrs: self.image_attrs.clone(),
            token_attrs: self.token_attrs.clone(),
            raw: self.clone(),
        })
    }
}

/// Selector rules parsed into `scraper` selectors
#[derive(Debug, Clone)]
pub struct CompiledRules {
    pub card: Vec<Selector>,
    pub title: Vec<Selector>,
    pub price: Vec<Selector>,
    pub media: Vec<Selector>,
    pub image: Vec<Selector>,
    pub address: Vec<Selector>,
    pub marker: Vec<Selector>,
    pub popup: Vec<Selector>,
    pub popup_close: Vec<Selector>,
    pub image_attrs: Vec<String>,
    pub token_attrs: Vec<String>,
    /// Source strings, needed when a selector is handed to the browser
    pub raw: SelectorRules,
}

/// Bounded waits used while driving the page
#[derive(Debug, Clone)]
pub struct Timings {
    pub navigation_timeout: Duration,
    pub element_timeout: Duration,
    pub popup_timeout: Duration,
    pub settle_delay: Duration,
    pub marker_retries: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            element_timeout: Duration::from_secs(15),
            popup_timeout: Duration::from_millis(3_000),
            settle_delay: Duration::from_millis(1_000),
            marker_retries: 2,
        }
    }
}

/// Join a rule list into one CSS selector list, as the browser expects it.
pub fn css_list(rules: &[String]) -> String {
    rules.join(", ")
}

fn compile_list(rules: &[String]) -> Result<Vec<Selector>, ScrapeError> {
    rules
        .iter()
        .map(|rule| {
            Selector::parse(rule).map_err(|e| ScrapeError::InvalidSelector {
                selector: rule.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}
