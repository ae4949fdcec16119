pub mod browser;
pub mod fields;
pub mod interactive;
pub mod marker_token;
pub mod page;
pub mod static_card;
pub mod strategy;
pub mod traits;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use browser::{BrowserSession, PageDriver, DEFAULT_USER_AGENT};
pub use page::PageScraper;
pub use strategy::{build_strategy, ExtractContext};
pub use traits::{ExtractionStrategy, ListingScraper};
pub use types::{SelectorRules, StrategyKind, Timings};
