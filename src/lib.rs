pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod geo;
pub mod models;
pub mod refresh;
pub mod scrapers;

pub use cache::CacheStore;
pub use error::{ConfigError, ScrapeError};
