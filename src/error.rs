use thiserror::Error;

/// Failures raised anywhere in the scrape pipeline.
///
/// Only `Session`, `ElementNotFound` on the top-level container and `Join`
/// abort a refresh. `Parse` and `GeocodeUnavailable` degrade a single field.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("browser session failed: {0}")]
    Session(String),

    #[error("element not found: {selector} (waited {waited_ms}ms)")]
    ElementNotFound { selector: String, waited_ms: u128 },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("geocoder unavailable: {0}")]
    GeocodeUnavailable(String),

    #[error("invalid selector \"{selector}\": {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("scrape worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("refresh scheduler is not running")]
    SchedulerStopped,
}

impl ScrapeError {
    /// Wrap a browser-engine error raised while starting or navigating a session.
    pub fn session(err: impl std::fmt::Display) -> Self {
        Self::Session(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to load selector rules from {path}: {reason}")]
    SelectorRules { path: String, reason: String },
}
