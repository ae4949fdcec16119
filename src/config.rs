use crate::error::ConfigError;
use crate::geo::{DEFAULT_GEOCODER_URL, DEFAULT_TOKEN_PREFIX};
use crate::scrapers::{SelectorRules, StrategyKind, Timings, DEFAULT_USER_AGENT};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TARGET_URL: &str = "https://homereserve.ru/BeWaidhbbl";
pub const DEFAULT_PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/300x200?text=No+Image";

/// Runtime configuration, read from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub target_url: String,
    /// Address geocoding is disabled when absent
    pub geocoder_api_key: Option<String>,
    pub geocoder_url: String,
    pub geocoder_timeout: Duration,
    pub refresh_interval: Duration,
    pub refresh_on_startup: bool,
    pub strategy: StrategyKind,
    pub selector_rules_path: Option<PathBuf>,
    pub user_agent: String,
    pub timings: Timings,
    pub token_prefix: String,
    pub placeholder_image: String,
    pub log_level: String,
}

/// Load configuration from environment variables, after reading `.env` if present.
///
/// # Errors
///
/// Returns `ConfigError` if a value cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_app_config(|key| std::env::var(key))
}

/// Build configuration from an env-var lookup function.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let port = or_default("PORT", "3000")
        .trim()
        .parse::<u16>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "PORT".to_string(),
            reason: e.to_string(),
        })?;

    let strategy = or_default("EXTRACTION_STRATEGY", "static-card")
        .parse::<StrategyKind>()
        .map_err(|reason| ConfigError::InvalidEnvVar {
            var: "EXTRACTION_STRATEGY".to_string(),
            reason,
        })?;

    let refresh_on_startup = !matches!(
        or_default("REFRESH_ON_STARTUP", "true").to_ascii_lowercase().as_str(),
        "false" | "0" | "no"
    );

    let refresh_interval_secs = parse_u64("REFRESH_INTERVAL_SECS", "86400")?;
    if refresh_interval_secs == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "REFRESH_INTERVAL_SECS".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    let timings = Timings {
        navigation_timeout: Duration::from_secs(parse_u64("NAVIGATION_TIMEOUT_SECS", "30")?),
        element_timeout: Duration::from_secs(parse_u64("ELEMENT_TIMEOUT_SECS", "15")?),
        popup_timeout: Duration::from_millis(parse_u64("POPUP_TIMEOUT_MS", "3000")?),
        settle_delay: Duration::from_millis(parse_u64("SETTLE_DELAY_MS", "1000")?),
        marker_retries: u32::try_from(parse_u64("MARKER_RETRIES", "2")?).map_err(|e| {
            ConfigError::InvalidEnvVar {
                var: "MARKER_RETRIES".to_string(),
                reason: e.to_string(),
            }
        })?,
    };

    Ok(AppConfig {
        port,
        target_url: or_default("TARGET_URL", DEFAULT_TARGET_URL),
        geocoder_api_key: optional("GEOCODER_API_KEY"),
        geocoder_url: or_default("GEOCODER_URL", DEFAULT_GEOCODER_URL),
        geocoder_timeout: Duration::from_secs(parse_u64("GEOCODER_TIMEOUT_SECS", "10")?),
        refresh_interval: Duration::from_secs(refresh_interval_secs),
        refresh_on_startup,
        strategy,
        selector_rules_path: optional("SELECTOR_RULES_PATH").map(PathBuf::from),
        user_agent: or_default("USER_AGENT", DEFAULT_USER_AGENT),
        timings,
        token_prefix: lookup("TOKEN_PREFIX").unwrap_or_else(|_| DEFAULT_TOKEN_PREFIX.to_string()),
        placeholder_image: or_default("PLACEHOLDER_IMAGE_URL", DEFAULT_PLACEHOLDER_IMAGE),
        log_level: or_default("LOG_LEVEL", "info"),
    })
}

/// Locator rules from a JSON file, or the built-in defaults.
///
/// # Errors
///
/// Returns [`ConfigError::SelectorRules`] if the file cannot be read or parsed.
pub fn load_selector_rules(path: Option<&Path>) -> Result<SelectorRules, ConfigError> {
    let Some(path) = path else {
        return Ok(SelectorRules::default());
    };

    let to_error = |reason: String| ConfigError::SelectorRules {
        path: path.display().to_string(),
        reason,
    };

    let raw = std::fs::read_to_string(path).map_err(|e| to_error(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| to_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn defaults_apply_with_empty_env() {
        let map = HashMap::new();
        let config = build_app_config(lookup_from_map(&map)).expect("config");

        assert_eq!(config.port, 3000);
        assert_eq!(config.target_url, DEFAULT_TARGET_URL);
        assert_eq!(config.refresh_interval, Duration::from_secs(86_400));
        assert!(config.refresh_on_startup);
        assert_eq!(config.strategy, StrategyKind::StaticCard);
        assert!(config.geocoder_api_key.is_none());
        assert_eq!(config.timings.navigation_timeout, Duration::from_secs(30));
        assert_eq!(config.token_prefix, DEFAULT_TOKEN_PREFIX);
    }

    #[test]
    fn overrides_are_read() {
        let mut map = HashMap::new();
        map.insert("PORT", "8080");
        map.insert("GEOCODER_API_KEY", "secret");
        map.insert("EXTRACTION_STRATEGY", "interactive");
        map.insert("REFRESH_INTERVAL_SECS", "3600");
        map.insert("REFRESH_ON_STARTUP", "false");
        map.insert("POPUP_TIMEOUT_MS", "500");

        let config = build_app_config(lookup_from_map(&map)).expect("config");

        assert_eq!(config.port, 8080);
        assert_eq!(config.geocoder_api_key.as_deref(), Some("secret"));
        assert_eq!(config.strategy, StrategyKind::Interactive);
        assert_eq!(config.refresh_interval, Duration::from_secs(3600));
        assert!(!config.refresh_on_startup);
        assert_eq!(config.timings.popup_timeout, Duration::from_millis(500));
    }

    #[test]
    fn blank_api_key_disables_geocoding() {
        let mut map = HashMap::new();
        map.insert("GEOCODER_API_KEY", "  ");
        let config = build_app_config(lookup_from_map(&map)).expect("config");
        assert!(config.geocoder_api_key.is_none());
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut map = HashMap::new();
        map.insert("PORT", "http");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "PORT"),
            "expected InvalidEnvVar(PORT), got: {result:?}"
        );
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let mut map = HashMap::new();
        map.insert("EXTRACTION_STRATEGY", "crawler");
        let result = build_app_config(lookup_from_map(&map));
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "EXTRACTION_STRATEGY"));
    }

    #[test]
    fn zero_refresh_interval_is_rejected() {
        let mut map = HashMap::new();
        map.insert("REFRESH_INTERVAL_SECS", "0");
        assert!(build_app_config(lookup_from_map(&map)).is_err());
    }

    #[test]
    fn selector_rules_default_without_path() {
        let rules = load_selector_rules(None).expect("rules");
        assert_eq!(rules.card, SelectorRules::default().card);
    }

    #[test]
    fn missing_rules_file_is_reported() {
        let result = load_selector_rules(Some(Path::new("/nonexistent/rules.json")));
        assert!(matches!(result, Err(ConfigError::SelectorRules { .. })));
    }
}
