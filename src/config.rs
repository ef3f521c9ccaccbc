//! Application configuration loaded from environment variables.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Odds API ===
    /// API key for the odds provider.
    pub odds_api_key: String,

    /// Base URL of the odds API.
    #[serde(default = "default_api_base_url")]
    pub odds_api_base_url: String,

    /// Sports to poll (provider sport keys).
    #[serde(default = "default_sport_keys")]
    pub sport_keys: Vec<String>,

    /// Bookmaker regions requested from the provider.
    #[serde(default = "default_regions")]
    pub regions: Vec<String>,

    /// Markets requested from the provider.
    #[serde(default = "default_markets")]
    pub markets: Vec<String>,

    /// Optional bookmaker allowlist applied during normalization.
    #[serde(default)]
    pub bookmaker_keys: Option<Vec<String>>,

    // === Quota & Throttle ===
    /// Daily API call budget. Keep well under the provider's hard cap.
    #[serde(default = "default_daily_call_limit")]
    pub daily_call_limit: u32,

    /// Minimum seconds between any two network calls, across all sports.
    #[serde(default = "default_min_request_interval")]
    pub min_request_interval_secs: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    // === Cache Freshness ===
    /// Max age before a live payload counts as stale.
    #[serde(default = "default_live_max_age")]
    pub live_cache_max_age_secs: u64,

    /// Max age before a pre-match payload counts as stale.
    #[serde(default = "default_prematch_max_age")]
    pub prematch_cache_max_age_secs: u64,

    // === Refresh Loop ===
    /// Interval between live refresh ticks.
    #[serde(default = "default_live_refresh")]
    pub live_refresh_interval_secs: u64,

    /// Interval between pre-match refresh ticks.
    #[serde(default = "default_prematch_refresh")]
    pub prematch_refresh_interval_secs: u64,

    // === Detection ===
    /// Total stake split across the legs of each opportunity.
    #[serde(default = "default_total_stake")]
    pub total_stake: Decimal,

    // === Persistence & Output ===
    /// Directory for cache and quota state.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Path the opportunity artifact is written to each cycle.
    #[serde(default = "default_output_path")]
    pub output_path: String,

    // === Observability ===
    /// Enable the Prometheus exporter.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Prometheus exporter port.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_api_base_url() -> String {
    "https://api.the-odds-api.com".to_string()
}

fn default_sport_keys() -> Vec<String> {
    vec!["soccer_epl".to_string()]
}

fn default_regions() -> Vec<String> {
    vec![
        "eu".to_string(),
        "uk".to_string(),
        "us".to_string(),
        "au".to_string(),
    ]
}

fn default_markets() -> Vec<String> {
    vec!["h2h".to_string(), "totals".to_string()]
}

fn default_daily_call_limit() -> u32 {
    100
}

fn default_min_request_interval() -> u64 {
    5
}

fn default_http_timeout() -> u64 {
    30
}

fn default_live_max_age() -> u64 {
    900 // 15 minutes
}

fn default_prematch_max_age() -> u64 {
    21_600 // 6 hours
}

fn default_live_refresh() -> u64 {
    900
}

fn default_prematch_refresh() -> u64 {
    21_600
}

fn default_total_stake() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_output_path() -> String {
    "./data/opportunities.json".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.odds_api_key.is_empty() {
            return Err("ODDS_API_KEY is required".to_string());
        }

        if url::Url::parse(&self.odds_api_base_url).is_err() {
            return Err(format!(
                "ODDS_API_BASE_URL is not a valid URL: {}",
                self.odds_api_base_url
            ));
        }

        if self.sport_keys.is_empty() {
            return Err("SPORT_KEYS must name at least one sport".to_string());
        }

        if self.daily_call_limit == 0 {
            return Err("DAILY_CALL_LIMIT must be positive".to_string());
        }

        if self.total_stake <= Decimal::ZERO {
            return Err("TOTAL_STAKE must be positive".to_string());
        }

        Ok(())
    }

    /// Regions joined for the provider query string.
    pub fn regions_param(&self) -> String {
        self.regions.join(",")
    }

    /// Markets joined for the provider query string.
    pub fn markets_param(&self) -> String {
        self.markets.join(",")
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        odds_api_key: "test-key".to_string(),
        odds_api_base_url: default_api_base_url(),
        sport_keys: default_sport_keys(),
        regions: default_regions(),
        markets: default_markets(),
        bookmaker_keys: None,
        daily_call_limit: default_daily_call_limit(),
        min_request_interval_secs: default_min_request_interval(),
        http_timeout_secs: default_http_timeout(),
        live_cache_max_age_secs: default_live_max_age(),
        prematch_cache_max_age_secs: default_prematch_max_age(),
        live_refresh_interval_secs: default_live_refresh(),
        prematch_refresh_interval_secs: default_prematch_refresh(),
        total_stake: default_total_stake(),
        data_dir: "./data".to_string(),
        output_path: "./data/opportunities.json".to_string(),
        metrics_enabled: false,
        metrics_port: default_metrics_port(),
        rust_log: "info".to_string(),
        verbose: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_sensible() {
        assert_eq!(default_daily_call_limit(), 100);
        assert_eq!(default_min_request_interval(), 5);
        assert_eq!(default_live_max_age(), 900);
        assert_eq!(default_prematch_max_age(), 21_600);
        assert_eq!(default_total_stake(), Decimal::new(10_000, 0));
    }

    #[test]
    fn validate_rejects_empty_api_key() {
        let mut config = test_config();
        config.odds_api_key = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_base_url() {
        let mut config = test_config();
        config.odds_api_base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_stake() {
        let mut config = test_config();
        config.total_stake = Decimal::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn query_params_join_with_commas() {
        let config = test_config();
        assert_eq!(config.regions_param(), "eu,uk,us,au");
        assert_eq!(config.markets_param(), "h2h,totals");
    }
}
