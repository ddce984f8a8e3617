use std::str::FromStr;

use crate::error::OracleError;

/// Where signal events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleMode {
    /// Deterministic generated data, no network access.
    Mock,
    /// Live source clients.
    Live,
}

impl OracleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OracleMode::Mock => "mock",
            OracleMode::Live => "live",
        }
    }
}

impl FromStr for OracleMode {
    type Err = OracleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(OracleMode::Mock),
            "live" => Ok(OracleMode::Live),
            other => Err(OracleError::Config(format!(
                "ORACLE_MODE must be 'mock' or 'live', got '{other}'"
            ))),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_url: Option<String>,
    pub mode: OracleMode,

    // Web server
    pub api_host: String,
    pub api_port: u16,
    pub cors_origins: Vec<String>,
    pub admin_key: String,

    // Feature engine
    pub feature_window_days: usize,
    pub feature_lookback_days: u32,
    pub forecast_horizons: Vec<u32>,

    // Sources
    pub arxiv_categories: Vec<String>,
    pub github_token: Option<String>,
    pub crunchbase_api_key: Option<String>,
    pub jobs_feed_urls: Vec<String>,
    pub topic_keywords_path: Option<String>,

    pub log_format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            mode: OracleMode::Mock,
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            admin_key: "dev123".to_string(),
            feature_window_days: 30,
            feature_lookback_days: 120,
            forecast_horizons: vec![30, 90, 180],
            arxiv_categories: ["cs.AI", "cs.CL", "cs.LG", "stat.ML"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            github_token: None,
            crunchbase_api_key: None,
            jobs_feed_urls: vec![
                "https://weworkremotely.com/categories/remote-programming-jobs.rss".to_string(),
                "https://remoteok.io/remote-dev-jobs.rss".to_string(),
            ],
            topic_keywords_path: None,
            log_format: "text".to_string(),
        }
    }
}

/// First few characters of a secret for the startup log.
fn preview_opt(val: &Option<String>) -> String {
    match val {
        Some(v) if !v.is_empty() => {
            let head: String = v.chars().take(5).collect();
            format!("{head}...({} chars)", v.chars().count())
        }
        _ => "<not set>".to_string(),
    }
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first.
    pub fn from_env() -> Result<Self, OracleError> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.log_summary();
        Ok(config)
    }

    /// Build a config from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OracleError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let mode = match get("ORACLE_MODE") {
            Some(v) => v.parse()?,
            None => defaults.mode,
        };

        Ok(Self {
            database_url: get("DATABASE_URL"),
            mode,
            api_host: get("API_HOST").unwrap_or(defaults.api_host),
            api_port: parse_or("API_PORT", get("API_PORT"), defaults.api_port)?,
            cors_origins: get("CORS_ORIGINS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.cors_origins),
            admin_key: get("ORACLE_ADMIN_KEY").unwrap_or(defaults.admin_key),
            feature_window_days: positive(
                "FEATURE_WINDOW_DAYS",
                parse_or(
                    "FEATURE_WINDOW_DAYS",
                    get("FEATURE_WINDOW_DAYS"),
                    defaults.feature_window_days,
                )?,
            )?,
            feature_lookback_days: positive(
                "FEATURE_LOOKBACK_DAYS",
                parse_or(
                    "FEATURE_LOOKBACK_DAYS",
                    get("FEATURE_LOOKBACK_DAYS"),
                    defaults.feature_lookback_days,
                )?,
            )?,
            forecast_horizons: match get("FORECAST_HORIZONS") {
                Some(v) => parse_horizons(&v)?,
                None => defaults.forecast_horizons,
            },
            arxiv_categories: get("ARXIV_CATEGORIES")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.arxiv_categories),
            github_token: get("GITHUB_TOKEN"),
            crunchbase_api_key: get("CRUNCHBASE_API_KEY"),
            jobs_feed_urls: get("JOBS_FEED_URLS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.jobs_feed_urls),
            topic_keywords_path: get("TOPIC_KEYWORDS_JSON"),
            log_format: get("LOG_FORMAT").unwrap_or(defaults.log_format),
        })
    }

    pub fn is_mock(&self) -> bool {
        self.mode == OracleMode::Mock
    }

    /// Horizon used for the surge uncertainty penalty.
    pub fn primary_horizon(&self) -> u32 {
        self.forecast_horizons.first().copied().unwrap_or(30)
    }

    fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  ORACLE_MODE: {:?}", self.mode);
        tracing::info!(
            "  DATABASE_URL: {}",
            if self.database_url.is_some() { "<set>" } else { "<not set, using memory store>" }
        );
        tracing::info!("  API: {}:{}", self.api_host, self.api_port);
        tracing::info!(
            "  FEATURE_WINDOW_DAYS: {}, FEATURE_LOOKBACK_DAYS: {}",
            self.feature_window_days,
            self.feature_lookback_days
        );
        tracing::info!("  FORECAST_HORIZONS: {:?}", self.forecast_horizons);
        tracing::info!("  GITHUB_TOKEN: {}", preview_opt(&self.github_token));
        tracing::info!("  CRUNCHBASE_API_KEY: {}", preview_opt(&self.crunchbase_api_key));
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, OracleError> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| OracleError::Config(format!("{key} must be a number, got '{v}'"))),
        None => Ok(default),
    }
}

fn positive<T: PartialOrd + Default>(key: &str, value: T) -> Result<T, OracleError> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(OracleError::Config(format!("{key} must be greater than zero")))
    }
}

fn parse_horizons(value: &str) -> Result<Vec<u32>, OracleError> {
    let horizons = split_list(value)
        .iter()
        .map(|h| {
            h.parse::<u32>()
                .ok()
                .filter(|h| *h > 0)
                .ok_or_else(|| OracleError::Config(format!("invalid forecast horizon '{h}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if horizons.is_empty() {
        return Err(OracleError::Config("FORECAST_HORIZONS is empty".to_string()));
    }
    Ok(horizons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.mode, OracleMode::Mock);
        assert_eq!(config.api_port, 8000);
        assert_eq!(config.admin_key, "dev123");
        assert_eq!(config.feature_window_days, 30);
        assert_eq!(config.forecast_horizons, vec![30, 90, 180]);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn lists_are_comma_separated_and_trimmed() {
        let config = Config::from_lookup(lookup(&[
            ("CORS_ORIGINS", "http://a.test, http://b.test ,"),
            ("FORECAST_HORIZONS", "7, 14"),
        ]))
        .unwrap();
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.forecast_horizons, vec![7, 14]);
        assert_eq!(config.primary_horizon(), 7);
    }

    #[test]
    fn invalid_values_are_config_errors() {
        let bad_port = Config::from_lookup(lookup(&[("API_PORT", "eighty")]));
        assert!(matches!(bad_port, Err(OracleError::Config(_))));

        let bad_mode = Config::from_lookup(lookup(&[("ORACLE_MODE", "staging")]));
        assert!(matches!(bad_mode, Err(OracleError::Config(_))));

        let zero_window = Config::from_lookup(lookup(&[("FEATURE_WINDOW_DAYS", "0")]));
        assert!(matches!(zero_window, Err(OracleError::Config(_))));
    }

    #[test]
    fn live_mode_is_parsed() {
        let config = Config::from_lookup(lookup(&[("ORACLE_MODE", "LIVE")])).unwrap();
        assert!(!config.is_mock());
    }

    #[test]
    fn secret_preview_respects_char_boundaries() {
        assert_eq!(preview_opt(&Some("ghp_abcdef".into())), "ghp_a...(10 chars)");
        assert_eq!(preview_opt(&Some("clé€secret".into())), "clé€s...(10 chars)");
        assert_eq!(preview_opt(&Some(String::new())), "<not set>");
        assert_eq!(preview_opt(&None), "<not set>");
    }
}
