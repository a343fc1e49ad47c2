use std::time::Duration;

use crate::{Error, Result};

/// Which `MarketDataProvider` implementation feeds the Signal Engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceKind {
    Yahoo,
    Csv,
}

impl std::fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSourceKind::Yahoo => write!(f, "yahoo"),
            DataSourceKind::Csv => write!(f, "csv"),
        }
    }
}

pub const DEFAULT_YAHOO_RANGE: &str = "1mo";
pub const DEFAULT_YAHOO_INTERVAL: &str = "1h";

pub const DEFAULT_TICKERS: &[&str] = &["AAPL", "MSFT", "GOOGL", "NVDA", "ADBE", "INTC"];

/// All configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    /// Empty means the bot answers everyone.
    pub telegram_allowed_user_ids: Vec<i64>,

    // Status API (disabled when no token is set)
    pub dashboard_token: Option<String>,
    pub dashboard_port: u16,

    // Signals
    pub refresh_interval: Duration,
    pub top_n: usize,
    pub default_tickers: Vec<String>,
    pub universe_file_path: Option<String>,
    pub scoring_config_path: Option<String>,

    // Market data
    pub data_source: DataSourceKind,
    pub bars_dir: String,
    pub yahoo_range: String,
    pub yahoo_interval: String,
    pub fetch_timeout: Duration,
    pub fetch_concurrency: usize,

    // Calendar
    pub exchanges_config_path: Option<String>,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram_token = get("TELEGRAM_TOKEN").ok_or_else(|| {
            Error::Config("Required environment variable 'TELEGRAM_TOKEN' is not set".to_string())
        })?;

        let telegram_allowed_user_ids = match get("TELEGRAM_ALLOWED_USER_IDS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<i64>().map_err(|_| {
                        Error::Config(format!(
                            "TELEGRAM_ALLOWED_USER_IDS contains non-numeric ID: '{s}'"
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        let data_source = match get("DATA_SOURCE").map(|v| v.to_lowercase()).as_deref() {
            None | Some("yahoo") => DataSourceKind::Yahoo,
            Some("csv") => DataSourceKind::Csv,
            Some(other) => {
                return Err(Error::Config(format!(
                    "DATA_SOURCE must be 'yahoo' or 'csv', got: '{other}'"
                )))
            }
        };

        let default_tickers = match get("DEFAULT_TICKERS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_TICKERS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Config {
            telegram_token,
            telegram_allowed_user_ids,
            dashboard_token: get("DASHBOARD_TOKEN"),
            dashboard_port: parse_or(get("DASHBOARD_PORT"), "DASHBOARD_PORT", 8080)?,
            refresh_interval: Duration::from_secs(
                60 * positive(get("REFRESH_INTERVAL_MINUTES"), "REFRESH_INTERVAL_MINUTES", 15)?,
            ),
            top_n: positive(get("TOP_N"), "TOP_N", 10)? as usize,
            default_tickers,
            universe_file_path: get("UNIVERSE_FILE_PATH"),
            scoring_config_path: get("SCORING_CONFIG_PATH"),
            data_source,
            bars_dir: get("BARS_DIR").unwrap_or_else(|| "data/bars".to_string()),
            yahoo_range: get("YAHOO_RANGE").unwrap_or_else(|| DEFAULT_YAHOO_RANGE.to_string()),
            yahoo_interval: get("YAHOO_INTERVAL").unwrap_or_else(|| DEFAULT_YAHOO_INTERVAL.to_string()),
            fetch_timeout: Duration::from_secs(positive(
                get("FETCH_TIMEOUT_SECS"),
                "FETCH_TIMEOUT_SECS",
                10,
            )?),
            fetch_concurrency: positive(get("FETCH_CONCURRENCY"), "FETCH_CONCURRENCY", 8)? as usize,
            exchanges_config_path: get("EXCHANGES_CONFIG_PATH"),
        })
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: '{v}'"))),
        None => Ok(default),
    }
}

fn positive(value: Option<String>, key: &str, default: u64) -> Result<u64> {
    let v = parse_or(value, key, default)?;
    if v == 0 {
        return Err(Error::Config(format!("{key} must be greater than zero")));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let cfg = load(&[("TELEGRAM_TOKEN", "abc")]).unwrap();
        assert_eq!(cfg.refresh_interval, Duration::from_secs(15 * 60));
        assert_eq!(cfg.top_n, 10);
        assert_eq!(cfg.data_source, DataSourceKind::Yahoo);
        assert_eq!(cfg.default_tickers.len(), DEFAULT_TICKERS.len());
        assert!(cfg.universe_file_path.is_none());
        assert!(cfg.dashboard_token.is_none());
        assert!(cfg.telegram_allowed_user_ids.is_empty());
        assert_eq!(cfg.yahoo_range, "1mo");
        assert_eq!(cfg.yahoo_interval, "1h");
    }

    #[test]
    fn missing_token_is_an_error() {
        assert!(matches!(load(&[]), Err(Error::Config(_))));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let result = load(&[("TELEGRAM_TOKEN", "abc"), ("REFRESH_INTERVAL_MINUTES", "0")]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn non_numeric_top_n_is_rejected() {
        let result = load(&[("TELEGRAM_TOKEN", "abc"), ("TOP_N", "ten")]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn parses_lists_and_data_source() {
        let cfg = load(&[
            ("TELEGRAM_TOKEN", "abc"),
            ("TELEGRAM_ALLOWED_USER_IDS", "1, 2,3"),
            ("DEFAULT_TICKERS", "aapl, shel:lse ,"),
            ("DATA_SOURCE", "CSV"),
        ])
        .unwrap();
        assert_eq!(cfg.telegram_allowed_user_ids, vec![1, 2, 3]);
        assert_eq!(cfg.default_tickers, vec!["AAPL", "SHEL:LSE"]);
        assert_eq!(cfg.data_source, DataSourceKind::Csv);
    }

    #[test]
    fn unknown_data_source_is_rejected() {
        let result = load(&[("TELEGRAM_TOKEN", "abc"), ("DATA_SOURCE", "bloomberg")]);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
