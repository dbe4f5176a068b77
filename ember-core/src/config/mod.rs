//! `KEY=VALUE` configuration file.
//!
//! One pair per line, `#` starts a comment, keys and values are trimmed.
//! Unknown keys are kept and reachable through [`EngineConfig::get`];
//! recognized keys are parsed into typed fields at load time. A non-comment
//! line without `=` or a recognized key with an unparseable value is fatal.

use crate::core::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Typed engine configuration with the raw key/value map behind it.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub symbol: String,
    pub initial_capital: Decimal,
    pub spread_threshold_bps: f64,
    pub order_size: Decimal,
    pub max_inventory: Decimal,
    pub order_rate_limit: u64,
    pub order_refresh_interval: Duration,
    pub order_timeout: Duration,
    pub max_daily_loss: Decimal,
    pub max_drawdown: Decimal,
    pub position_limit: Decimal,
    pub circuit_breaker_enabled: bool,
    pub paper_trading: bool,
    pub log_level: String,
    pub max_reconnect_attempts: u32,
    pub orderbook_depth: usize,
    pub log_to_file: bool,
    pub log_to_console: bool,
    pub log_dir: PathBuf,
    raw: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "ETH-USD".to_string(),
            initial_capital: dec!(50.0),
            spread_threshold_bps: 5.0,
            order_size: dec!(0.01),
            max_inventory: dec!(0.1),
            order_rate_limit: 100,
            order_refresh_interval: Duration::from_millis(200),
            order_timeout: Duration::from_secs(30),
            max_daily_loss: dec!(5.0),
            max_drawdown: dec!(20.0),
            position_limit: dec!(0.1),
            circuit_breaker_enabled: true,
            paper_trading: true,
            log_level: "INFO".to_string(),
            max_reconnect_attempts: 5,
            orderbook_depth: 10,
            log_to_file: true,
            log_to_console: true,
            log_dir: PathBuf::from("logs"),
            raw: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load and parse a config file. Any malformed line is fatal.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_str_contents(&contents)
    }

    /// Parse config text. See the module docs for the accepted shape.
    pub fn from_str_contents(contents: &str) -> Result<Self, ConfigError> {
        let mut raw = HashMap::new();
        for (idx, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::MalformedLine {
                    line_no: idx + 1,
                    line: line.to_string(),
                });
            };
            raw.insert(key.trim().to_string(), value.trim().to_string());
        }
        Self::from_raw(raw)
    }

    fn from_raw(raw: HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut cfg = EngineConfig {
            raw,
            ..EngineConfig::default()
        };

        if let Some(symbol) = cfg.raw.get("TRADING_SYMBOL") {
            cfg.symbol = symbol.clone();
        }
        cfg.initial_capital = parse_key(&cfg.raw, "INITIAL_CAPITAL", cfg.initial_capital)?;
        cfg.spread_threshold_bps =
            parse_key(&cfg.raw, "SPREAD_THRESHOLD_BPS", cfg.spread_threshold_bps)?;
        cfg.order_size = parse_key(&cfg.raw, "ORDER_SIZE", cfg.order_size)?;
        cfg.max_inventory = parse_key(&cfg.raw, "MAX_INVENTORY", cfg.max_inventory)?;
        cfg.order_rate_limit = parse_key(&cfg.raw, "ORDER_RATE_LIMIT", cfg.order_rate_limit)?;
        cfg.order_refresh_interval = Duration::from_millis(parse_key(
            &cfg.raw,
            "ORDER_REFRESH_INTERVAL_MS",
            cfg.order_refresh_interval.as_millis() as u64,
        )?);
        cfg.order_timeout = Duration::from_secs(parse_key(
            &cfg.raw,
            "ORDER_TIMEOUT_SECONDS",
            cfg.order_timeout.as_secs(),
        )?);
        cfg.max_daily_loss = parse_key(&cfg.raw, "MAX_DAILY_LOSS_LIMIT", cfg.max_daily_loss)?;
        cfg.max_drawdown = parse_key(&cfg.raw, "MAX_DRAWDOWN", cfg.max_drawdown)?;
        cfg.position_limit = parse_key(&cfg.raw, "POSITION_LIMIT", cfg.position_limit)?;
        cfg.circuit_breaker_enabled =
            parse_bool(&cfg.raw, "ENABLE_CIRCUIT_BREAKER", cfg.circuit_breaker_enabled);
        cfg.paper_trading = parse_bool(&cfg.raw, "PAPER_TRADING", cfg.paper_trading);
        if let Some(level) = cfg.raw.get("LOG_LEVEL") {
            cfg.log_level = level.clone();
        }
        cfg.max_reconnect_attempts =
            parse_key(&cfg.raw, "MAX_RECONNECT_ATTEMPTS", cfg.max_reconnect_attempts)?;
        cfg.orderbook_depth = parse_key(&cfg.raw, "ORDERBOOK_DEPTH", cfg.orderbook_depth)?;
        cfg.log_to_file = parse_bool(&cfg.raw, "LOG_TO_FILE", cfg.log_to_file);
        cfg.log_to_console = parse_bool(&cfg.raw, "LOG_TO_CONSOLE", cfg.log_to_console);
        if let Some(dir) = cfg.raw.get("LOG_DIR") {
            cfg.log_dir = PathBuf::from(dir);
        }

        Ok(cfg)
    }

    /// Raw lookup for keys the typed surface does not cover.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }
}

fn parse_key<T: std::str::FromStr>(
    raw: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match raw.get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::BadValue {
            key: key.to_string(),
            value: value.clone(),
        }),
    }
}

/// Booleans accept true/1/yes/on in any case; anything else is false.
fn parse_bool(raw: &HashMap<String, String>, key: &str, default: bool) -> bool {
    match raw.get(key) {
        None => default,
        Some(value) => matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.symbol, "ETH-USD");
        assert_eq!(cfg.initial_capital, dec!(50.0));
        assert_eq!(cfg.order_size, dec!(0.01));
        assert_eq!(cfg.order_rate_limit, 100);
        assert_eq!(cfg.order_refresh_interval, Duration::from_millis(200));
        assert_eq!(cfg.order_timeout, Duration::from_secs(30));
        assert!(cfg.circuit_breaker_enabled);
        assert!(cfg.paper_trading);
        assert_eq!(cfg.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_parse_overrides_and_comments() {
        let cfg = EngineConfig::from_str_contents(
            "# session config\n\
             TRADING_SYMBOL = BTC-USD\n\
             ORDER_SIZE=0.05\n\
             \n\
             ORDER_RATE_LIMIT=25\n\
             PAPER_TRADING = no\n\
             MAX_DAILY_LOSS_LIMIT=12.5\n",
        )
        .unwrap();

        assert_eq!(cfg.symbol, "BTC-USD");
        assert_eq!(cfg.order_size, dec!(0.05));
        assert_eq!(cfg.order_rate_limit, 25);
        assert!(!cfg.paper_trading);
        assert_eq!(cfg.max_daily_loss, dec!(12.5));
        // Untouched keys keep their defaults.
        assert_eq!(cfg.position_limit, dec!(0.1));
    }

    #[test]
    fn test_malformed_line_is_fatal() {
        let err = EngineConfig::from_str_contents("TRADING_SYMBOL=ETH-USD\njust words\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::MalformedLine { line_no: 2, .. }));
    }

    #[test]
    fn test_bad_value_is_fatal() {
        let err = EngineConfig::from_str_contents("ORDER_SIZE=lots\n").unwrap_err();
        match err {
            ConfigError::BadValue { key, value } => {
                assert_eq!(key, "ORDER_SIZE");
                assert_eq!(value, "lots");
            }
            other => panic!("expected BadValue, got {:?}", other),
        }
    }

    #[test]
    fn test_bool_forms() {
        for (text, expected) in [
            ("ENABLE_CIRCUIT_BREAKER=TRUE", true),
            ("ENABLE_CIRCUIT_BREAKER=1", true),
            ("ENABLE_CIRCUIT_BREAKER=Yes", true),
            ("ENABLE_CIRCUIT_BREAKER=on", true),
            ("ENABLE_CIRCUIT_BREAKER=false", false),
            ("ENABLE_CIRCUIT_BREAKER=0", false),
        ] {
            let cfg = EngineConfig::from_str_contents(text).unwrap();
            assert_eq!(cfg.circuit_breaker_enabled, expected, "{}", text);
        }
    }

    #[test]
    fn test_unknown_keys_reachable() {
        let cfg =
            EngineConfig::from_str_contents("COINBASE_WS_URL=wss://example.test/ws\n").unwrap();
        assert_eq!(cfg.get("COINBASE_WS_URL"), Some("wss://example.test/ws"));
        assert_eq!(cfg.get("MISSING"), None);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let err = EngineConfig::from_file("/definitely/not/here.conf").unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { .. }));
    }

    #[test]
    fn test_values_are_trimmed() {
        let cfg = EngineConfig::from_str_contents("  TRADING_SYMBOL  =  SOL-USD  \n").unwrap();
        assert_eq!(cfg.symbol, "SOL-USD");
    }
}
