use std::str::FromStr;
use std::time::Duration;

use crate::{CandleWindow, CooldownScope, Error, Result, Timeframe, TradingMode};

/// All configuration loaded from environment variables at startup.
/// A missing or malformed required variable is an `Error::Config`.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange
    pub trading_mode: TradingMode,
    pub binance_api_key: Option<String>,
    pub binance_secret: Option<String>,
    pub binance_base_url: String,
    pub paper_slippage_bps: f64,

    // Trading
    pub symbol: String,
    pub timeframe: Timeframe,
    pub volume: f64,
    pub candle_count: usize,
    pub poll_interval: Duration,
    pub retry_delay: Duration,
    pub cooldown_scope: CooldownScope,
    pub auto_start: bool,

    // Telegram
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<i64>,
    /// PNG endpoint fetched for pattern alerts.
    pub chart_snapshot_url: Option<String>,

    // Dashboard
    pub dashboard_port: u16,
    pub dashboard_token: Option<String>,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. `from_env` delegates here.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let trading_mode = match get("TRADING_MODE")
            .unwrap_or_else(|| "paper".to_string())
            .to_lowercase()
            .as_str()
        {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'paper' or 'live', got: '{other}'"
                )))
            }
        };

        let binance_api_key = get("BINANCE_API_KEY");
        let binance_secret = get("BINANCE_SECRET");
        if trading_mode == TradingMode::Live {
            if binance_api_key.is_none() {
                return Err(missing("BINANCE_API_KEY"));
            }
            if binance_secret.is_none() {
                return Err(missing("BINANCE_SECRET"));
            }
        }

        let volume: f64 = parse_or(&get, "VOLUME", 0.01)?;
        if !(volume.is_finite() && volume > 0.0) {
            return Err(Error::Config(format!("VOLUME must be positive, got {volume}")));
        }

        let candle_count: usize = parse_or(&get, "CANDLE_COUNT", CandleWindow::DEFAULT_CAPACITY)?;
        if candle_count == 0 {
            return Err(Error::Config("CANDLE_COUNT must be at least 1".into()));
        }

        let telegram_chat_id = get("TELEGRAM_CHAT_ID")
            .map(|v| {
                v.trim().parse::<i64>().map_err(|_| {
                    Error::Config(format!("TELEGRAM_CHAT_ID is not numeric: '{}'", v.trim()))
                })
            })
            .transpose()?;

        Ok(Config {
            trading_mode,
            binance_api_key,
            binance_secret,
            binance_base_url: get("BINANCE_BASE_URL")
                .unwrap_or_else(|| "https://api.binance.com".to_string()),
            paper_slippage_bps: parse_or(&get, "PAPER_SLIPPAGE_BPS", 10.0)?,
            symbol: get("SYMBOL").unwrap_or_else(|| "BTCUSDT".to_string()),
            timeframe: parse_or(&get, "TIMEFRAME", Timeframe::M5)?,
            volume,
            candle_count,
            poll_interval: Duration::from_secs(parse_or(&get, "POLL_INTERVAL_SECS", 1)?),
            retry_delay: Duration::from_secs(parse_or(&get, "RETRY_DELAY_SECS", 5)?),
            cooldown_scope: parse_or(&get, "COOLDOWN_SCOPE", CooldownScope::Persistent)?,
            auto_start: parse_or(&get, "AUTO_START", false)?,
            telegram_token: get("TELEGRAM_TOKEN"),
            telegram_chat_id,
            chart_snapshot_url: get("CHART_SNAPSHOT_URL"),
            dashboard_port: parse_or(&get, "DASHBOARD_PORT", 8000)?,
            dashboard_token: get("DASHBOARD_TOKEN"),
        })
    }
}

fn missing(key: &str) -> Error {
    Error::Config(format!(
        "Required environment variable '{key}' is not set. Check your .env file."
    ))
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| Error::Config(format!("{key}='{}' is invalid: {e}", raw.trim()))),
    }
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
    fn defaults_apply_in_paper_mode() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.trading_mode, TradingMode::Paper);
        assert_eq!(cfg.timeframe, Timeframe::M5);
        assert_eq!(cfg.candle_count, 100);
        assert_eq!(cfg.poll_interval, Duration::from_secs(1));
        assert_eq!(cfg.retry_delay, Duration::from_secs(5));
        assert_eq!(cfg.cooldown_scope, CooldownScope::Persistent);
        assert!(cfg.telegram_token.is_none());
        assert!(cfg.chart_snapshot_url.is_none());
        assert!(!cfg.auto_start);
    }

    #[test]
    fn live_mode_requires_credentials() {
        let err = load(&[("TRADING_MODE", "live"), ("BINANCE_API_KEY", "k")]).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("BINANCE_SECRET"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let err = load(&[("TRADING_MODE", "live"), ("BINANCE_API_KEY", "  "), ("BINANCE_SECRET", "s")])
            .unwrap_err();
        assert!(err.to_string().contains("BINANCE_API_KEY"));
    }

    #[test]
    fn invalid_values_are_config_errors() {
        assert!(matches!(load(&[("VOLUME", "abc")]), Err(Error::Config(_))));
        assert!(matches!(load(&[("VOLUME", "0")]), Err(Error::Config(_))));
        assert!(matches!(load(&[("TIMEFRAME", "W1")]), Err(Error::Config(_))));
        assert!(matches!(load(&[("TELEGRAM_CHAT_ID", "me")]), Err(Error::Config(_))));
        assert!(matches!(load(&[("CANDLE_COUNT", "0")]), Err(Error::Config(_))));
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = load(&[
            ("SYMBOL", "ETHUSDT"),
            ("TIMEFRAME", "h1"),
            ("COOLDOWN_SCOPE", "window"),
            ("TELEGRAM_CHAT_ID", "-100123"),
            ("AUTO_START", "true"),
            ("CHART_SNAPSHOT_URL", "http://127.0.0.1:9000/chart.png"),
        ])
        .unwrap();
        assert_eq!(cfg.symbol, "ETHUSDT");
        assert_eq!(cfg.timeframe, Timeframe::H1);
        assert_eq!(cfg.cooldown_scope, CooldownScope::Window);
        assert_eq!(cfg.telegram_chat_id, Some(-100123));
        assert!(cfg.auto_start);
        assert_eq!(
            cfg.chart_snapshot_url.as_deref(),
            Some("http://127.0.0.1:9000/chart.png")
        );
    }
}
