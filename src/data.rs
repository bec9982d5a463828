//! Data models for trade records, statistics and configuration

use crate::{error::SdkError, retry::ReconnectPolicy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Default trailing window kept by the window store
pub const WINDOW_DURATION: Duration = Duration::from_millis(60_000);

/// BitMEX realtime endpoint subscribed to the XBTUSD trade stream
pub const DEFAULT_ENDPOINT: &str =
    "wss://www.bitmex.com/realtime?subscribe=trade:XBTUSD,liquidation:XBTUSD";

/// One normalized executed trade
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TradeRecord {
    pub price: f64,
    pub size: f64,
    pub side: TradeSide,
    pub timestamp: DateTime<Utc>,
}

impl TradeRecord {
    pub fn new(price: f64, size: f64, side: TradeSide, timestamp: DateTime<Utc>) -> Self {
        Self { price, size, side, timestamp }
    }
}

impl fmt::Display for TradeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade: {} {} @ {} @ {}",
            self.side, self.size, self.price, self.timestamp
        )
    }
}

/// Trade side enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// Running high/low values per category.
///
/// Highs start at 0 and lows at `f64::INFINITY`; those sentinels mean
/// "no observation yet". The `*_range` accessors hide them behind `Option`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct HighLowStats {
    pub highest_buy_price: f64,
    pub lowest_buy_price: f64,
    pub highest_sell_price: f64,
    pub lowest_sell_price: f64,
    pub highest_size: f64,
    pub lowest_size: f64,
}

impl HighLowStats {
    /// `(low, high)` of buy prices, if any buy was seen
    pub fn buy_price_range(&self) -> Option<(f64, f64)> {
        observed(self.lowest_buy_price, self.highest_buy_price)
    }

    /// `(low, high)` of sell prices, if any sell was seen
    pub fn sell_price_range(&self) -> Option<(f64, f64)> {
        observed(self.lowest_sell_price, self.highest_sell_price)
    }

    /// `(low, high)` of trade sizes, if any trade was seen
    pub fn size_range(&self) -> Option<(f64, f64)> {
        observed(self.lowest_size, self.highest_size)
    }
}

fn observed(low: f64, high: f64) -> Option<(f64, f64)> {
    if low.is_finite() {
        Some((low, high))
    } else {
        None
    }
}

impl Default for HighLowStats {
    fn default() -> Self {
        Self {
            highest_buy_price: 0.0,
            lowest_buy_price: f64::INFINITY,
            highest_sell_price: 0.0,
            lowest_sell_price: f64::INFINITY,
            highest_size: 0.0,
            lowest_size: f64::INFINITY,
        }
    }
}

impl fmt::Display for HighLowStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn range(r: Option<(f64, f64)>) -> String {
            r.map(|(lo, hi)| format!("{}..{}", lo, hi))
                .unwrap_or_else(|| "-".to_string())
        }

        write!(
            f,
            "buy={} sell={} size={}",
            range(self.buy_price_range()),
            range(self.sell_price_range()),
            range(self.size_range())
        )
    }
}

/// Connectivity of the feed adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "DISCONNECTED"),
            ConnectionState::Connecting => write!(f, "CONNECTING"),
            ConnectionState::Connected => write!(f, "CONNECTED"),
        }
    }
}

/// Feed and engine configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub window_duration: Duration,
    /// Re-run connection attempts with `reconnect` after the feed drops.
    /// Off by default: the core only reconnects when its owner asks.
    pub auto_reconnect: bool,
    pub reconnect: ReconnectPolicy,
}

impl FeedConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("Endpoint cannot be empty".to_string());
        }

        if !self.endpoint.starts_with("ws://") && !self.endpoint.starts_with("wss://") {
            return Err("Endpoint must be a valid WebSocket URL".to_string());
        }

        if self.connect_timeout.is_zero() {
            return Err("Connect timeout must be greater than 0".to_string());
        }

        if self.window_duration.is_zero() {
            return Err("Window duration must be greater than 0".to_string());
        }

        if self.auto_reconnect {
            self.reconnect.validate()?;
        }

        Ok(())
    }

    /// Build a configuration from `TRADE_*` environment variables, loading a
    /// `.env` file first when one is present. Unset variables keep defaults.
    pub fn from_env() -> Result<Self, SdkError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, SdkError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("TRADE_FEED_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Some(secs) = lookup("TRADE_WINDOW_SECS") {
            config.window_duration = Duration::from_secs(parse_var("TRADE_WINDOW_SECS", &secs)?);
        }
        if let Some(secs) = lookup("TRADE_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout =
                Duration::from_secs(parse_var("TRADE_CONNECT_TIMEOUT_SECS", &secs)?);
        }
        if let Some(flag) = lookup("TRADE_AUTO_RECONNECT") {
            config.auto_reconnect = parse_var("TRADE_AUTO_RECONNECT", &flag)?;
        }

        config.validate().map_err(SdkError::Configuration)?;
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SdkError> {
    value
        .trim()
        .parse()
        .map_err(|_| SdkError::Configuration(format!("Invalid value for {}: {:?}", key, value)))
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(30),
            window_duration: WINDOW_DURATION,
            auto_reconnect: false,
            reconnect: ReconnectPolicy::default(),
        }
    }
}
