// =============================================================================
// Shared types used across the tickwise feed pipeline
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which of the two configured feeds a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedKind {
    /// Binance kline stream, reported as RSI.
    Rsi,
    /// Bitfinex candle stream, reported as VWAP.
    Vwap,
}

impl FeedKind {
    /// Short name of the indicator computed for this feed.
    pub fn indicator(self) -> &'static str {
        match self {
            Self::Rsi => "RSI",
            Self::Vwap => "VWAP",
        }
    }
}

impl std::fmt::Display for FeedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rsi => write!(f, "Binance"),
            Self::Vwap => write!(f, "Bitfinex"),
        }
    }
}

/// Close price of one kline update on the RSI feed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSample {
    /// Kline open time in milliseconds.
    pub timestamp: i64,
    pub close: f64,
}

/// A decoded Binance kline message: the sample plus the exchange's
/// "candle closed" flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KlineUpdate {
    pub sample: PriceSample,
    pub is_closed: bool,
}

/// One candle from the Bitfinex candle channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandleRecord {
    /// Candle start (MTS) in milliseconds.
    pub timestamp: i64,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: f64,
}

/// Output of one indicator computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult {
    pub feed: FeedKind,
    /// Close price of the newest sample in the drained window.
    pub reference_price: f64,
    pub value: f64,
    /// Timestamp of the newest sample in the drained window.
    pub candle_timestamp: i64,
    pub computed_at: DateTime<Utc>,
}

/// Lifecycle of a single exchange connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Subscribed,
    Streaming,
    Closing,
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::Streaming => "streaming",
            Self::Closing => "closing",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(name)
    }
}
