// =============================================================================
// Runtime Configuration: feed endpoints, indicator periods, reconnect policy
// =============================================================================
//
// Loaded once at startup from a JSON file. Every field carries a serde
// default, so a missing file, an empty object or a partial file all yield a
// runnable configuration. A handful of environment variables can override
// the endpoints and the reconnect switch after loading.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::market_data::binance::kline_stream_url;
use crate::market_data::bitfinex::{DEFAULT_CANDLE_KEY, PUBLIC_WS_URL};

/// Override for the Binance kline endpoint.
pub const ENV_RSI_URL: &str = "TICKWISE_RSI_URL";
/// Override for the Bitfinex endpoint.
pub const ENV_VWAP_URL: &str = "TICKWISE_VWAP_URL";
/// `true` / `false` override for `reconnect.enabled`.
pub const ENV_RECONNECT: &str = "TICKWISE_RECONNECT";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_rsi_url() -> String {
    kline_stream_url("BTCUSDT", "5m")
}

fn default_rsi_period() -> usize {
    14
}

fn default_vwap_url() -> String {
    PUBLIC_WS_URL.to_string()
}

fn default_vwap_batch_size() -> usize {
    10
}

fn default_candle_key() -> String {
    DEFAULT_CANDLE_KEY.to_string()
}

fn default_initial_backoff_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

// =============================================================================
// Per-feed sections
// =============================================================================

/// Binance kline feed, reported as RSI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsiFeedConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_rsi_url")]
    pub url: String,

    /// Number of closes the RSI is computed over.
    #[serde(default = "default_rsi_period")]
    pub period: usize,
}

impl Default for RsiFeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_rsi_url(),
            period: default_rsi_period(),
        }
    }
}

/// Bitfinex candle feed, reported as VWAP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VwapFeedConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_vwap_url")]
    pub url: String,

    /// Number of candles per VWAP batch.
    #[serde(default = "default_vwap_batch_size")]
    pub batch_size: usize,

    /// Candle channel key sent in the subscription message.
    #[serde(default = "default_candle_key")]
    pub subscribe_key: String,
}

impl Default for VwapFeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_vwap_url(),
            batch_size: default_vwap_batch_size(),
            subscribe_key: default_candle_key(),
        }
    }
}

// =============================================================================
// ReconnectPolicy
// =============================================================================

/// Exponential backoff applied by every stream client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// When `false` a feed stops at its first disconnect.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl ReconnectPolicy {
    /// Stop at the first disconnect, matching a client with no retry logic.
    #[cfg(test)]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Double `current`, capped at `max_backoff_ms`.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        current
            .saturating_mul(2)
            .min(Duration::from_millis(self.max_backoff_ms))
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for both feeds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub rsi: RsiFeedConfig,

    #[serde(default)]
    pub vwap: VwapFeedConfig,

    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            rsi_enabled = config.rsi.enabled,
            vwap_enabled = config.vwap.enabled,
            reconnect = config.reconnect.enabled,
            "config loaded"
        );

        Ok(config)
    }

    /// Apply the `TICKWISE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup(ENV_RSI_URL).filter(|u| !u.trim().is_empty()) {
            self.rsi.url = url.trim().to_string();
        }
        if let Some(url) = lookup(ENV_VWAP_URL).filter(|u| !u.trim().is_empty()) {
            self.vwap.url = url.trim().to_string();
        }
        if let Some(flag) = lookup(ENV_RECONNECT) {
            self.reconnect.enabled = flag
                .trim()
                .to_lowercase()
                .parse()
                .with_context(|| format!("{ENV_RECONNECT} must be true or false, got {flag:?}"))?;
        }
        Ok(())
    }

    /// Reject settings no feed can run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.rsi.period > 0, "rsi.period must be greater than zero");
        ensure!(
            self.vwap.batch_size > 0,
            "vwap.batch_size must be greater than zero"
        );
        ensure!(
            self.reconnect.max_backoff_ms >= self.reconnect.initial_backoff_ms,
            "reconnect.max_backoff_ms ({}) is below initial_backoff_ms ({})",
            self.reconnect.max_backoff_ms,
            self.reconnect.initial_backoff_ms
        );
        Ok(())
    }
}
