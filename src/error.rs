// =============================================================================
// Error taxonomy for feed ingestion and indicator computation
// =============================================================================

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::types::FeedKind;

/// Failures raised by the pure indicator functions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("insufficient data: need at least {needed} values, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("indicator period must be greater than zero")]
    InvalidPeriod,

    #[error("cannot compute an indicator over an empty window")]
    EmptyWindow,

    #[error("total volume is zero, VWAP is undefined")]
    ZeroVolume,
}

/// Errors local to one feed. None of these stop another feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to connect to {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("failed to send subscription: {0}")]
    Subscribe(#[source] tungstenite::Error),

    #[error("WebSocket read error: {0}")]
    Stream(#[source] tungstenite::Error),

    #[error("malformed {feed} payload: {reason}")]
    Parse { feed: FeedKind, reason: String },

    #[error(transparent)]
    Indicator(#[from] IndicatorError),
}

impl FeedError {
    pub(crate) fn parse(feed: FeedKind, reason: impl Into<String>) -> Self {
        Self::Parse {
            feed,
            reason: reason.into(),
        }
    }

    /// Transport-level failures are the ones worth a reconnect.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::Subscribe(_) | Self::Stream(_)
        )
    }
}
