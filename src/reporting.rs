// =============================================================================
// Reporting: downstream sink for computed indicator values
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::error::FeedError;
use crate::types::{FeedKind, IndicatorResult};

/// Receives every computed result and every feed-local error.
///
/// Shared by all feeds, so implementations synchronise internally.
pub trait ResultSink: Send + Sync {
    fn report(&self, result: &IndicatorResult);

    fn report_error(&self, feed: FeedKind, error: &FeedError) {
        warn!(feed = %feed, error = %error, "feed error");
    }
}

/// Round to two decimals for display.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Logs one line per result and remembers the latest value per feed.
#[derive(Default)]
pub struct LogReporter {
    latest: RwLock<HashMap<FeedKind, IndicatorResult>>,
    emitted: AtomicU64,
    errors: AtomicU64,
}

impl LogReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self, feed: FeedKind) -> Option<IndicatorResult> {
        self.latest.read().get(&feed).cloned()
    }

    /// Number of results reported so far.
    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Number of errors reported so far.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

impl ResultSink for LogReporter {
    fn report(&self, result: &IndicatorResult) {
        info!(
            feed = %result.feed,
            candle_ts = result.candle_timestamp,
            "{} - Close Price: {}, {}: {}",
            result.feed,
            result.reference_price,
            result.feed.indicator(),
            round2(result.value)
        );

        self.latest.write().insert(result.feed, result.clone());
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    fn report_error(&self, feed: FeedKind, err: &FeedError) {
        if err.is_transport() {
            error!(feed = %feed, error = %err, "feed connection error");
        } else {
            warn!(feed = %feed, error = %err, "indicator computation failed");
        }
        self.errors.fetch_add(1, Ordering::Relaxed);
    }
}
