// =============================================================================
// Candle Aggregators: per-feed batching ahead of indicator computation
// =============================================================================
//
// Each aggregator owns one `RollingWindow` and decides when that window is
// ready to be consumed. Consumption is a batch reset: `drain` returns the
// window and the next computation starts from an empty buffer.
// =============================================================================

use crate::market_data::rolling_window::RollingWindow;
use crate::types::{CandleRecord, KlineUpdate, PriceSample};

/// Accumulates decoded updates until a feed-specific trigger fires.
///
/// `on_tick` is the only method that grows the window and `drain` the only
/// one that shrinks it. Implementations are owned by a single task and do no
/// locking.
pub trait CandleAggregator {
    /// What the decoder hands in.
    type Update;
    /// What the window stores and `drain` returns.
    type Item;

    fn on_tick(&mut self, update: Self::Update);
    fn is_ready(&self) -> bool;
    fn drain(&mut self) -> Vec<Self::Item>;
    fn len(&self) -> usize;
}

// ---------------------------------------------------------------------------
// RSI: fire on a closed kline once more than `period` closes are buffered
// ---------------------------------------------------------------------------

/// Buffers every kline update (open or closed) and becomes ready when the
/// latest update closed the candle and strictly more than `period` samples
/// are held.
///
/// The window keeps `period + 1` samples. Older ones are evicted on push,
/// which never affects the result because only the newest `period` samples
/// feed the indicator.
#[derive(Debug)]
pub struct RsiAggregator {
    window: RollingWindow<PriceSample>,
    period: usize,
    close_pending: bool,
}

impl RsiAggregator {
    pub fn new(period: usize) -> Self {
        Self {
            window: RollingWindow::new(period + 1),
            period,
            close_pending: false,
        }
    }
}

impl CandleAggregator for RsiAggregator {
    type Update = KlineUpdate;
    type Item = PriceSample;

    fn on_tick(&mut self, update: KlineUpdate) {
        self.window.push(update.sample);
        self.close_pending = update.is_closed;
    }

    fn is_ready(&self) -> bool {
        self.close_pending && self.window.len() > self.period
    }

    fn drain(&mut self) -> Vec<PriceSample> {
        self.close_pending = false;
        self.window.drain()
    }

    fn len(&self) -> usize {
        self.window.len()
    }
}

// ---------------------------------------------------------------------------
// VWAP: fire on exactly `batch_size` candles
// ---------------------------------------------------------------------------

/// Buffers candles and becomes ready when exactly `batch_size` are held.
#[derive(Debug)]
pub struct VwapAggregator {
    window: RollingWindow<CandleRecord>,
    batch_size: usize,
}

impl VwapAggregator {
    pub fn new(batch_size: usize) -> Self {
        Self {
            window: RollingWindow::new(batch_size),
            batch_size,
        }
    }
}

impl CandleAggregator for VwapAggregator {
    type Update = CandleRecord;
    type Item = CandleRecord;

    fn on_tick(&mut self, candle: CandleRecord) {
        self.window.push(candle);
    }

    fn is_ready(&self) -> bool {
        self.window.len() == self.batch_size
    }

    fn drain(&mut self) -> Vec<CandleRecord> {
        self.window.drain()
    }

    fn len(&self) -> usize {
        self.window.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kline(i: i64, close: f64, is_closed: bool) -> KlineUpdate {
        KlineUpdate {
            sample: PriceSample {
                timestamp: i * 300_000,
                close,
            },
            is_closed,
        }
    }

    fn candle(i: i64) -> CandleRecord {
        CandleRecord {
            timestamp: i * 60_000,
            open: 100.0,
            close: 100.0,
            high: 100.0,
            low: 100.0,
            volume: 1.0,
        }
    }

    #[test]
    fn rsi_needs_more_than_period_samples() {
        let mut agg = RsiAggregator::new(14);
        for i in 0..13 {
            agg.on_tick(kline(i, 100.0 + i as f64, false));
        }
        // 14th sample closes the candle but 14 is not > 14.
        agg.on_tick(kline(13, 113.0, true));
        assert_eq!(agg.len(), 14);
        assert!(!agg.is_ready());

        agg.on_tick(kline(14, 114.0, true));
        assert!(agg.is_ready());
    }

    #[test]
    fn rsi_needs_the_close_flag() {
        let mut agg = RsiAggregator::new(14);
        for i in 0..20 {
            agg.on_tick(kline(i, 100.0, false));
        }
        assert!(!agg.is_ready());
        assert_eq!(agg.len(), 15, "window is capped at period + 1");
    }

    #[test]
    fn rsi_close_flag_only_counts_for_the_latest_update() {
        let mut agg = RsiAggregator::new(2);
        agg.on_tick(kline(0, 1.0, false));
        agg.on_tick(kline(1, 2.0, true));
        agg.on_tick(kline(2, 3.0, false));
        assert!(!agg.is_ready());
    }

    #[test]
    fn rsi_drain_clears_buffer_and_pending_close() {
        let mut agg = RsiAggregator::new(14);
        for i in 0..15 {
            agg.on_tick(kline(i, 100.0 + i as f64, i == 14));
        }
        assert!(agg.is_ready());

        let drained = agg.drain();
        assert_eq!(drained.len(), 15);
        assert_eq!(drained.last().map(|s| s.close), Some(114.0));
        assert_eq!(agg.len(), 0);
        assert!(!agg.is_ready());
    }

    #[test]
    fn rsi_evicted_samples_are_the_oldest() {
        let mut agg = RsiAggregator::new(3);
        for i in 0..10 {
            agg.on_tick(kline(i, i as f64, i == 9));
        }
        let closes: Vec<f64> = agg.drain().iter().map(|s| s.close).collect();
        assert_eq!(closes, vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn vwap_ready_at_exactly_batch_size() {
        let mut agg = VwapAggregator::new(10);
        for i in 0..9 {
            agg.on_tick(candle(i));
            assert!(!agg.is_ready());
        }
        agg.on_tick(candle(9));
        assert!(agg.is_ready());

        let drained = agg.drain();
        assert_eq!(drained.len(), 10);
        assert_eq!(agg.len(), 0);
        assert!(!agg.is_ready());
    }
}
