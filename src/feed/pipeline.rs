// =============================================================================
// Feed Pipeline: decode → aggregate → compute → report
// =============================================================================

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{FeedError, IndicatorError};
use crate::indicators::{compute_rsi, compute_vwap};
use crate::market_data::aggregator::{CandleAggregator, RsiAggregator, VwapAggregator};
use crate::market_data::binance::parse_kline_update;
use crate::market_data::bitfinex::{parse_candle_message, subscribe_message};
use crate::market_data::stream_client::MessageHandler;
use crate::reporting::ResultSink;
use crate::types::{CandleRecord, FeedKind, IndicatorResult, KlineUpdate, PriceSample};

type UpdateOf<F> = <<F as IndicatorFeed>::Aggregator as CandleAggregator>::Update;
type ItemOf<F> = <<F as IndicatorFeed>::Aggregator as CandleAggregator>::Item;

/// Everything exchange- and indicator-specific about one feed.
pub trait IndicatorFeed: Send + 'static {
    type Aggregator: CandleAggregator + Send + 'static;

    fn kind(&self) -> FeedKind;

    /// A fresh, empty aggregator for this feed.
    fn aggregator(&self) -> Self::Aggregator;

    /// Control message to send right after connecting, if the exchange
    /// needs one.
    fn subscription(&self) -> Option<String> {
        None
    }

    /// `Ok(None)` means a recognised frame without data.
    fn decode(&self, text: &str) -> Result<Option<UpdateOf<Self>>, FeedError>;

    fn compute(&self, window: &[ItemOf<Self>]) -> Result<IndicatorResult, IndicatorError>;
}

// ---------------------------------------------------------------------------
// RSI over Binance klines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RsiFeed {
    period: usize,
}

impl RsiFeed {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl IndicatorFeed for RsiFeed {
    type Aggregator = RsiAggregator;

    fn kind(&self) -> FeedKind {
        FeedKind::Rsi
    }

    fn aggregator(&self) -> RsiAggregator {
        RsiAggregator::new(self.period)
    }

    fn decode(&self, text: &str) -> Result<Option<KlineUpdate>, FeedError> {
        parse_kline_update(text).map(Some)
    }

    /// RSI over the newest `period` closes of the drained window, the
    /// triggering close included.
    fn compute(&self, window: &[PriceSample]) -> Result<IndicatorResult, IndicatorError> {
        let last = window.last().ok_or(IndicatorError::EmptyWindow)?;
        let start = window.len().saturating_sub(self.period);
        let closes: Vec<f64> = window[start..].iter().map(|s| s.close).collect();
        let value = compute_rsi(&closes, self.period)?;

        Ok(IndicatorResult {
            feed: FeedKind::Rsi,
            reference_price: last.close,
            value,
            candle_timestamp: last.timestamp,
            computed_at: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// VWAP over Bitfinex candles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct VwapFeed {
    batch_size: usize,
    subscribe_key: String,
}

impl VwapFeed {
    pub fn new(batch_size: usize, subscribe_key: impl Into<String>) -> Self {
        Self {
            batch_size,
            subscribe_key: subscribe_key.into(),
        }
    }
}

impl IndicatorFeed for VwapFeed {
    type Aggregator = VwapAggregator;

    fn kind(&self) -> FeedKind {
        FeedKind::Vwap
    }

    fn aggregator(&self) -> VwapAggregator {
        VwapAggregator::new(self.batch_size)
    }

    fn subscription(&self) -> Option<String> {
        Some(subscribe_message(&self.subscribe_key))
    }

    fn decode(&self, text: &str) -> Result<Option<CandleRecord>, FeedError> {
        parse_candle_message(text)
    }

    fn compute(&self, window: &[CandleRecord]) -> Result<IndicatorResult, IndicatorError> {
        let last = window.last().ok_or(IndicatorError::EmptyWindow)?;
        let value = compute_vwap(window)?;

        Ok(IndicatorResult {
            feed: FeedKind::Vwap,
            reference_price: last.close,
            value,
            candle_timestamp: last.timestamp,
            computed_at: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// FeedPipeline
// ---------------------------------------------------------------------------

/// Message handler that owns one feed's aggregator.
///
/// The indicator runs synchronously inside `on_message`, so a computation
/// always sees every update before it and none after it.
pub struct FeedPipeline<F: IndicatorFeed> {
    feed: F,
    aggregator: F::Aggregator,
    sink: Arc<dyn ResultSink>,
}

impl<F: IndicatorFeed> FeedPipeline<F> {
    pub fn new(feed: F, sink: Arc<dyn ResultSink>) -> Self {
        let aggregator = feed.aggregator();
        Self {
            feed,
            aggregator,
            sink,
        }
    }
}

impl<F: IndicatorFeed> MessageHandler for FeedPipeline<F> {
    fn on_open(&mut self) {
        info!(feed = %self.feed.kind(), "{} websocket was opened", self.feed.kind());
    }

    fn on_message(&mut self, text: &str) {
        let update = match self.feed.decode(text) {
            Ok(Some(update)) => update,
            Ok(None) => return,
            Err(e) => {
                debug!(feed = %self.feed.kind(), error = %e, "dropping unrecognised message");
                return;
            }
        };

        self.aggregator.on_tick(update);
        if !self.aggregator.is_ready() {
            return;
        }

        let window = self.aggregator.drain();
        debug!(feed = %self.feed.kind(), samples = window.len(), "window drained");
        match self.feed.compute(&window) {
            Ok(result) => self.sink.report(&result),
            Err(e) => self.sink.report_error(self.feed.kind(), &e.into()),
        }
    }

    fn on_error(&mut self, error: &FeedError) {
        self.sink.report_error(self.feed.kind(), error);
    }

    fn on_close(&mut self) {
        info!(
            feed = %self.feed.kind(),
            buffered = self.aggregator.len(),
            "{} websocket closing",
            self.feed.kind()
        );
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::market_data::bitfinex::DEFAULT_CANDLE_KEY;

    #[derive(Default)]
    struct CollectingSink {
        results: Mutex<Vec<IndicatorResult>>,
        errors: Mutex<Vec<String>>,
    }

    impl ResultSink for CollectingSink {
        fn report(&self, result: &IndicatorResult) {
            self.results.lock().push(result.clone());
        }

        fn report_error(&self, _feed: FeedKind, error: &FeedError) {
            self.errors.lock().push(error.to_string());
        }
    }

    fn pipeline<F: IndicatorFeed>(feed: F) -> (FeedPipeline<F>, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::default());
        (FeedPipeline::new(feed, sink.clone()), sink)
    }

    fn kline(t: i64, close: f64, closed: bool) -> String {
        format!(r#"{{"e":"kline","E":{t},"s":"BTCUSDT","k":{{"t":{t},"c":"{close}","x":{closed}}}}}"#)
    }

    fn candle(t: i64, close: f64, volume: f64) -> String {
        format!("[17470,[{t},{close},{close},{close},{close},{volume}]]")
    }

    #[test]
    fn rsi_fires_once_on_the_fifteenth_closed_kline() {
        let (mut p, sink) = pipeline(RsiFeed::new(14));
        for i in 0..15 {
            p.on_message(&kline(i, 100.0 + i as f64, i == 14));
        }

        let results = sink.results.lock().clone();
        assert_eq!(results.len(), 1);
        let r = &results[0];
        assert_eq!(r.feed, FeedKind::Rsi);
        assert_eq!(r.reference_price, 114.0);
        assert_eq!(r.candle_timestamp, 14);
        assert!(r.value > 99.99 && r.value < 100.0, "got {}", r.value);
        assert_eq!(p.aggregator.len(), 0);
    }

    #[test]
    fn rsi_uses_the_newest_period_closes() {
        let (mut p, sink) = pipeline(RsiFeed::new(3));
        // Oldest close is a spike that would add a loss if it were counted.
        for (i, close) in [500.0, 10.0, 11.0, 12.0].into_iter().enumerate() {
            p.on_message(&kline(i as i64, close, i == 3));
        }
        let value = sink.results.lock()[0].value;
        assert!(value > 99.99, "got {value}");
    }

    #[test]
    fn rsi_falling_closes_report_zero() {
        let (mut p, sink) = pipeline(RsiFeed::new(14));
        for i in 0..15 {
            p.on_message(&kline(i, 200.0 - i as f64, i == 14));
        }
        assert_eq!(sink.results.lock()[0].value, 0.0);
    }

    #[test]
    fn rsi_open_updates_accumulate_until_a_close() {
        let (mut p, sink) = pipeline(RsiFeed::new(14));
        for i in 0..40 {
            p.on_message(&kline(i, 100.0, false));
        }
        assert!(sink.results.lock().is_empty());

        p.on_message(&kline(40, 101.0, true));
        assert_eq!(sink.results.lock().len(), 1);
    }

    #[test]
    fn vwap_fires_on_ten_candles() {
        let (mut p, sink) = pipeline(VwapFeed::new(10, DEFAULT_CANDLE_KEY));
        for i in 0..10 {
            p.on_message(&candle(i * 60_000, 100.0, 1.0));
        }

        let results = sink.results.lock().clone();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].feed, FeedKind::Vwap);
        assert_eq!(results[0].value, 100.0);
        assert_eq!(results[0].reference_price, 100.0);
        assert_eq!(results[0].candle_timestamp, 540_000);
        assert_eq!(p.aggregator.len(), 0);
    }

    #[test]
    fn vwap_batches_do_not_overlap() {
        let (mut p, sink) = pipeline(VwapFeed::new(2, DEFAULT_CANDLE_KEY));
        for (i, close) in [10.0, 20.0, 30.0, 50.0].into_iter().enumerate() {
            p.on_message(&candle(i as i64, close, 1.0));
        }
        let values: Vec<f64> = sink.results.lock().iter().map(|r| r.value).collect();
        assert_eq!(values, vec![15.0, 40.0]);
    }

    #[test]
    fn zero_volume_batch_is_reported_and_the_feed_continues() {
        let (mut p, sink) = pipeline(VwapFeed::new(2, DEFAULT_CANDLE_KEY));
        p.on_message(&candle(0, 100.0, 0.0));
        p.on_message(&candle(1, 101.0, 0.0));
        assert!(sink.results.lock().is_empty());
        assert_eq!(sink.errors.lock().len(), 1);
        assert_eq!(p.aggregator.len(), 0);

        p.on_message(&candle(2, 100.0, 1.0));
        p.on_message(&candle(3, 100.0, 1.0));
        assert_eq!(sink.results.lock().len(), 1);
    }

    #[test]
    fn malformed_messages_are_dropped_without_side_effects() {
        let (mut rsi, rsi_sink) = pipeline(RsiFeed::new(14));
        let (mut vwap, vwap_sink) = pipeline(VwapFeed::new(10, DEFAULT_CANDLE_KEY));

        for junk in ["", "{}", r#"{"k":{"x":true}}"#, "[1,[1,2,3]]", "garbage"] {
            rsi.on_message(junk);
            vwap.on_message(junk);
        }
        vwap.on_message(r#"{"event":"subscribed","channel":"candles","chanId":1}"#);
        vwap.on_message(r#"[1,"hb"]"#);

        assert_eq!(rsi.aggregator.len(), 0);
        assert_eq!(vwap.aggregator.len(), 0);
        assert!(rsi_sink.errors.lock().is_empty(), "parse errors are not reported");
        assert!(vwap_sink.errors.lock().is_empty());

        for i in 0..15 {
            rsi.on_message(&kline(i, 100.0 + i as f64, i == 14));
        }
        for i in 0..10 {
            vwap.on_message(&candle(i, 100.0, 1.0));
        }
        assert_eq!(rsi_sink.results.lock().len(), 1);
        assert_eq!(vwap_sink.results.lock().len(), 1);
    }

    #[test]
    fn vwap_feed_subscribes_with_its_key() {
        let feed = VwapFeed::new(10, DEFAULT_CANDLE_KEY);
        assert_eq!(
            feed.subscription().as_deref(),
            Some(r#"{"event":"subscribe","channel":"candles","key":"trade:1m:tBTCUSD"}"#)
        );
        assert_eq!(RsiFeed::new(14).subscription(), None);
    }

    #[test]
    fn transport_errors_reach_the_sink() {
        let (mut p, sink) = pipeline(RsiFeed::new(14));
        p.on_error(&FeedError::Stream(
            tokio_tungstenite::tungstenite::Error::ConnectionClosed,
        ));
        assert_eq!(sink.errors.lock().len(), 1);
    }
}
