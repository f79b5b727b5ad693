// =============================================================================
// Binance kline decoding
// =============================================================================

use serde_json::Value;

use crate::error::FeedError;
use crate::types::{FeedKind, KlineUpdate, PriceSample};

/// Build the single-stream kline URL for `symbol` at `interval`.
pub fn kline_stream_url(symbol: &str, interval: &str) -> String {
    let lower = symbol.to_lowercase();
    format!("wss://stream.binance.com:9443/ws/{lower}@kline_{interval}")
}

/// Parse one kline message into the close price and closed flag.
///
/// Accepts both the single-stream payload and the combined-stream envelope:
/// ```json
/// { "e": "kline", "E": 1700000000123, "s": "BTCUSDT", "k": { "t": 1700000000000, "c": "37020.00", "x": false, ... } }
/// { "stream": "btcusdt@kline_5m", "data": { "e": "kline", "k": { ... } } }
/// ```
///
/// Only `k.c` and `k.x` are required. The timestamp is the kline open time
/// `k.t`, falling back to the event time `E`.
pub fn parse_kline_update(text: &str) -> Result<KlineUpdate, FeedError> {
    let root: Value = serde_json::from_str(text)
        .map_err(|e| FeedError::parse(FeedKind::Rsi, format!("invalid JSON: {e}")))?;

    let data = if root.get("data").is_some() {
        &root["data"]
    } else {
        &root
    };

    let k = data
        .get("k")
        .filter(|k| k.is_object())
        .ok_or_else(|| FeedError::parse(FeedKind::Rsi, "missing field k"))?;

    let close = parse_string_f64(&k["c"], "k.c")?;
    let is_closed = k["x"]
        .as_bool()
        .ok_or_else(|| FeedError::parse(FeedKind::Rsi, "missing field k.x"))?;

    let timestamp = k["t"]
        .as_i64()
        .or_else(|| data["E"].as_i64())
        .unwrap_or_default();

    Ok(KlineUpdate {
        sample: PriceSample { timestamp, close },
        is_closed,
    })
}

/// Binance sends numeric values as JSON strings inside kline objects.
fn parse_string_f64(val: &Value, name: &str) -> Result<f64, FeedError> {
    let parsed = match val {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        Value::Null => {
            return Err(FeedError::parse(FeedKind::Rsi, format!("missing field {name}")))
        }
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| FeedError::parse(FeedKind::Rsi, format!("field {name} is not a valid number")))
}
