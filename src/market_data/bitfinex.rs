// =============================================================================
// Bitfinex candle channel decoding
// =============================================================================
//
// Channel frames are JSON arrays: `[CHAN_ID, PAYLOAD]`.
//   update    => PAYLOAD = [MTS, OPEN, CLOSE, HIGH, LOW, VOLUME]
//   snapshot  => PAYLOAD = [[MTS, ...], [MTS, ...], ...]
//   heartbeat => PAYLOAD = "hb"
// Control frames (info, subscribed, error) are JSON objects with `event`.
// =============================================================================

use serde_json::Value;
use tracing::{debug, info};

use crate::error::FeedError;
use crate::types::{CandleRecord, FeedKind};

/// Public v2 WebSocket endpoint.
pub const PUBLIC_WS_URL: &str = "wss://api-pub.bitfinex.com/ws/2";

/// Candle key the feed subscribes to by default.
pub const DEFAULT_CANDLE_KEY: &str = "trade:1m:tBTCUSD";

/// Subscription control message for a candle `key`.
///
/// For the default key this yields exactly
/// `{"event":"subscribe","channel":"candles","key":"trade:1m:tBTCUSD"}`.
pub fn subscribe_message(key: &str) -> String {
    format!(r#"{{"event":"subscribe","channel":"candles","key":"{key}"}}"#)
}

/// Decode one frame from the candle channel.
///
/// Returns `Ok(None)` for frames that carry no new candle (control events,
/// heartbeats, the initial snapshot) and `Err` for anything unrecognised.
pub fn parse_candle_message(text: &str) -> Result<Option<CandleRecord>, FeedError> {
    let root: Value = serde_json::from_str(text)
        .map_err(|e| FeedError::parse(FeedKind::Vwap, format!("invalid JSON: {e}")))?;

    match root {
        Value::Object(ref obj) => match obj.get("event").and_then(Value::as_str) {
            Some("error") => {
                let msg = obj.get("msg").and_then(Value::as_str).unwrap_or("unknown");
                Err(FeedError::parse(
                    FeedKind::Vwap,
                    format!("exchange error event: {msg}"),
                ))
            }
            Some("subscribed") => {
                let key = obj.get("key").and_then(Value::as_str).unwrap_or_default();
                let chan_id = obj.get("chanId").and_then(Value::as_i64).unwrap_or_default();
                info!(key, chan_id, "Bitfinex candle subscription confirmed");
                Ok(None)
            }
            Some(event) => {
                debug!(event = %event, "Bitfinex control event");
                Ok(None)
            }
            None => Err(FeedError::parse(FeedKind::Vwap, "object without event")),
        },
        Value::Array(frame) => parse_channel_frame(&frame),
        _ => Err(FeedError::parse(FeedKind::Vwap, "unexpected JSON type")),
    }
}

fn parse_channel_frame(frame: &[Value]) -> Result<Option<CandleRecord>, FeedError> {
    let [_chan_id, payload] = frame else {
        return Err(FeedError::parse(
            FeedKind::Vwap,
            format!("channel frame has {} elements, expected 2", frame.len()),
        ));
    };

    match payload {
        Value::String(s) if s == "hb" => Ok(None),
        Value::Array(fields) if fields.first().is_some_and(Value::is_array) => {
            debug!(candles = fields.len(), "Bitfinex snapshot skipped");
            Ok(None)
        }
        Value::Array(fields) if fields.len() == 6 => {
            let mut nums = [0.0_f64; 6];
            for (slot, field) in nums.iter_mut().zip(fields) {
                *slot = field.as_f64().ok_or_else(|| {
                    FeedError::parse(FeedKind::Vwap, "non-numeric candle field")
                })?;
            }
            let [mts, open, close, high, low, volume] = nums;
            Ok(Some(CandleRecord {
                timestamp: mts as i64,
                open,
                close,
                high,
                low,
                volume,
            }))
        }
        Value::Array(fields) => Err(FeedError::parse(
            FeedKind::Vwap,
            format!("candle has {} fields, expected 6", fields.len()),
        )),
        _ => Err(FeedError::parse(FeedKind::Vwap, "unrecognised payload")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_payload_is_bit_exact() {
        assert_eq!(
            subscribe_message(DEFAULT_CANDLE_KEY),
            r#"{"event":"subscribe","channel":"candles","key":"trade:1m:tBTCUSD"}"#
        );
    }

    #[test]
    fn parses_candle_update() {
        let json = "[343351,[1574698260000,7379.78,7380.2,7381.1,7379.5,1.7521]]";
        let candle = parse_candle_message(json).unwrap().expect("candle");
        assert_eq!(candle.timestamp, 1_574_698_260_000);
        assert_eq!(candle.open, 7379.78);
        assert_eq!(candle.close, 7380.2);
        assert_eq!(candle.high, 7381.1);
        assert_eq!(candle.low, 7379.5);
        assert_eq!(candle.volume, 1.7521);
    }

    #[test]
    fn control_frames_carry_no_candle() {
        for json in [
            r#"{"event":"info","version":2,"serverId":"abc","platform":{"status":1}}"#,
            r#"{"event":"subscribed","channel":"candles","chanId":343351,"key":"trade:1m:tBTCUSD"}"#,
            r#"[343351,"hb"]"#,
            "[343351,[[1574698260000,1,2,3,4,5],[1574698200000,1,2,3,4,5]]]",
        ] {
            assert!(parse_candle_message(json).unwrap().is_none(), "{json}");
        }
    }

    #[test]
    fn rejects_malformed_frames() {
        for json in [
            r#"{"event":"error","msg":"symbol: invalid","code":10300}"#,
            r#"{"foo":1}"#,
            "[343351]",
            "[343351,[1,2,3,4,5,6],99]",
            r#"[343351,"hb","extra"]"#,
            "[343351,[1,2,3,4,5]]",
            r#"[343351,[1,2,"x",4,5,6]]"#,
            "[343351,42]",
            "42",
            "{",
        ] {
            let err = parse_candle_message(json).unwrap_err();
            assert!(matches!(err, FeedError::Parse { feed: FeedKind::Vwap, .. }), "{json}");
        }
    }
}
