// =============================================================================
// Volume-Weighted Average Price (VWAP) over one batch of candles
// =============================================================================
//
// VWAP = Σ(close_i × volume_i) / Σ(volume_i)
//
// Cumulative over exactly the candles passed in; there is no moving state
// between batches.
// =============================================================================

use crate::error::IndicatorError;
use crate::types::CandleRecord;

/// Compute VWAP using each candle's close as its price.
///
/// Returns `ZeroVolume` rather than NaN/Inf when the batch traded nothing.
pub fn compute_vwap(candles: &[CandleRecord]) -> Result<f64, IndicatorError> {
    if candles.is_empty() {
        return Err(IndicatorError::EmptyWindow);
    }

    let (sum_price_volume, total_volume) = candles
        .iter()
        .fold((0.0_f64, 0.0_f64), |(pv, v), c| {
            (pv + c.close * c.volume, v + c.volume)
        });

    if total_volume == 0.0 {
        return Err(IndicatorError::ZeroVolume);
    }

    Ok(sum_price_volume / total_volume)
}
