// =============================================================================
// Relative Strength Index (RSI): single-window simple averages
// =============================================================================
//
// Step 1. Compute price changes (deltas) from consecutive closes.
// Step 2. Average the first `period` gains and the first `period` losses.
//         When fewer than `period` deltas exist the mean is taken over the
//         ones available.
// Step 3. RS  = avg_gain / (avg_loss + RSI_EPSILON)
//         RSI = 100 - 100 / (1 + RS)
//
// No Wilder smoothing: one call produces one value for one drained window.
// =============================================================================

use crate::error::IndicatorError;

/// Added to the average loss so a window without losses does not divide by
/// zero. All-gain windows therefore land just below 100.
pub const RSI_EPSILON: f64 = 1e-5;

/// Compute one RSI value over `closes`.
///
/// # Edge cases
/// - fewer than two closes => `InsufficientData` (no delta to look at)
/// - `period == 0` => `InvalidPeriod`
/// - flat or strictly falling input => exactly `0.0`
pub fn compute_rsi(closes: &[f64], period: usize) -> Result<f64, IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod);
    }
    if closes.len() < 2 {
        return Err(IndicatorError::InsufficientData {
            needed: 2,
            got: closes.len(),
        });
    }

    let counted = (closes.len() - 1).min(period);
    let (sum_gain, sum_loss) = closes
        .windows(2)
        .map(|w| w[1] - w[0])
        .take(period)
        .fold((0.0_f64, 0.0_f64), |(g, l), d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

    let avg_gain = sum_gain / counted as f64;
    let avg_loss = sum_loss / counted as f64;

    let rs = avg_gain / (avg_loss + RSI_EPSILON);
    Ok(100.0 - 100.0 / (1.0 + rs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_rejects_short_input() {
        assert_eq!(
            compute_rsi(&[], 14),
            Err(IndicatorError::InsufficientData { needed: 2, got: 0 })
        );
        assert_eq!(
            compute_rsi(&[42.0], 14),
            Err(IndicatorError::InsufficientData { needed: 2, got: 1 })
        );
    }

    #[test]
    fn rsi_period_zero() {
        assert_eq!(compute_rsi(&[1.0, 2.0], 0), Err(IndicatorError::InvalidPeriod));
    }

    #[test]
    fn rsi_all_gains_is_just_below_100() {
        for len in [2_usize, 5, 14, 30] {
            let closes: Vec<f64> = (0..len).map(|x| 100.0 + x as f64).collect();
            let v = compute_rsi(&closes, 14).unwrap();
            assert!(v > 99.99 && v < 100.0, "len {len}: got {v}");
        }
    }

    #[test]
    fn rsi_all_losses_is_exactly_zero() {
        for len in [2_usize, 5, 14, 30] {
            let closes: Vec<f64> = (0..len).rev().map(|x| 100.0 + x as f64).collect();
            assert_eq!(compute_rsi(&closes, 14).unwrap(), 0.0, "len {len}");
        }
    }

    #[test]
    fn rsi_flat_market_is_zero() {
        // No gains at all, so RS is zero regardless of the epsilon.
        assert_eq!(compute_rsi(&[100.0; 14], 14).unwrap(), 0.0);
    }

    #[test]
    fn rsi_averages_only_first_period_deltas() {
        // Deltas: +2, -1, then a huge drop outside the 2-delta period.
        let closes = [10.0, 12.0, 11.0, 1.0];
        let v = compute_rsi(&closes, 2).unwrap();
        let rs = 1.0 / (0.5 + RSI_EPSILON);
        let expected = 100.0 - 100.0 / (1.0 + rs);
        assert!((v - expected).abs() < 1e-12, "got {v}, expected {expected}");
    }

    #[test]
    fn rsi_short_window_averages_available_deltas() {
        // 14 closes give 13 deltas; the mean is over those 13.
        let mut closes: Vec<f64> = (0..13).map(|x| 100.0 + x as f64).collect();
        closes.push(closes[12] - 13.0);
        let v = compute_rsi(&closes, 14).unwrap();
        // avg_gain = 12/13, avg_loss = 13/13.
        let rs = (12.0 / 13.0) / (1.0 + RSI_EPSILON);
        let expected = 100.0 - 100.0 / (1.0 + rs);
        assert!((v - expected).abs() < 1e-12, "got {v}, expected {expected}");
    }

    #[test]
    fn rsi_range_check() {
        let closes = [
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            44.18, 44.22,
        ];
        let v = compute_rsi(&closes, 14).unwrap();
        assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
    }
}
