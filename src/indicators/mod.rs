// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator math. Every public function returns
// `Result<f64, IndicatorError>` so callers handle insufficient-data and
// numerical edge cases explicitly instead of receiving NaN/Inf.

pub mod rsi;
pub mod vwap;

pub use rsi::compute_rsi;
pub use vwap::compute_vwap;
