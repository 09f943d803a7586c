//! Indicator library.
//!
//! Every indicator implements [`Indicator`]: candle history in, a numeric
//! series of the same length out, `NaN` wherever the trailing window is not
//! yet filled. [`frame::IndicatorFrame`] precomputes the series a strategy
//! needs and hands out per-candle [`frame::Snapshot`]s.
//!
//! Multi-series indicators (Bollinger, channel) are exposed as separate
//! instances per output, keeping the single-series trait unchanged.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod channel;
pub mod ema;
pub mod frame;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use adx::Adx;
pub use atr::AtrProxy;
pub use bollinger::{Bollinger, BollingerSeries};
pub use channel::{Channel, ChannelBound};
pub use ema::AdjustedEma;
pub use frame::{IndicatorFrame, IndicatorSpec, Snapshot};
pub use macd::{Macd, MacdOutput};
pub use rsi::Rsi;
pub use sma::Sma;

use crate::domain::Candle;

/// Denominator guard shared by RSI and ADX.
pub const EPSILON: f64 = 1e-8;

/// Trait for indicators.
///
/// The first `lookback()` values of `compute` are `f64::NAN` (warmup).
///
/// # Look-ahead guard
/// No value at index t may depend on candles after t. Every indicator must
/// pass the truncated-vs-full series test.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "rsi_14").
    fn name(&self) -> &str;

    /// Index of the first defined output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire candle series.
    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

/// Extract the close series.
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Latest value of a series, `None` when empty or undefined.
pub fn last_defined(series: &[f64]) -> Option<f64> {
    series.last().copied().filter(|v| v.is_finite())
}

/// Create synthetic candles from close prices for testing.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<Candle> {
    crate::domain::candle::make_candles(closes)
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
