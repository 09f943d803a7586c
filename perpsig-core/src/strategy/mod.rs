//! Signal classification: pluggable strategies over an indicator snapshot.
//!
//! Strategies are stateless and portfolio-agnostic: they see candles and
//! parameters, never positions or equity. The decision is made from a
//! [`Snapshot`]; any undefined input yields [`Decision::Wait`], as does a
//! bar where both the long and short conditions hold.

pub mod band_adx;
pub mod breakout;
pub mod factory;
pub mod trend;

pub use band_adx::BandAdx;
pub use breakout::Breakout;
pub use factory::{create_strategy, StrategyKind};
pub use trend::Trend;

use crate::domain::{Decision, MarketSeries, Signal};
use crate::indicators::{IndicatorFrame, IndicatorSpec, Snapshot};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Thresholds and window sizes shared by all strategies.
///
/// Each strategy reads the subset it needs. Owned per symbol by the
/// parameter book; immutable for a live session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub channel_window: usize,
    pub ma_short: usize,
    pub ma_long: usize,
    pub band_period: usize,
    pub band_mult: f64,
    pub rsi_period: usize,
    pub rsi_hi: f64,
    pub rsi_lo: f64,
    pub adx_period: usize,
    pub adx_threshold: f64,
    /// Trailing ATR window in differences. Unset averages every difference
    /// in the fetched fast series.
    pub atr_period: Option<usize>,
    pub trend_atr_mult: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            channel_window: 20,
            ma_short: 5,
            ma_long: 20,
            band_period: 20,
            band_mult: 2.0,
            rsi_period: 14,
            rsi_hi: 70.0,
            rsi_lo: 30.0,
            adx_period: 14,
            adx_threshold: 25.0,
            atr_period: None,
            trend_atr_mult: 2.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
        }
    }
}

impl StrategyParams {
    /// The window sizes, i.e. what determines the indicator series.
    pub fn windows(&self) -> IndicatorSpec {
        IndicatorSpec {
            atr_period: self.atr_period,
            rsi_period: self.rsi_period,
            macd_fast: self.macd_fast,
            macd_slow: self.macd_slow,
            macd_signal: self.macd_signal,
            channel_window: self.channel_window,
            band_period: self.band_period,
            adx_period: self.adx_period,
            ma_short: self.ma_short,
            ma_long: self.ma_long,
        }
    }

    /// Differences the ATR proxy needs before it is defined.
    pub fn atr_lookback(&self) -> usize {
        self.atr_period.unwrap_or(1)
    }

    /// Every violated constraint, empty when the set is usable.
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        let windows = [
            ("channel_window", self.channel_window),
            ("ma_short", self.ma_short),
            ("ma_long", self.ma_long),
            ("band_period", self.band_period),
            ("rsi_period", self.rsi_period),
            ("adx_period", self.adx_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
        ];
        for (name, value) in windows {
            if value == 0 {
                out.push(format!("{name} must be >= 1"));
            }
        }
        if self.atr_period == Some(0) {
            out.push("atr_period must be >= 1 when set".to_string());
        }
        if self.macd_fast >= self.macd_slow {
            out.push(format!(
                "macd_fast ({}) must be below macd_slow ({})",
                self.macd_fast, self.macd_slow
            ));
        }
        if self.ma_short >= self.ma_long {
            out.push(format!(
                "ma_short ({}) must be below ma_long ({})",
                self.ma_short, self.ma_long
            ));
        }
        if !(0.0..=100.0).contains(&self.rsi_lo)
            || !(0.0..=100.0).contains(&self.rsi_hi)
            || self.rsi_lo >= self.rsi_hi
        {
            out.push(format!(
                "rsi thresholds must satisfy 0 <= rsi_lo ({}) < rsi_hi ({}) <= 100",
                self.rsi_lo, self.rsi_hi
            ));
        }
        if !(self.band_mult.is_finite() && self.band_mult > 0.0) {
            out.push(format!("band_mult must be positive, got {}", self.band_mult));
        }
        if !(self.trend_atr_mult.is_finite() && self.trend_atr_mult >= 0.0) {
            out.push(format!(
                "trend_atr_mult must be non-negative, got {}",
                self.trend_atr_mult
            ));
        }
        if !self.adx_threshold.is_finite() {
            out.push("adx_threshold must be finite".to_string());
        }
        out
    }
}

/// Minimum candle counts per series before a strategy can decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredLen {
    pub fast: usize,
    pub slow: usize,
}

/// Trait for signal strategies.
pub trait SignalStrategy: Send + Sync {
    /// Human-readable name (e.g., "breakout").
    fn name(&self) -> &str;

    /// Shortest fast/slow series that can produce a defined decision.
    /// A slow requirement of 0 means the slow series is not read.
    fn required_len(&self, params: &StrategyParams) -> RequiredLen;

    /// Decide from one snapshot. Must return `Wait` for any missing input.
    fn classify(&self, snapshot: &Snapshot, params: &StrategyParams) -> Decision;

    /// Evaluate the newest fast candle of `series`.
    fn evaluate(&self, symbol: &str, series: MarketSeries<'_>, params: &StrategyParams) -> Signal {
        self.assess(symbol, series, params).0
    }

    /// Like [`evaluate`](Self::evaluate), also returning the snapshot the
    /// decision was made from (all-`None` when history was insufficient).
    fn assess(
        &self,
        symbol: &str,
        series: MarketSeries<'_>,
        params: &StrategyParams,
    ) -> (Signal, Snapshot) {
        let (price, timestamp) = match series.fast.last() {
            Some(c) => (c.close, c.timestamp),
            None => (f64::NAN, Utc::now()),
        };

        let required = self.required_len(params);
        if series.fast.len() < required.fast || series.slow.len() < required.slow {
            debug!(
                symbol,
                strategy = self.name(),
                fast = series.fast.len(),
                slow = series.slow.len(),
                need_fast = required.fast,
                need_slow = required.slow,
                "insufficient history, waiting"
            );
            return (Signal::wait(symbol, price, timestamp), Snapshot::default());
        }

        let snapshot = IndicatorFrame::compute(series, params.windows()).latest();
        let signal = Signal {
            symbol: symbol.to_string(),
            decision: self.classify(&snapshot, params),
            reference_price: price,
            timestamp,
        };
        (signal, snapshot)
    }
}
