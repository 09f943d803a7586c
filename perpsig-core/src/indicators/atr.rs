//! ATR proxy: mean absolute close-to-close change.
//!
//! A simplified true range that needs closes only. Used by the Breakout and
//! Trend strategies and by the risk sizer. ADX keeps its own high/low/close
//! true range (see [`true_range`]).
//!
//! Lookback: period (needs period + 1 closes). The whole-series form
//! averages every difference seen so far, so its newest value is the mean
//! over the full fetched history.

use super::sma::rolling_mean;
use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct AtrProxy {
    /// `None` averages over the whole series.
    period: Option<usize>,
    name: String,
}

impl AtrProxy {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period: Some(period),
            name: format!("atr_proxy_{period}"),
        }
    }

    pub fn whole_series() -> Self {
        Self {
            period: None,
            name: "atr_proxy_all".to_string(),
        }
    }

    /// Rolling form for `Some(period)`, whole-series form for `None`.
    pub fn from_window(period: Option<usize>) -> Self {
        match period {
            Some(p) => Self::new(p),
            None => Self::whole_series(),
        }
    }
}

impl Indicator for AtrProxy {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.unwrap_or(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut abs_changes = vec![f64::NAN; n];
        for i in 1..n {
            abs_changes[i] = (candles[i].close - candles[i - 1].close).abs();
        }
        match self.period {
            Some(period) => rolling_mean(&abs_changes, period),
            None => expanding_mean(&abs_changes),
        }
    }
}

/// Mean of `values[1..=i]` at each `i`; index 0 has no difference yet.
fn expanding_mean(values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    let mut sum = 0.0;
    for i in 1..values.len() {
        sum += values[i];
        out[i] = sum / i as f64;
    }
    out
}

/// High/low/previous-close true range. Index 0 uses high - low.
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let hl = c.high - c.low;
            if i == 0 {
                return hl;
            }
            let prev_close = candles[i - 1].close;
            hl.max((c.high - prev_close).abs())
                .max((c.low - prev_close).abs())
        })
        .collect()
}
