//! Span-based exponential moving average with bias adjustment.
//!
//! alpha = 2 / (span + 1). Every observation from the first sample carries
//! weight (1 - alpha)^age and the sum is normalised by the total weight:
//!
//! num[t] = x[t] + (1 - alpha) * num[t-1]
//! den[t] = 1    + (1 - alpha) * den[t-1]
//! EMA[t] = num[t] / den[t]
//!
//! Defined from the first sample, so lookback is 0. NaN inputs poison the
//! rest of the series.

use super::Indicator;
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct AdjustedEma {
    span: usize,
    name: String,
}

impl AdjustedEma {
    pub fn new(span: usize) -> Self {
        assert!(span >= 1, "EMA span must be >= 1");
        Self {
            span,
            name: format!("ema_{span}"),
        }
    }
}

impl Indicator for AdjustedEma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        adjusted_ema_of_series(&closes, self.span)
    }
}

/// Adjusted EMA over a pre-extracted series. Used by MACD for the signal line.
pub fn adjusted_ema_of_series(values: &[f64], span: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if span == 0 {
        return result;
    }

    let decay = 1.0 - 2.0 / (span as f64 + 1.0);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            return result;
        }
        num = v + decay * num;
        den = 1.0 + decay * den;
        result[i] = num / den;
    }
    result
}
