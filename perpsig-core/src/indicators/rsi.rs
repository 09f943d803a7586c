//! Relative Strength Index (RSI), simple-average form.
//!
//! Over the trailing `period` close-to-close changes:
//! RSI = 100 - 100 / (1 + mean(gains) / (mean(losses) + 1e-8))
//! Lookback: period. A window with no losses saturates near 100; a flat
//! window gives 0.

use super::sma::rolling_mean;
use super::{Indicator, EPSILON};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut gains = vec![f64::NAN; n];
        let mut losses = vec![f64::NAN; n];
        for i in 1..n {
            let change = candles[i].close - candles[i - 1].close;
            gains[i] = change.max(0.0);
            losses[i] = (-change).max(0.0);
        }

        let avg_gain = rolling_mean(&gains, self.period);
        let avg_loss = rolling_mean(&losses, self.period);
        avg_gain
            .iter()
            .zip(&avg_loss)
            .map(|(&g, &l)| {
                if g.is_nan() || l.is_nan() {
                    f64::NAN
                } else {
                    100.0 - 100.0 / (1.0 + g / (l + EPSILON))
                }
            })
            .collect()
    }
}
