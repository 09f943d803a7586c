//! ADX: directional movement strength over simple trailing means.
//!
//! Steps:
//! 1. +DM and -DM from consecutive candles
//! 2. Trailing `period` means of +DM, -DM and the high/low/close true range
//! 3. +DI = 100 * mean(+DM) / (mean(TR) + eps), -DI likewise
//! 4. ADX = 100 * |+DI - -DI| / (+DI + -DI + eps)
//!
//! No second smoothing pass is applied to the DX.
//! Lookback: period (needs period + 1 candles).

use super::atr::true_range;
use super::sma::rolling_mean;
use super::{Indicator, EPSILON};
use crate::domain::Candle;

#[derive(Debug, Clone)]
pub struct Adx {
    period: usize,
    name: String,
}

impl Adx {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ADX period must be >= 1");
        Self {
            period,
            name: format!("adx_{period}"),
        }
    }
}

impl Indicator for Adx {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        if n < 2 {
            return vec![f64::NAN; n];
        }

        let mut plus_dm = vec![f64::NAN; n];
        let mut minus_dm = vec![f64::NAN; n];
        for i in 1..n {
            let up = candles[i].high - candles[i - 1].high;
            let down = candles[i - 1].low - candles[i].low;
            plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
            minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
        }

        // TR at index 0 has no previous close; exclude it from the window.
        let mut tr = true_range(candles);
        tr[0] = f64::NAN;

        let mean_tr = rolling_mean(&tr, self.period);
        let mean_plus = rolling_mean(&plus_dm, self.period);
        let mean_minus = rolling_mean(&minus_dm, self.period);

        (0..n)
            .map(|i| {
                if mean_tr[i].is_nan() {
                    return f64::NAN;
                }
                let plus_di = 100.0 * mean_plus[i] / (mean_tr[i] + EPSILON);
                let minus_di = 100.0 * mean_minus[i] / (mean_tr[i] + EPSILON);
                100.0 * (plus_di - minus_di).abs() / (plus_di + minus_di + EPSILON)
            })
            .collect()
    }
}
