//! Bollinger-style bands.
//!
//! Two series (separate Indicator instances):
//! - Middle: SMA(close, period)
//! - StdDev: population stddev(close, period)
//!
//! The band multiplier is applied at classification time (see [`bands`]) so
//! one precomputed pair serves every multiplier in an optimizer grid.
//! Lookback: period - 1.

use super::sma::rolling_mean;
use super::Indicator;
use crate::domain::Candle;

/// Which Bollinger series to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerSeries {
    Middle,
    StdDev,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    series: BollingerSeries,
    name: String,
}

impl Bollinger {
    pub fn middle(period: usize) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            period,
            series: BollingerSeries::Middle,
            name: format!("bollinger_middle_{period}"),
        }
    }

    pub fn stddev(period: usize) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            period,
            series: BollingerSeries::StdDev,
            name: format!("bollinger_stddev_{period}"),
        }
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let means = rolling_mean(&closes, self.period);
        if self.series == BollingerSeries::Middle {
            return means;
        }

        let mut result = vec![f64::NAN; closes.len()];
        for (i, &mean) in means.iter().enumerate() {
            if mean.is_nan() {
                continue;
            }
            let window = &closes[(i + 1 - self.period)..=i];
            let variance =
                window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / self.period as f64;
            result[i] = variance.sqrt();
        }
        result
    }
}

/// Upper and lower band for a multiplier.
pub fn bands(middle: f64, stddev: f64, multiplier: f64) -> (f64, f64) {
    (middle + multiplier * stddev, middle - multiplier * stddev)
}
