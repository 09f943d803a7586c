//! MACD: difference of two adjusted span EMAs of close.
//!
//! line      = EMA(fast) - EMA(slow)
//! signal    = EMA(line, signal_span)
//! histogram = line - signal
//!
//! The EMAs are bias-adjusted and therefore defined from the first sample,
//! but values are reported only once `slow` candles exist.
//! Lookback: slow - 1.

use super::ema::adjusted_ema_of_series;
use super::Indicator;
use crate::domain::Candle;

/// Which MACD output to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdOutput {
    Line,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    output: MacdOutput,
    name: String,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, output: MacdOutput) -> Self {
        assert!(fast >= 1 && slow >= 1 && signal >= 1, "MACD spans must be >= 1");
        assert!(fast < slow, "MACD fast span must be below slow span");
        let tag = match output {
            MacdOutput::Line => "line",
            MacdOutput::Signal => "signal",
            MacdOutput::Histogram => "hist",
        };
        Self {
            fast,
            slow,
            signal,
            output,
            name: format!("macd_{tag}_{fast}_{slow}_{signal}"),
        }
    }

    pub fn histogram(fast: usize, slow: usize, signal: usize) -> Self {
        Self::new(fast, slow, signal, MacdOutput::Histogram)
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.slow - 1
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let ema_fast = adjusted_ema_of_series(&closes, self.fast);
        let ema_slow = adjusted_ema_of_series(&closes, self.slow);
        let line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();

        let mut result = match self.output {
            MacdOutput::Line => line,
            MacdOutput::Signal => adjusted_ema_of_series(&line, self.signal),
            MacdOutput::Histogram => {
                let signal = adjusted_ema_of_series(&line, self.signal);
                line.iter().zip(&signal).map(|(l, s)| l - s).collect()
            }
        };
        for v in result.iter_mut().take(self.lookback()) {
            *v = f64::NAN;
        }
        result
    }
}
