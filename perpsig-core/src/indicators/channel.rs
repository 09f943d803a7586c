//! Rolling close channel: highest and lowest close over a trailing window.
//!
//! The window includes the current candle. Callers that need the channel
//! strictly before a reference candle read index t - 1 (see the frame).
//! Lookback: window - 1.

use super::Indicator;
use crate::domain::Candle;

/// Which channel bound to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelBound {
    High,
    Low,
}

#[derive(Debug, Clone)]
pub struct Channel {
    window: usize,
    bound: ChannelBound,
    name: String,
}

impl Channel {
    pub fn high(window: usize) -> Self {
        assert!(window >= 1, "channel window must be >= 1");
        Self {
            window,
            bound: ChannelBound::High,
            name: format!("channel_high_{window}"),
        }
    }

    pub fn low(window: usize) -> Self {
        assert!(window >= 1, "channel window must be >= 1");
        Self {
            window,
            bound: ChannelBound::Low,
            name: format!("channel_low_{window}"),
        }
    }
}

impl Indicator for Channel {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window.saturating_sub(1)
    }

    fn compute(&self, candles: &[Candle]) -> Vec<f64> {
        let n = candles.len();
        let mut result = vec![f64::NAN; n];
        if n < self.window {
            return result;
        }
        for i in (self.window - 1)..n {
            let window = candles[(i + 1 - self.window)..=i].iter().map(|c| c.close);
            result[i] = match self.bound {
                ChannelBound::High => window.fold(f64::NEG_INFINITY, f64::max),
                ChannelBound::Low => window.fold(f64::INFINITY, f64::min),
            };
        }
        result
    }
}
