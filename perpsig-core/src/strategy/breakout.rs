//! Channel breakout confirmed by MACD momentum and an RSI guard.
//!
//! Long: price > rolling high of the slow series AND MACD histogram > 0 AND
//! RSI < rsi_hi. Short mirrors with the rolling low, histogram < 0 and
//! RSI > rsi_lo.

use super::{RequiredLen, SignalStrategy, StrategyParams};
use crate::domain::Decision;
use crate::indicators::Snapshot;

#[derive(Debug, Clone, Default)]
pub struct Breakout;

impl SignalStrategy for Breakout {
    fn name(&self) -> &str {
        "breakout"
    }

    fn required_len(&self, params: &StrategyParams) -> RequiredLen {
        RequiredLen {
            fast: (params.rsi_period + 1).max(params.atr_lookback() + 1),
            slow: params.macd_slow.max(params.channel_window),
        }
    }

    fn classify(&self, s: &Snapshot, params: &StrategyParams) -> Decision {
        let (Some(price), Some(high), Some(low), Some(hist), Some(rsi)) =
            (s.price, s.channel_high, s.channel_low, s.macd_histogram, s.rsi)
        else {
            return Decision::Wait;
        };

        let long = price > high && hist > 0.0 && rsi < params.rsi_hi;
        let short = price < low && hist < 0.0 && rsi > params.rsi_lo;
        Decision::from_conditions(long, short)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(price: f64, hist: f64, rsi: f64) -> Snapshot {
        Snapshot {
            price: Some(price),
            channel_high: Some(105.0),
            channel_low: Some(95.0),
            macd_histogram: Some(hist),
            rsi: Some(rsi),
            ..Default::default()
        }
    }

    #[test]
    fn long_above_channel_with_momentum() {
        let d = Breakout.classify(&snap(110.0, 0.5, 50.0), &StrategyParams::default());
        assert_eq!(d, Decision::Long);
    }

    #[test]
    fn overbought_blocks_long() {
        let d = Breakout.classify(&snap(110.0, 0.5, 75.0), &StrategyParams::default());
        assert_eq!(d, Decision::Wait);
    }

    #[test]
    fn short_below_channel() {
        let d = Breakout.classify(&snap(90.0, -0.5, 50.0), &StrategyParams::default());
        assert_eq!(d, Decision::Short);
    }

    #[test]
    fn histogram_must_agree() {
        let d = Breakout.classify(&snap(110.0, -0.5, 50.0), &StrategyParams::default());
        assert_eq!(d, Decision::Wait);
    }

    #[test]
    fn price_equal_to_high_waits() {
        let d = Breakout.classify(&snap(105.0, 0.5, 50.0), &StrategyParams::default());
        assert_eq!(d, Decision::Wait);
    }

    #[test]
    fn missing_input_waits() {
        let mut s = snap(110.0, 0.5, 50.0);
        s.rsi = None;
        assert_eq!(Breakout.classify(&s, &StrategyParams::default()), Decision::Wait);
    }

    #[test]
    fn required_len_defaults() {
        let req = Breakout.required_len(&StrategyParams::default());
        assert_eq!(req, RequiredLen { fast: 15, slow: 26 });
    }
}
