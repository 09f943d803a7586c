//! Look-ahead contamination tests for every indicator.
//!
//! Invariant: no indicator value at candle t may depend on candles after t.
//!
//! Method: compute on a truncated series (candles 0..100) and the full series
//! (candles 0..200). Values 0..100 must be identical between both runs.

use chrono::{DateTime, Duration};
use perpsig_core::domain::{Candle, MarketSeries};
use perpsig_core::indicators::*;
use perpsig_core::strategy::StrategyParams;

/// N candles of a deterministic pseudo-random walk.
fn make_test_candles(n: usize) -> Vec<Candle> {
    let base = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    let mut candles = Vec::with_capacity(n);
    let mut price = 100.0;

    for i in 0..n {
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
        let change = ((seed % 200) as f64 - 100.0) * 0.05;
        price = (price + change).max(10.0);

        let open = price - 0.5;
        let close = price + 0.3;
        candles.push(Candle {
            timestamp: base + Duration::minutes(i as i64),
            open,
            high: open.max(close) + 2.0,
            low: open.min(close) - 2.0,
            close,
            volume: 1000.0 + i as f64 * 100.0,
        });
    }
    candles
}

fn same(a: f64, b: f64) -> bool {
    (a.is_nan() && b.is_nan()) || a == b
}

fn assert_no_lookahead(indicator: &dyn Indicator, full: &[Candle], truncated_len: usize) {
    let truncated_result = indicator.compute(&full[..truncated_len]);
    let full_result = indicator.compute(full);

    assert_eq!(truncated_result.len(), truncated_len, "{}", indicator.name());
    assert_eq!(full_result.len(), full.len(), "{}", indicator.name());

    for i in 0..truncated_len {
        assert!(
            same(truncated_result[i], full_result[i]),
            "{}: look-ahead at candle {i}: truncated={}, full={}",
            indicator.name(),
            truncated_result[i],
            full_result[i]
        );
    }
}

#[test]
fn no_lookahead_any_indicator() {
    let candles = make_test_candles(200);
    let indicators: Vec<Box<dyn Indicator>> = vec![
        Box::new(Sma::new(5)),
        Box::new(Sma::new(20)),
        Box::new(AdjustedEma::new(12)),
        Box::new(AtrProxy::new(14)),
        Box::new(AtrProxy::whole_series()),
        Box::new(Rsi::new(14)),
        Box::new(Macd::new(12, 26, 9, MacdOutput::Line)),
        Box::new(Macd::new(12, 26, 9, MacdOutput::Signal)),
        Box::new(Macd::histogram(12, 26, 9)),
        Box::new(Bollinger::middle(20)),
        Box::new(Bollinger::stddev(20)),
        Box::new(Adx::new(14)),
        Box::new(Channel::high(20)),
        Box::new(Channel::low(20)),
    ];
    for indicator in &indicators {
        assert_no_lookahead(indicator.as_ref(), &candles, 100);
    }
}

#[test]
fn warmup_matches_lookback() {
    let candles = make_test_candles(100);
    let indicators: Vec<Box<dyn Indicator>> = vec![
        Box::new(Sma::new(20)),
        Box::new(AtrProxy::new(14)),
        Box::new(AtrProxy::whole_series()),
        Box::new(Rsi::new(14)),
        Box::new(Macd::histogram(12, 26, 9)),
        Box::new(Bollinger::stddev(20)),
        Box::new(Adx::new(14)),
        Box::new(Channel::high(20)),
    ];
    for indicator in &indicators {
        let values = indicator.compute(&candles);
        let lookback = indicator.lookback();
        assert!(
            values[..lookback].iter().all(|v| v.is_nan()),
            "{}: defined before lookback {lookback}",
            indicator.name()
        );
        assert!(
            values[lookback..].iter().all(|v| v.is_finite()),
            "{}: undefined after lookback {lookback}",
            indicator.name()
        );
    }
}

#[test]
fn snapshots_ignore_future_candles() {
    let candles = make_test_candles(200);
    let spec = StrategyParams::default().windows();
    let full = IndicatorFrame::compute(MarketSeries::single(&candles), spec);
    let truncated = IndicatorFrame::compute(MarketSeries::single(&candles[..100]), spec);
    for i in [30, 60, 99] {
        assert_eq!(full.snapshot_at(i), truncated.snapshot_at(i), "candle {i}");
    }
}
