//! Grid search over strategy thresholds.
//!
//! Every combination is run bar-by-bar over one historical series and
//! scored with [`crate::backtest::score`]. Indicator series are computed
//! once per distinct window set, so each combination costs O(n).
//! Combinations run on rayon; the reduction walks results in grid order and
//! keeps the first maximum, so the choice is deterministic.

use crate::backtest::{score, BacktestScore};
use perpsig_core::domain::{Candle, Decision, MarketSeries};
use perpsig_core::indicators::{IndicatorFrame, IndicatorSpec, Snapshot};
use perpsig_core::strategy::{create_strategy, StrategyKind, StrategyParams};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq)]
pub enum OptimizeError {
    #[error("grid of {combinations} x {candles} candles needs {requested} evaluations, limit is {limit}")]
    TooManyEvaluations {
        combinations: usize,
        candles: usize,
        requested: usize,
        limit: usize,
    },

    #[error("parameter grid has no valid combination")]
    EmptyGrid,

    #[error("{have} candles, the strategy needs at least {need}")]
    InsufficientHistory { have: usize, need: usize },
}

/// Discrete values per tunable parameter.
///
/// An empty axis keeps the base parameter's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub band_mult: Vec<f64>,
    pub rsi_hi: Vec<f64>,
    pub rsi_lo: Vec<f64>,
    pub adx_threshold: Vec<f64>,
    pub trend_atr_mult: Vec<f64>,
    pub channel_window: Vec<usize>,
    pub band_period: Vec<usize>,
    pub ma_short: Vec<usize>,
    pub ma_long: Vec<usize>,
}

/// The band/ADX grid: 3 x 3 x 3 x 3 = 81 combinations.
impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            band_mult: vec![1.5, 2.0, 2.5],
            rsi_hi: vec![65.0, 70.0, 75.0],
            rsi_lo: vec![25.0, 30.0, 35.0],
            adx_threshold: vec![20.0, 25.0, 30.0],
            ..Self::empty()
        }
    }
}

impl ParamGrid {
    /// No axes: the single combination is the base parameter set.
    pub fn empty() -> Self {
        Self {
            band_mult: Vec::new(),
            rsi_hi: Vec::new(),
            rsi_lo: Vec::new(),
            adx_threshold: Vec::new(),
            trend_atr_mult: Vec::new(),
            channel_window: Vec::new(),
            band_period: Vec::new(),
            ma_short: Vec::new(),
            ma_long: Vec::new(),
        }
    }

    /// Default grid over the parameters `kind` actually reads. 81
    /// combinations for band/ADX, 27 for breakout and trend.
    pub fn for_strategy(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::BandAdx => Self::default(),
            StrategyKind::Breakout => Self {
                rsi_hi: vec![65.0, 70.0, 75.0],
                rsi_lo: vec![25.0, 30.0, 35.0],
                channel_window: vec![15, 20, 30],
                ..Self::empty()
            },
            StrategyKind::Trend => Self {
                trend_atr_mult: vec![1.5, 2.0, 2.5],
                ma_short: vec![3, 5, 10],
                ma_long: vec![20, 30, 50],
                ..Self::empty()
            },
        }
    }

    /// Number of combinations (empty axes count as 1).
    pub fn size(&self) -> usize {
        [
            self.band_mult.len(),
            self.rsi_hi.len(),
            self.rsi_lo.len(),
            self.adx_threshold.len(),
            self.trend_atr_mult.len(),
            self.channel_window.len(),
            self.band_period.len(),
            self.ma_short.len(),
            self.ma_long.len(),
        ]
        .iter()
        .map(|&n| n.max(1))
        .product()
    }

    /// Whether some axis `kind` reads has more than one value.
    pub fn searches(&self, kind: StrategyKind) -> bool {
        let axes = match kind {
            StrategyKind::Breakout => [
                self.rsi_hi.len(),
                self.rsi_lo.len(),
                self.channel_window.len(),
                0,
                0,
            ],
            StrategyKind::BandAdx => [
                self.band_mult.len(),
                self.rsi_hi.len(),
                self.rsi_lo.len(),
                self.adx_threshold.len(),
                self.band_period.len(),
            ],
            StrategyKind::Trend => [
                self.trend_atr_mult.len(),
                self.ma_short.len(),
                self.ma_long.len(),
                0,
                0,
            ],
        };
        axes.iter().any(|&n| n > 1)
    }

    /// Every combination applied over `base`, in nesting order: band
    /// multiplier outermost, then rsi_hi, rsi_lo, adx_threshold,
    /// trend_atr_mult, then the window axes (channel, band period, short
    /// MA, long MA).
    pub fn combinations(&self, base: &StrategyParams) -> Vec<StrategyParams> {
        let out = vec![base.clone()];
        let out = expand(out, &self.band_mult, |p, v| p.band_mult = v);
        let out = expand(out, &self.rsi_hi, |p, v| p.rsi_hi = v);
        let out = expand(out, &self.rsi_lo, |p, v| p.rsi_lo = v);
        let out = expand(out, &self.adx_threshold, |p, v| p.adx_threshold = v);
        let out = expand(out, &self.trend_atr_mult, |p, v| p.trend_atr_mult = v);
        let out = expand(out, &self.channel_window, |p, v| p.channel_window = v);
        let out = expand(out, &self.band_period, |p, v| p.band_period = v);
        let out = expand(out, &self.ma_short, |p, v| p.ma_short = v);
        expand(out, &self.ma_long, |p, v| p.ma_long = v)
    }
}

/// Cross `combos` with one axis; the axis varies fastest.
fn expand<T: Copy>(
    combos: Vec<StrategyParams>,
    values: &[T],
    set: impl Fn(&mut StrategyParams, T),
) -> Vec<StrategyParams> {
    if values.is_empty() {
        return combos;
    }
    let set = &set;
    combos
        .into_iter()
        .flat_map(|params| {
            values.iter().map(move |&v| {
                let mut next = params.clone();
                set(&mut next, v);
                next
            })
        })
        .collect()
}

/// Best combination for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Optimization {
    pub best: StrategyParams,
    pub score: BacktestScore,
    /// Valid combinations actually scored.
    pub evaluated: usize,
    pub candle_count: usize,
}

pub struct Optimizer {
    kind: StrategyKind,
    grid: ParamGrid,
    max_evaluations: usize,
}

impl Optimizer {
    pub fn new(kind: StrategyKind, grid: ParamGrid, max_evaluations: usize) -> Self {
        Self {
            kind,
            grid,
            max_evaluations,
        }
    }

    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Search the grid over `candles`, used as both fast and slow series.
    pub fn optimize(
        &self,
        symbol: &str,
        candles: &[Candle],
        base: &StrategyParams,
    ) -> Result<Optimization, OptimizeError> {
        let combos: Vec<StrategyParams> = self
            .grid
            .combinations(base)
            .into_iter()
            .filter(|p| p.problems().is_empty())
            .collect();
        if combos.is_empty() {
            return Err(OptimizeError::EmptyGrid);
        }

        let n = candles.len();
        let requested = combos.len().saturating_mul(n);
        if requested > self.max_evaluations {
            return Err(OptimizeError::TooManyEvaluations {
                combinations: combos.len(),
                candles: n,
                requested,
                limit: self.max_evaluations,
            });
        }

        let strategy = create_strategy(self.kind);
        let need = combos
            .iter()
            .map(|p| {
                let r = strategy.required_len(p);
                r.fast.max(r.slow)
            })
            .min()
            .unwrap_or(0);
        if n < need {
            return Err(OptimizeError::InsufficientHistory { have: n, need });
        }

        let snapshots = precompute(candles, &combos);
        debug!(
            symbol,
            combinations = combos.len(),
            window_sets = snapshots.len(),
            candles = n,
            "optimizer indicators ready"
        );

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let scores: Vec<BacktestScore> = combos
            .par_iter()
            .map(|params| {
                let decisions: Vec<Decision> = snapshots[&params.windows()]
                    .iter()
                    .map(|snapshot| strategy.classify(snapshot, params))
                    .collect();
                score(&decisions, &closes)
            })
            .collect();

        let mut best = 0usize;
        for (i, s) in scores.iter().enumerate() {
            if s.win_rate > scores[best].win_rate {
                best = i;
            }
        }

        info!(
            symbol,
            strategy = %self.kind,
            evaluated = combos.len(),
            win_rate = scores[best].win_rate,
            trades = scores[best].trades,
            "optimization complete"
        );

        Ok(Optimization {
            best: combos[best].clone(),
            score: scores[best],
            evaluated: combos.len(),
            candle_count: n,
        })
    }
}

/// Per-bar snapshots for every distinct window set in `combos`.
fn precompute(
    candles: &[Candle],
    combos: &[StrategyParams],
) -> HashMap<IndicatorSpec, Vec<Snapshot>> {
    let mut specs: Vec<IndicatorSpec> = combos.iter().map(StrategyParams::windows).collect();
    specs.sort();
    specs.dedup();

    specs
        .into_par_iter()
        .map(|spec| {
            let frame = IndicatorFrame::compute(MarketSeries::single(candles), spec);
            let snapshots = (0..frame.len()).map(|i| frame.snapshot_at(i)).collect();
            (spec, snapshots)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};

    fn zigzag(n: usize) -> Vec<Candle> {
        let base = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.05;
                Candle {
                    timestamp: base + Duration::minutes(15 * i as i64),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1.0,
                }
            })
            .collect()
    }

    #[test]
    fn default_grid_has_81_combinations() {
        let grid = ParamGrid::default();
        assert_eq!(grid.size(), 81);
        assert_eq!(grid.combinations(&StrategyParams::default()).len(), 81);
    }

    #[test]
    fn combinations_follow_nesting_order() {
        let combos = ParamGrid::default().combinations(&StrategyParams::default());
        assert_eq!(combos[0].band_mult, 1.5);
        assert_eq!(combos[0].adx_threshold, 20.0);
        assert_eq!(combos[1].adx_threshold, 25.0);
        assert_eq!(combos[3].rsi_lo, 30.0);
        assert_eq!(combos[9].rsi_hi, 70.0);
        assert_eq!(combos[27].band_mult, 2.0);
        assert_eq!(combos[80].band_mult, 2.5);
    }

    #[test]
    fn per_strategy_grids_search_what_the_strategy_reads() {
        for kind in [StrategyKind::Breakout, StrategyKind::BandAdx, StrategyKind::Trend] {
            let grid = ParamGrid::for_strategy(kind);
            assert!(grid.searches(kind), "{kind}");
            let combos = grid.combinations(&StrategyParams::default());
            assert_eq!(combos.len(), grid.size());
            assert!(combos.iter().all(|p| p.problems().is_empty()), "{kind}");
        }
        assert_eq!(ParamGrid::for_strategy(StrategyKind::Trend).size(), 27);
        assert!(!ParamGrid::default().searches(StrategyKind::Trend));
        assert!(!ParamGrid::empty().searches(StrategyKind::BandAdx));
        assert_eq!(ParamGrid::empty().combinations(&StrategyParams::default()).len(), 1);
    }

    #[test]
    fn trend_axes_nest_after_thresholds() {
        let combos =
            ParamGrid::for_strategy(StrategyKind::Trend).combinations(&StrategyParams::default());
        assert_eq!(combos[0].trend_atr_mult, 1.5);
        assert_eq!(combos[0].ma_short, 3);
        assert_eq!(combos[0].ma_long, 20);
        assert_eq!(combos[1].ma_long, 30);
        assert_eq!(combos[3].ma_short, 5);
        assert_eq!(combos[9].trend_atr_mult, 2.0);
        assert_eq!(combos[26].band_mult, 2.0);
    }

    #[test]
    fn trend_grid_scores_differ() {
        let candles = zigzag(600);
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let strategy = create_strategy(StrategyKind::Trend);
        let grid = ParamGrid {
            trend_atr_mult: vec![0.0, 1000.0],
            ..ParamGrid::for_strategy(StrategyKind::Trend)
        };
        let scores: Vec<BacktestScore> = grid
            .combinations(&StrategyParams::default())
            .iter()
            .map(|params| {
                let frame =
                    IndicatorFrame::compute(MarketSeries::single(&candles), params.windows());
                let decisions: Vec<Decision> = (0..frame.len())
                    .map(|i| strategy.classify(&frame.snapshot_at(i), params))
                    .collect();
                score(&decisions, &closes)
            })
            .collect();
        let mut distinct: Vec<(usize, usize)> = scores.iter().map(|s| (s.trades, s.wins)).collect();
        distinct.sort();
        distinct.dedup();
        assert!(distinct.len() > 1, "{distinct:?}");

        let optimizer = Optimizer::new(StrategyKind::Trend, grid, usize::MAX);
        let result = optimizer
            .optimize("X", &candles, &StrategyParams::default())
            .unwrap();
        assert_eq!(result.evaluated, 18);
        assert!(result.score.trades > 0);
    }

    #[test]
    fn window_axes_multiply() {
        let grid = ParamGrid {
            channel_window: vec![10, 20],
            band_period: vec![15, 20, 25],
            ..ParamGrid::default()
        };
        assert_eq!(grid.size(), 81 * 6);
        let combos = grid.combinations(&StrategyParams::default());
        assert_eq!(combos[0].channel_window, 10);
        assert_eq!(combos[1].band_period, 20);
        assert_eq!(combos[3].channel_window, 20);
    }

    #[test]
    fn rejects_oversized_pass() {
        let optimizer = Optimizer::new(StrategyKind::BandAdx, ParamGrid::default(), 1000);
        let err = optimizer
            .optimize("BTCUSDT", &zigzag(200), &StrategyParams::default())
            .unwrap_err();
        assert_eq!(
            err,
            OptimizeError::TooManyEvaluations {
                combinations: 81,
                candles: 200,
                requested: 16_200,
                limit: 1000,
            }
        );
    }

    #[test]
    fn invalid_only_grid_is_empty() {
        let grid = ParamGrid {
            rsi_hi: vec![20.0],
            rsi_lo: vec![30.0],
            ..ParamGrid::default()
        };
        let optimizer = Optimizer::new(StrategyKind::BandAdx, grid, usize::MAX);
        assert_eq!(
            optimizer.optimize("X", &zigzag(100), &StrategyParams::default()),
            Err(OptimizeError::EmptyGrid)
        );
    }

    #[test]
    fn short_history_rejected() {
        let optimizer = Optimizer::new(StrategyKind::Breakout, ParamGrid::default(), usize::MAX);
        assert!(matches!(
            optimizer.optimize("X", &zigzag(10), &StrategyParams::default()),
            Err(OptimizeError::InsufficientHistory { have: 10, .. })
        ));
    }

    #[test]
    fn best_is_first_maximum() {
        let optimizer = Optimizer::new(StrategyKind::BandAdx, ParamGrid::default(), usize::MAX);
        let candles = zigzag(300);
        let result = optimizer
            .optimize("X", &candles, &StrategyParams::default())
            .unwrap();
        assert_eq!(result.evaluated, 81);
        assert_eq!(result.candle_count, 300);

        // Recompute sequentially and check no earlier combination ties.
        let strategy = create_strategy(StrategyKind::BandAdx);
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let combos = ParamGrid::default().combinations(&StrategyParams::default());
        let position = combos.iter().position(|p| *p == result.best).unwrap();
        for params in &combos[..position] {
            let frame = IndicatorFrame::compute(MarketSeries::single(&candles), params.windows());
            let decisions: Vec<Decision> = (0..frame.len())
                .map(|i| strategy.classify(&frame.snapshot_at(i), params))
                .collect();
            assert!(score(&decisions, &closes).win_rate < result.score.win_rate);
        }
    }
}
