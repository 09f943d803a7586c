//! Win-rate scorer for a bar-by-bar decision series.
//!
//! One position at a time. A long/short decision while flat opens at that
//! bar's close; a `wait` while open closes at the previous bar's close.
//! Opposite decisions while open are ignored. A position still open at the
//! end of the series is not counted.

use perpsig_core::domain::Decision;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestScore {
    pub trades: usize,
    pub wins: usize,
    /// wins / trades, 0 when there were no trades.
    pub win_rate: f64,
}

/// Score `decisions` against the closes they were made on.
///
/// Both slices are indexed by bar; extra entries in the longer one are
/// ignored.
pub fn score(decisions: &[Decision], closes: &[f64]) -> BacktestScore {
    let n = decisions.len().min(closes.len());
    let mut open: Option<(f64, f64)> = None; // (direction, entry)
    let mut trades = 0usize;
    let mut wins = 0usize;

    for i in 0..n {
        match (open, decisions[i]) {
            (None, Decision::Wait) => {}
            (None, decision) => {
                open = Some((f64::from(decision.sign()), closes[i]));
            }
            (Some((direction, entry)), Decision::Wait) => {
                let exit = closes[i - 1];
                trades += 1;
                if direction * (exit - entry) > 0.0 {
                    wins += 1;
                }
                open = None;
            }
            (Some(_), _) => {}
        }
    }

    let win_rate = if trades == 0 {
        0.0
    } else {
        wins as f64 / trades as f64
    };
    BacktestScore {
        trades,
        wins,
        win_rate,
    }
}
