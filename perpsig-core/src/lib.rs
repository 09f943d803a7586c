//! perpsig core: candles, indicators, strategies, sizing, execution.
//!
//! This crate contains the decision logic of the engine:
//! - Domain types (candles, signals, order plans, positions)
//! - Indicator library with NaN-warmup series and per-candle snapshots
//! - Pluggable signal strategies (breakout, band/ADX, trend)
//! - ATR-based risk sizer
//! - Per-symbol execution state machine reconciled against the exchange
//! - Exchange, market-data and notifier collaborators (Bitget, Telegram)

pub mod domain;
pub mod exchange;
pub mod execution;
pub mod indicators;
pub mod notify;
pub mod pacing;
pub mod sizer;
pub mod strategy;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with the scheduler and the
    /// optimizer's rayon workers are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Candle>();
        require_sync::<domain::Candle>();
        require_send::<domain::Signal>();
        require_sync::<domain::Signal>();
        require_send::<domain::OrderPlan>();
        require_sync::<domain::OrderPlan>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();

        require_send::<indicators::IndicatorFrame>();
        require_sync::<indicators::IndicatorFrame>();
        require_send::<strategy::StrategyParams>();
        require_sync::<strategy::StrategyParams>();
        require_send::<sizer::RiskSizer>();
        require_sync::<sizer::RiskSizer>();
        require_send::<execution::ExecutionMachine>();
        require_sync::<execution::ExecutionMachine>();

        require_send::<exchange::BitgetClient>();
        require_sync::<exchange::BitgetClient>();
        require_send::<Box<dyn strategy::SignalStrategy>>();
        require_sync::<Box<dyn strategy::SignalStrategy>>();
    }

    /// Architecture contract: strategies never see positions or equity.
    ///
    /// `classify` takes a snapshot and parameters only; adding portfolio
    /// state to the trait breaks this function.
    #[test]
    fn strategy_trait_has_no_portfolio_parameter() {
        fn _check_trait_object_builds(
            s: &dyn strategy::SignalStrategy,
            snapshot: &indicators::Snapshot,
            params: &strategy::StrategyParams,
        ) -> domain::Decision {
            s.classify(snapshot, params)
        }
    }
}
