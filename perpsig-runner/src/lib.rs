//! perpsig runner: configuration, optimization and the live loop.
//!
//! This crate builds on `perpsig-core` to provide:
//! - TOML engine configuration with startup validation and per-symbol overrides
//! - Win-rate backtest scorer and a parallel grid-search optimizer
//! - Parameter book persistence (JSON, blake3 fingerprints)
//! - CSV candle loading for offline optimization
//! - The polling scheduler (advisory or live) and its liveness probe

pub mod backtest;
pub mod config;
pub mod data_loader;
pub mod health;
pub mod messages;
pub mod optimizer;
pub mod param_book;
pub mod scheduler;

pub use backtest::{score, BacktestScore};
pub use config::{ConfigError, EngineConfig, Mode};
pub use data_loader::{load_candles_csv, load_symbol, LoadError};
pub use health::{route, HealthError, HealthServer};
pub use optimizer::{Optimization, OptimizeError, Optimizer, ParamGrid};
pub use param_book::{fingerprint, BookEntry, BookError, ParameterBook};
pub use scheduler::{Collaborators, CycleOutcome, Scheduler, SymbolOutcome};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn config_is_send_sync() {
        assert_send::<EngineConfig>();
        assert_sync::<EngineConfig>();
    }

    #[test]
    fn optimizer_types_are_send_sync() {
        assert_send::<Optimizer>();
        assert_sync::<Optimizer>();
        assert_send::<ParamGrid>();
        assert_sync::<ParamGrid>();
        assert_send::<BacktestScore>();
        assert_sync::<BacktestScore>();
    }

    #[test]
    fn parameter_book_is_send_sync() {
        assert_send::<ParameterBook>();
        assert_sync::<ParameterBook>();
    }

    #[test]
    fn scheduler_can_move_to_a_thread() {
        assert_send::<Scheduler>();
    }
}
