//! OLPS Core — price data, simplex numerics, strategies, costs, backtest loop.
//!
//! This crate contains the online portfolio selection engine:
//! - Validated price matrix and price relatives
//! - Simplex projection, safe arithmetic, L1 median, constrained log-optimal solver
//! - Seventeen strategies behind one `Strategy` trait, built through a registry
//! - Transaction-cost model and rebalancing-date selection
//! - Date-by-date orchestrator producing gross/net value, turnover and fee series
//!
//! No file I/O and no global state; the runner crate owns configuration files,
//! batching and export.

pub mod costs;
pub mod diagnostics;
pub mod domain;
pub mod engine;
pub mod error;
pub mod numeric;
pub mod rebalance;
pub mod strategies;

pub use costs::CostModel;
pub use diagnostics::{ConvergenceWarning, Diagnostics, WarningKind};
pub use domain::{History, PriceMatrix};
pub use engine::{
    run_backtest, run_registered, BacktestMetadata, BacktestResult, EngineConfig, HoldingMode,
};
pub use error::{BacktestError, ConfigError, DataError};
pub use rebalance::{select_rebalance_dates, RebalanceFrequency};
pub use strategies::{
    ParamValue, Strategy, StrategyDescriptor, StrategyInfo, StrategyKind, StrategyParams,
    StrategyRegistry,
};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything a batch worker touches crosses threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<PriceMatrix>();
        require_sync::<PriceMatrix>();
        require_send::<StrategyRegistry>();
        require_sync::<StrategyRegistry>();
        require_send::<EngineConfig>();
        require_sync::<EngineConfig>();
        require_send::<BacktestResult>();
        require_sync::<BacktestResult>();
        require_send::<StrategyParams>();
        require_sync::<StrategyParams>();
        require_send::<Box<dyn Strategy>>();
    }

    #[test]
    fn send_sync_compiles() {
        assert_send_sync();
    }
}
