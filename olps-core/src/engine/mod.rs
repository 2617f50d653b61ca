//! Backtest orchestration: the date loop, portfolio accounting and results.
//!
//! Accounting convention: weights decided at date `t` are held over
//! `t -> t+1` and earn `relative[t+1]`. Fees are charged on rebalancing
//! dates against the pre-trade net value; the gross series never pays fees.

pub mod loop_runner;
pub mod state;

pub use loop_runner::{run_backtest, run_registered};
pub use state::{BacktestMetadata, BacktestResult, EngineConfig, EngineState, HoldingMode};
