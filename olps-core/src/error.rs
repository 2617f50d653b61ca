//! Error taxonomy for the backtest core.
//!
//! Two fatal classes reach the caller: malformed price input (`DataError`) and
//! invalid configuration (`ConfigError`). Both are raised before the date loop
//! starts. Per-date numeric trouble never becomes an error; it degrades to
//! uniform weights and is recorded as a `ConvergenceWarning` in the result.

use chrono::NaiveDate;
use thiserror::Error;

/// Malformed or insufficient price input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("price matrix needs at least 2 dates, got {found}")]
    TooFewDates { found: usize },
    #[error("price matrix has no assets")]
    NoAssets,
    #[error("duplicate asset identifier '{0}'")]
    DuplicateAsset(String),
    #[error("dates must be strictly increasing: {previous} is followed by {next}")]
    DatesNotIncreasing { previous: NaiveDate, next: NaiveDate },
    #[error("row {row} has {found} prices, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("date count {dates} does not match row count {rows}")]
    RowCountMismatch { dates: usize, rows: usize },
    #[error("non-positive or non-finite price {value} for '{asset}' on {date}")]
    InvalidPrice {
        date: NaiveDate,
        asset: String,
        value: f64,
    },
    #[error("unknown asset '{0}'")]
    UnknownAsset(String),
}

/// A hyperparameter or engine setting outside its validated domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),
    #[error("{strategy}: unknown parameter '{param}'")]
    UnknownParam { strategy: String, param: String },
    #[error("{strategy}: parameter '{param}' has the wrong type, expected {expected}")]
    WrongType {
        strategy: String,
        param: String,
        expected: &'static str,
    },
    #[error("{strategy}: parameter '{param}' must be an integer, got {value}")]
    NotAnInteger {
        strategy: String,
        param: String,
        value: f64,
    },
    #[error("{strategy}: parameter '{param}' = {value} is outside {domain}")]
    OutOfRange {
        strategy: String,
        param: String,
        value: f64,
        domain: String,
    },
    #[error("{strategy}: parameter '{param}' = '{value}' is not one of {allowed}")]
    InvalidChoice {
        strategy: String,
        param: String,
        value: String,
        allowed: String,
    },
    #[error("{strategy}: parameter '{param}' has length {found}, expected {expected}")]
    DimensionMismatch {
        strategy: String,
        param: String,
        expected: usize,
        found: usize,
    },
    #[error("initial capital must be positive and finite, got {0}")]
    InvalidCapital(f64),
    #[error("cost model: {0}")]
    InvalidCost(String),
    #[error("rebalance every N dates requires N >= 1")]
    InvalidRebalanceInterval,
}

/// Any fatal condition of a backtest.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
