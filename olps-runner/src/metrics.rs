//! Performance metrics — pure functions over a backtest's value series.
//!
//! Every metric is a pure function: value series in, scalar out, 0.0 on
//! degenerate input (fewer than two values, non-positive start, zero spread).
//! Annualization assumes 252 dates per year.

use serde::{Deserialize, Serialize};

use olps_core::BacktestResult;

/// Dates per year used for annualization.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub calmar: f64,
    pub win_rate: f64,
    pub final_value: f64,
    pub avg_turnover: f64,
    pub total_turnover: f64,
    pub total_fees: f64,
    /// Gross total return minus net total return.
    pub cost_drag: f64,
    pub cost_drag_bps: f64,
    pub n_dates: usize,
    pub n_rebalances: usize,
    pub n_warnings: usize,
}

impl PerformanceMetrics {
    /// Compute all metrics from the net value series, plus cost and turnover
    /// aggregates from the rest of the result.
    pub fn compute(result: &BacktestResult) -> Self {
        let net = &result.net_values;
        let gross_return = total_return(&result.gross_values);
        let net_return = total_return(net);
        let cost_drag = gross_return - net_return;
        let n_rebalances = result.metadata.rebalance_dates.len();
        let total_turnover: f64 = result.turnover.iter().sum();
        Self {
            total_return: net_return,
            cagr: cagr(net),
            volatility: annualized_volatility(net),
            sharpe: sharpe_ratio(net, 0.0),
            sortino: sortino_ratio(net, 0.0),
            max_drawdown: max_drawdown(net),
            calmar: calmar_ratio(net),
            win_rate: win_rate(net),
            final_value: net
                .last()
                .copied()
                .unwrap_or(result.metadata.initial_capital),
            avg_turnover: if n_rebalances == 0 {
                0.0
            } else {
                total_turnover / n_rebalances as f64
            },
            total_turnover,
            total_fees: result.fees.iter().sum(),
            cost_drag,
            cost_drag_bps: cost_drag * 10_000.0,
            n_dates: result.len(),
            n_rebalances,
            n_warnings: result.metadata.warnings.len(),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(values: &[f64]) -> f64 {
    match endpoints(values) {
        Some((first, last)) => (last - first) / first,
        None => 0.0,
    }
}

/// Compound annual growth rate over `values.len() - 1` periods.
pub fn cagr(values: &[f64]) -> f64 {
    let Some((first, last)) = endpoints(values) else {
        return 0.0;
    };
    if last <= 0.0 {
        return 0.0;
    }
    let years = (values.len() - 1) as f64 / PERIODS_PER_YEAR;
    (last / first).powf(1.0 / years) - 1.0
}

/// Sample standard deviation of period returns, annualized.
pub fn annualized_volatility(values: &[f64]) -> f64 {
    std_dev(&period_returns(values)) * PERIODS_PER_YEAR.sqrt()
}

/// Annualized Sharpe ratio: mean(excess) / std(excess) * sqrt(252).
pub fn sharpe_ratio(values: &[f64], risk_free_rate: f64) -> f64 {
    let excess = excess_returns(values, risk_free_rate);
    if excess.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    mean(&excess) / std * PERIODS_PER_YEAR.sqrt()
}

/// Annualized Sortino ratio, downside deviation over all periods.
///
/// 0.0 when there is no downside.
pub fn sortino_ratio(values: &[f64], risk_free_rate: f64) -> f64 {
    let excess = excess_returns(values, risk_free_rate);
    if excess.len() < 2 {
        return 0.0;
    }
    let downside: f64 = excess
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r * r)
        .sum::<f64>()
        / excess.len() as f64;
    let downside_std = downside.sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    mean(&excess) / downside_std * PERIODS_PER_YEAR.sqrt()
}

/// Maximum drawdown as a negative fraction (-0.15 is a 15% drawdown).
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &v in values {
        peak = peak.max(v);
        if peak > 0.0 {
            worst = worst.min((v - peak) / peak);
        }
    }
    worst
}

/// CAGR / |max drawdown|; 0.0 without a drawdown or with non-positive CAGR.
pub fn calmar_ratio(values: &[f64]) -> f64 {
    let c = cagr(values);
    let dd = max_drawdown(values);
    if dd >= 0.0 || c <= 0.0 {
        return 0.0;
    }
    c / dd.abs()
}

/// Fraction of periods with a strictly positive return.
pub fn win_rate(values: &[f64]) -> f64 {
    let returns = period_returns(values);
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|&&r| r > 0.0).count() as f64 / returns.len() as f64
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns between consecutive values; 0.0 after a non-positive value.
pub fn period_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

fn excess_returns(values: &[f64], risk_free_rate: f64) -> Vec<f64> {
    let per_period = risk_free_rate / PERIODS_PER_YEAR;
    period_returns(values)
        .into_iter()
        .map(|r| r - per_period)
        .collect()
}

/// First and last value, when there are at least two and the first is positive.
fn endpoints(values: &[f64]) -> Option<(f64, f64)> {
    match values {
        [first, .., last] if *first > 0.0 => Some((*first, *last)),
        _ => None,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
