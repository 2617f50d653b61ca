//! Date-by-date backtest loop.
//!
//! Per date:
//! 1. Drift: apply the period's price relatives to the held weights
//! 2. Observe: the strategy sees the new relative (tracking state)
//! 3. Rebalance: on selected dates, ask for a target and trade to it
//! 4. Record: weights, gross/net value, turnover and fee for the date

use std::sync::atomic::{AtomicBool, Ordering};

use crate::diagnostics::{Diagnostics, WarningKind};
use crate::domain::{History, PriceMatrix};
use crate::error::BacktestError;
use crate::numeric::simplex::{finalize, is_on_simplex, uniform, Projection, WEIGHT_TOL};
use crate::rebalance::select_rebalance_dates;
use crate::strategies::{Strategy, StrategyKind, StrategyParams, StrategyRegistry};

use super::state::{BacktestMetadata, BacktestResult, EngineConfig, EngineState, HoldingMode};

/// Run `strategy` over `matrix`.
///
/// `cancel` is checked once per date; when it is raised the series completed
/// so far are returned with `metadata.cancelled = true`.
pub fn run_backtest(
    matrix: &PriceMatrix,
    strategy: &mut dyn Strategy,
    config: &EngineConfig,
    cancel: Option<&AtomicBool>,
) -> Result<BacktestResult, BacktestError> {
    config.validate()?;

    let info = strategy.info();
    let n_dates = matrix.n_dates();
    let n_assets = matrix.n_assets();
    let prices = matrix.rows();
    let relatives = matrix.relatives();
    let rebalance_dates = select_rebalance_dates(matrix.dates(), config.rebalance)?;
    let mut is_rebalance = vec![false; n_dates];
    for &i in &rebalance_dates {
        is_rebalance[i] = true;
    }

    tracing::debug!(
        strategy = info.id,
        dates = n_dates,
        assets = n_assets,
        rebalances = rebalance_dates.len(),
        "backtest start"
    );

    let mut diag = Diagnostics::new();
    if info.kind == StrategyKind::BenchmarkLookahead {
        diag.set_date(0, matrix.dates()[0]);
        strategy.fit_hindsight(&History::new(prices, &relatives), &mut diag);
    }

    let mut state = EngineState::new(n_assets, config.initial_capital);
    let mut weights = Vec::with_capacity(n_dates);
    let mut gross_values = Vec::with_capacity(n_dates);
    let mut net_values = Vec::with_capacity(n_dates);
    let mut turnover = Vec::with_capacity(n_dates);
    let mut fees = Vec::with_capacity(n_dates);
    let mut cancelled = false;

    for t in 0..n_dates {
        if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            tracing::info!(strategy = info.id, completed = t, total = n_dates, "backtest cancelled");
            cancelled = true;
            break;
        }
        diag.set_date(t, matrix.dates()[t]);

        if t > 0 {
            state.drift(&relatives[t]);
        }

        let history = History::new(&prices[..=t], &relatives[..=t]);
        strategy.observe(&history);

        let (date_turnover, fee) = if is_rebalance[t] {
            let raw = strategy.step(&history, state.held(), &mut diag);
            let target = checked_weights(raw, n_assets, &mut diag);
            state.rebalance(&target, &config.costs)
        } else if config.holding == HoldingMode::Reproject && !strategy.holds_drift() {
            let target = state.last_target().to_vec();
            state.rebalance(&target, &config.costs)
        } else {
            (0.0, 0.0)
        };

        weights.push(state.held().to_vec());
        gross_values.push(state.gross());
        net_values.push(state.net());
        turnover.push(date_turnover);
        fees.push(fee);
    }

    let completed = weights.len();
    let metadata = BacktestMetadata {
        strategy: info.describe(),
        hyperparameters: strategy.params(),
        warnings: diag.into_warnings(),
        rebalance_dates: rebalance_dates
            .into_iter()
            .filter(|&i| i < completed)
            .collect(),
        rebalance: config.rebalance,
        holding: config.holding,
        initial_capital: config.initial_capital,
        cancelled,
        completed_dates: completed,
        total_dates: n_dates,
        total_fees: fees.iter().sum(),
        total_turnover: turnover.iter().sum(),
    };

    tracing::debug!(
        strategy = info.id,
        final_net = net_values.last().copied().unwrap_or(config.initial_capital),
        warnings = metadata.warnings.len(),
        "backtest end"
    );

    Ok(BacktestResult {
        dates: matrix.dates()[..completed].to_vec(),
        assets: matrix.assets().to_vec(),
        weights,
        gross_values,
        net_values,
        turnover,
        fees,
        metadata,
    })
}

/// Build `id` from `registry` and run it.
pub fn run_registered(
    matrix: &PriceMatrix,
    registry: &StrategyRegistry,
    id: &str,
    params: &StrategyParams,
    config: &EngineConfig,
    cancel: Option<&AtomicBool>,
) -> Result<BacktestResult, BacktestError> {
    let mut strategy = registry.build(id, params, matrix.n_assets())?;
    run_backtest(matrix, strategy.as_mut(), config, cancel)
}

/// Strategy output as tradeable weights.
///
/// Wrong length or non-finite entries fall back to uniform with a warning;
/// small violations of the simplex are projected away.
fn checked_weights(raw: Vec<f64>, n_assets: usize, diag: &mut Diagnostics) -> Vec<f64> {
    if raw.len() != n_assets || raw.iter().any(|w| !w.is_finite()) {
        diag.warn(
            WarningKind::InvalidWeights,
            format!("strategy returned {} weights for {n_assets} assets", raw.len()),
        );
        return uniform(n_assets);
    }
    if is_on_simplex(&raw, WEIGHT_TOL) {
        return raw;
    }
    tracing::trace!(?raw, "projecting off-simplex weights");
    finalize(raw, Projection::Euclidean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::CostModel;
    use crate::rebalance::RebalanceFrequency;
    use crate::strategies::baseline::{BuyAndHold, EqualWeight, EW_INFO};
    use crate::strategies::test_support::{matrix_from_relatives, zigzag};
    use crate::strategies::StrategyInfo;

    struct Broken;

    impl Strategy for Broken {
        fn info(&self) -> &'static StrategyInfo {
            &EW_INFO
        }

        fn params(&self) -> StrategyParams {
            StrategyParams::new()
        }

        fn step(&mut self, _h: &History<'_>, _held: &[f64], _d: &mut Diagnostics) -> Vec<f64> {
            vec![f64::NAN, 1.0]
        }
    }

    #[test]
    fn invalid_output_replaced_by_uniform() {
        let m = matrix_from_relatives(&zigzag(4));
        let r = run_backtest(&m, &mut Broken, &EngineConfig::default(), None).unwrap();
        assert!(r.weights.iter().all(|w| w == &uniform(3)));
        assert_eq!(r.metadata.warnings.len(), 4);
        assert_eq!(r.metadata.warnings[0].kind, WarningKind::InvalidWeights);
    }

    #[test]
    fn sparse_rebalance_lets_weights_drift() {
        let m = matrix_from_relatives(&zigzag(10));
        let config = EngineConfig::default().with_rebalance(RebalanceFrequency::EveryN { n: 5 });
        let r = run_backtest(&m, &mut EqualWeight::new(3), &config, None).unwrap();
        assert_eq!(r.metadata.rebalance_dates, vec![0, 5]);
        assert_eq!(r.turnover[1], 0.0);
        assert_ne!(r.weights[1], uniform(3));
        assert_eq!(r.weights[5], uniform(3));
        assert!(r.turnover[5] > 0.0);
    }

    #[test]
    fn reproject_trades_every_date() {
        let m = matrix_from_relatives(&zigzag(10));
        let config = EngineConfig::default()
            .with_rebalance(RebalanceFrequency::EveryN { n: 5 })
            .with_holding(HoldingMode::Reproject)
            .with_costs(CostModel::percentage(0.001));
        let r = run_backtest(&m, &mut EqualWeight::new(3), &config, None).unwrap();
        assert!(r.weights.iter().all(|w| w == &uniform(3)));
        assert!(r.turnover[1..].iter().all(|&x| x > 0.0));
        assert!(r.fees[1] > 0.0);
    }

    #[test]
    fn fees_separate_gross_from_net() {
        let m = matrix_from_relatives(&zigzag(6));
        let config = EngineConfig::default().with_costs(CostModel::percentage(0.01));
        let r = run_backtest(&m, &mut EqualWeight::new(3), &config, None).unwrap();
        // initial allocation pays 1% of capital
        assert!((r.fees[0] - 100.0).abs() < 1e-9);
        assert!((r.net_values[0] - 9_900.0).abs() < 1e-9);
        assert_eq!(r.gross_values[0], 10_000.0);
        for t in 0..r.len() {
            assert!(r.net_values[t] < r.gross_values[t]);
        }
        assert!((r.metadata.total_fees - r.fees.iter().sum::<f64>()).abs() < 1e-12);
    }

    #[test]
    fn pre_raised_cancel_returns_empty_partial() {
        let m = matrix_from_relatives(&zigzag(6));
        let flag = AtomicBool::new(true);
        let r = run_backtest(&m, &mut EqualWeight::new(3), &EngineConfig::default(), Some(&flag))
            .unwrap();
        assert!(r.metadata.cancelled);
        assert!(r.is_empty());
        assert_eq!(r.metadata.total_dates, 6);
    }

    #[test]
    fn buy_and_hold_trades_once() {
        let m = matrix_from_relatives(&zigzag(8));
        let r = run_backtest(
            &m,
            &mut BuyAndHold::new(uniform(3)),
            &EngineConfig::default(),
            None,
        )
        .unwrap();
        assert!((r.turnover[0] - 1.0).abs() < 1e-12);
        assert!(r.turnover[1..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn reproject_leaves_buy_and_hold_drifting() {
        let m = matrix_from_relatives(&zigzag(10));
        let config = EngineConfig::default()
            .with_rebalance(RebalanceFrequency::EveryN { n: 4 })
            .with_holding(HoldingMode::Reproject)
            .with_costs(CostModel::percentage(0.001));
        let r = run_backtest(&m, &mut BuyAndHold::new(uniform(3)), &config, None).unwrap();
        assert!(r.turnover[1..].iter().all(|&x| x == 0.0));
        assert!(r.fees[1..].iter().all(|&x| x == 0.0));
        assert_ne!(r.weights[1], uniform(3));
    }

    #[test]
    fn config_errors_surface_before_loop() {
        let m = matrix_from_relatives(&zigzag(3));
        let config = EngineConfig::new(-5.0);
        assert!(matches!(
            run_backtest(&m, &mut EqualWeight::new(3), &config, None),
            Err(BacktestError::Config(_))
        ));
    }

    #[test]
    fn registered_strategy_runs() {
        let m = matrix_from_relatives(&zigzag(8));
        let registry = StrategyRegistry::standard();
        let r = run_registered(
            &m,
            &registry,
            "olmar",
            &StrategyParams::new(),
            &EngineConfig::default(),
            None,
        )
        .unwrap();
        assert_eq!(r.metadata.strategy.id, "OLMAR");
        assert_eq!(r.len(), 8);
    }
}
