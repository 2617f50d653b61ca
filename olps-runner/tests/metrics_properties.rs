//! Property tests for performance metrics.
//!
//! Uses proptest to verify:
//! 1. Bounds — drawdown in [-1, 0], win rate in [0, 1]
//! 2. Scale invariance — multiplying a value series leaves ratios unchanged

use olps_runner::metrics::{
    cagr, max_drawdown, sharpe_ratio, sortino_ratio, total_return, win_rate,
};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.5..1.5_f64, 2..60).prop_map(|factors| {
        let mut v = 100.0;
        factors
            .into_iter()
            .map(|f| {
                v *= f;
                v
            })
            .collect()
    })
}

// ── 1. Bounds ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn drawdown_and_win_rate_bounded(values in arb_values()) {
        let dd = max_drawdown(&values);
        prop_assert!((-1.0..=0.0).contains(&dd));
        let wr = win_rate(&values);
        prop_assert!((0.0..=1.0).contains(&wr));
        prop_assert!(total_return(&values) > -1.0);
    }
}

// ── 2. Scale Invariance ──────────────────────────────────────────────

proptest! {
    #[test]
    fn ratios_ignore_capital_scale(values in arb_values(), scale in 0.01..100.0_f64) {
        let scaled: Vec<f64> = values.iter().map(|v| v * scale).collect();
        let close = |a: f64, b: f64| (a - b).abs() <= 1e-9 * (1.0 + a.abs());
        prop_assert!(close(total_return(&values), total_return(&scaled)));
        prop_assert!(close(sharpe_ratio(&values, 0.0), sharpe_ratio(&scaled, 0.0)));
        prop_assert!(close(sortino_ratio(&values, 0.0), sortino_ratio(&scaled, 0.0)));
        prop_assert!(close(max_drawdown(&values), max_drawdown(&scaled)));
        prop_assert!(close(cagr(&values), cagr(&scaled)));
    }
}
