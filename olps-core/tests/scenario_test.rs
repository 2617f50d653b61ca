//! End-to-end backtest scenarios on small hand-checked price paths.
//!
//! Tests:
//! 1. Equal Weight on the 5-date reference path matches the closed form
//! 2. BCRP in hindsight finishes at or above Equal Weight on the same path
//! 3. BestStock puts everything in the best performer
//! 4. CORN with an unreachable threshold stays uniform throughout

use chrono::NaiveDate;
use olps_core::numeric::simplex::uniform;
use olps_core::{
    run_registered, EngineConfig, PriceMatrix, StrategyParams, StrategyRegistry, WarningKind,
};

// ── Helpers ───────────────────────────────────────────────────────────

fn reference_relatives() -> Vec<Vec<f64>> {
    vec![
        vec![1.0, 1.0, 1.0],
        vec![1.1, 0.9, 1.0],
        vec![1.05, 0.95, 1.0],
        vec![1.0, 1.0, 1.2],
        vec![0.9, 1.1, 1.0],
    ]
}

fn matrix(relatives: &[Vec<f64>]) -> PriceMatrix {
    let start = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
    let dates = (0..relatives.len())
        .map(|i| start + chrono::Duration::days(i as i64))
        .collect();
    let assets = (0..relatives[0].len()).map(|i| format!("S{i}")).collect();
    PriceMatrix::from_relatives(dates, assets, relatives).unwrap()
}

fn run(id: &str, params: StrategyParams, m: &PriceMatrix) -> olps_core::BacktestResult {
    let registry = StrategyRegistry::standard();
    run_registered(m, &registry, id, &params, &EngineConfig::new(10_000.0), None).unwrap()
}

// ── Scenarios ─────────────────────────────────────────────────────────

#[test]
fn equal_weight_reference_path() {
    let rel = reference_relatives();
    let r = run("EW", StrategyParams::new(), &matrix(&rel));

    let expected: f64 = 10_000.0
        * rel
            .iter()
            .map(|row| row.iter().sum::<f64>() / 3.0)
            .product::<f64>();
    let gross = r.final_gross_value().unwrap();
    assert!((gross - expected).abs() < 1e-8, "{gross} vs {expected}");
    assert!((r.final_net_value().unwrap() - gross).abs() < 1e-9);

    for w in &r.weights {
        for &wi in w {
            assert!((wi - 1.0 / 3.0).abs() < 1e-12);
        }
    }
    assert_eq!(r.len(), 5);
    assert!(r.metadata.warnings.is_empty());
}

#[test]
fn bcrp_dominates_equal_weight() {
    let m = matrix(&reference_relatives());
    let ew = run("EW", StrategyParams::new(), &m);
    let bcrp = run("BCRP", StrategyParams::new(), &m);

    let ew_final = ew.final_net_value().unwrap();
    let bcrp_final = bcrp.final_net_value().unwrap();
    assert!(bcrp_final >= ew_final - 1e-9, "{bcrp_final} < {ew_final}");
    assert!(!bcrp.metadata.strategy.executable);
}

#[test]
fn best_stock_holds_the_winner() {
    // asset 2 ends 1.2x, asset 0 ends ~1.04x, asset 1 ~0.94x
    let r = run("BestStock", StrategyParams::new(), &matrix(&reference_relatives()));
    assert_eq!(r.weights[0], vec![0.0, 0.0, 1.0]);
    let final_value = r.final_gross_value().unwrap();
    assert!((final_value - 12_000.0).abs() < 1e-8);
}

#[test]
fn corn_with_impossible_threshold_is_uniform() {
    let mut rel = vec![vec![1.0; 3]];
    for t in 1..30 {
        let s = (t as f64 * 0.9).sin() * 0.03;
        rel.push(vec![1.0 + s, 1.0 - s, 1.0 + s / 2.0]);
    }
    let r = run(
        "CORN",
        StrategyParams::new().with("rho", 1.0).with("window", 3usize),
        &matrix(&rel),
    );
    for w in &r.weights {
        assert_eq!(w, &uniform(3));
    }
    assert!(r
        .metadata
        .warnings
        .iter()
        .all(|w| w.kind == WarningKind::NoSimilarWindows));
    assert!(!r.metadata.warnings.is_empty());
}
