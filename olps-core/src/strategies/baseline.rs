//! Baseline portfolios: Equal Weight, Buy-and-Hold, Constant Rebalanced.

use crate::diagnostics::Diagnostics;
use crate::domain::History;
use crate::error::ConfigError;
use crate::numeric::simplex::{finalize, uniform, Projection};

use super::{
    Complexity, ParamReader, Strategy, StrategyFamily, StrategyInfo, StrategyKind, StrategyParams,
};

pub const EW_INFO: StrategyInfo = StrategyInfo {
    id: "EW",
    name: "Equal Weight",
    family: StrategyFamily::Baseline,
    kind: StrategyKind::Benchmark,
    complexity: Complexity::Low,
    reference: None,
};

pub const BAH_INFO: StrategyInfo = StrategyInfo {
    id: "BAH",
    name: "Buy and Hold",
    family: StrategyFamily::Baseline,
    kind: StrategyKind::Benchmark,
    complexity: Complexity::Low,
    reference: None,
};

pub const CRP_INFO: StrategyInfo = StrategyInfo {
    id: "CRP",
    name: "Constant Rebalanced Portfolio",
    family: StrategyFamily::Baseline,
    kind: StrategyKind::Benchmark,
    complexity: Complexity::Low,
    reference: Some("Cover 1991"),
};

// ─── Equal Weight ────────────────────────────────────────────────────

/// Rebalances to `1/n` in every asset.
#[derive(Debug, Clone)]
pub struct EqualWeight {
    target: Vec<f64>,
}

impl EqualWeight {
    pub fn new(n_assets: usize) -> Self {
        Self {
            target: uniform(n_assets),
        }
    }

    pub fn from_params(params: &StrategyParams, n_assets: usize) -> Result<Self, ConfigError> {
        ParamReader::new(EW_INFO.id, params).allow_only(&[])?;
        Ok(Self::new(n_assets))
    }
}

impl Strategy for EqualWeight {
    fn info(&self) -> &'static StrategyInfo {
        &EW_INFO
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new()
    }

    fn step(&mut self, _history: &History<'_>, _held: &[f64], _diag: &mut Diagnostics) -> Vec<f64> {
        self.target.clone()
    }
}

// ─── Buy and Hold ────────────────────────────────────────────────────

/// Allocates once, then lets weights drift with prices.
#[derive(Debug, Clone)]
pub struct BuyAndHold {
    initial: Vec<f64>,
    invested: bool,
}

impl BuyAndHold {
    pub fn new(initial: Vec<f64>) -> Self {
        Self {
            initial,
            invested: false,
        }
    }

    pub fn from_params(params: &StrategyParams, n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(BAH_INFO.id, params);
        reader.allow_only(&["initial_weights"])?;
        let initial = reader
            .weights("initial_weights", n_assets)?
            .unwrap_or_else(|| uniform(n_assets));
        Ok(Self::new(initial))
    }
}

impl Strategy for BuyAndHold {
    fn info(&self) -> &'static StrategyInfo {
        &BAH_INFO
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new().with("initial_weights", self.initial.clone())
    }

    fn holds_drift(&self) -> bool {
        true
    }

    fn step(&mut self, _history: &History<'_>, held: &[f64], _diag: &mut Diagnostics) -> Vec<f64> {
        if !self.invested {
            self.invested = true;
            return finalize(self.initial.clone(), Projection::Normalize);
        }
        // drifted weights are kept as-is; finalize only corrects float drift
        finalize(held.to_vec(), Projection::Normalize)
    }
}

// ─── Constant Rebalanced Portfolio ───────────────────────────────────

/// Rebalances to a fixed target vector.
#[derive(Debug, Clone)]
pub struct ConstantRebalanced {
    target: Vec<f64>,
}

impl ConstantRebalanced {
    pub fn new(target: Vec<f64>) -> Self {
        Self {
            target: finalize(target, Projection::Normalize),
        }
    }

    pub fn from_params(params: &StrategyParams, n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(CRP_INFO.id, params);
        reader.allow_only(&["target_weights"])?;
        let target = reader
            .weights("target_weights", n_assets)?
            .unwrap_or_else(|| uniform(n_assets));
        Ok(Self::new(target))
    }
}

impl Strategy for ConstantRebalanced {
    fn info(&self) -> &'static StrategyInfo {
        &CRP_INFO
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new().with("target_weights", self.target.clone())
    }

    fn step(&mut self, _history: &History<'_>, _held: &[f64], _diag: &mut Diagnostics) -> Vec<f64> {
        self.target.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_support::{assert_all_on_simplex, drive, matrix_from_relatives, zigzag};

    #[test]
    fn equal_weight_is_constant() {
        let m = matrix_from_relatives(&zigzag(6));
        let (weights, _) = drive(&mut EqualWeight::new(3), &m);
        for w in &weights {
            assert_eq!(w, &vec![1.0 / 3.0; 3]);
        }
    }

    #[test]
    fn buy_and_hold_returns_held_after_first_date() {
        let mut bah = BuyAndHold::new(vec![0.5, 0.5]);
        let prices = vec![vec![1.0, 1.0], vec![2.0, 1.0]];
        let rel = vec![vec![1.0, 1.0], vec![2.0, 1.0]];
        let mut diag = Diagnostics::new();
        let first = bah.step(&History::new(&prices[..1], &rel[..1]), &[0.0, 0.0], &mut diag);
        assert_eq!(first, vec![0.5, 0.5]);
        let drifted = vec![2.0 / 3.0, 1.0 / 3.0];
        let second = bah.step(&History::new(&prices, &rel), &drifted, &mut diag);
        assert_eq!(second, drifted);
    }

    #[test]
    fn crp_rejects_wrong_length() {
        let p = StrategyParams::new().with("target_weights", vec![0.5, 0.5]);
        assert!(matches!(
            ConstantRebalanced::from_params(&p, 3),
            Err(ConfigError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn crp_holds_target() {
        let p = StrategyParams::new().with("target_weights", vec![2.0, 1.0, 1.0]);
        let mut crp = ConstantRebalanced::from_params(&p, 3).unwrap();
        let m = matrix_from_relatives(&zigzag(5));
        let (weights, _) = drive(&mut crp, &m);
        assert_all_on_simplex(&weights);
        for w in &weights {
            assert!((w[0] - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn ew_rejects_params() {
        let p = StrategyParams::new().with("eta", 1.0);
        assert!(EqualWeight::from_params(&p, 2).is_err());
    }
}
