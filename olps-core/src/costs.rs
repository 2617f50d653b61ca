//! Transaction-cost model.
//!
//! `fee(n) = min(max(rate * |n|, min_fee), max_fee) + fixed_fee` per traded
//! asset, applied only to trades with notional above [`MIN_TRADE_NOTIONAL`].

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Trades at or below this notional are treated as no trade and cost nothing.
pub const MIN_TRADE_NOTIONAL: f64 = 1e-9;

fn infinite() -> f64 {
    f64::INFINITY
}

fn enabled_by_default() -> bool {
    true
}

/// Per-order commission schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub min_fee: f64,
    #[serde(default = "infinite")]
    pub max_fee: f64,
    #[serde(default)]
    pub fixed_fee: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::zero()
    }
}

impl CostModel {
    pub fn new(rate: f64, min_fee: f64, max_fee: f64, fixed_fee: f64) -> Self {
        Self {
            enabled: true,
            rate,
            min_fee,
            max_fee,
            fixed_fee,
        }
    }

    /// No fees at all.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Alias of [`CostModel::zero`].
    pub fn frictionless() -> Self {
        Self::zero()
    }

    /// Maxblue retail schedule: 0.25 %, bounded to [8.90, 58.90], plus 2.00 per order.
    pub fn maxblue() -> Self {
        Self::new(0.0025, 8.90, 58.90, 2.00)
    }

    /// Flat percentage of notional, no bounds, no fixed fee.
    pub fn percentage(rate: f64) -> Self {
        Self::new(rate, 0.0, f64::INFINITY, 0.0)
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// All fields finite and non-negative (`max_fee` may be +inf), `max_fee >= min_fee`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [
            ("rate", self.rate),
            ("min_fee", self.min_fee),
            ("fixed_fee", self.fixed_fee),
        ];
        for (name, value) in finite {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidCost(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }
        if self.max_fee.is_nan() || self.max_fee < 0.0 {
            return Err(ConfigError::InvalidCost(format!(
                "max_fee must be non-negative, got {}",
                self.max_fee
            )));
        }
        if self.max_fee < self.min_fee {
            return Err(ConfigError::InvalidCost(format!(
                "max_fee {} is below min_fee {}",
                self.max_fee, self.min_fee
            )));
        }
        Ok(())
    }

    /// Fee for one order of signed notional `notional`.
    pub fn fee_for_trade(&self, notional: f64) -> f64 {
        let size = notional.abs();
        if !self.enabled || size.is_nan() || size <= MIN_TRADE_NOTIONAL {
            return 0.0;
        }
        (self.rate * size).max(self.min_fee).min(self.max_fee) + self.fixed_fee
    }

    /// Sum of per-asset fees for one rebalancing.
    pub fn total_fee(&self, trades: &[f64]) -> f64 {
        trades.iter().map(|&n| self.fee_for_trade(n)).sum()
    }

    /// Whether every trade is free under this model.
    pub fn is_free(&self) -> bool {
        !self.enabled || (self.rate == 0.0 && self.min_fee == 0.0 && self.fixed_fee == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maxblue_bounds() {
        let c = CostModel::maxblue();
        // 0.25% of 1000 = 2.50 -> min 8.90, + 2.00
        assert!((c.fee_for_trade(1000.0) - 10.90).abs() < 1e-12);
        // 0.25% of 10000 = 25.00 within bounds
        assert!((c.fee_for_trade(-10_000.0) - 27.00).abs() < 1e-12);
        // 0.25% of 100000 = 250 -> max 58.90
        assert!((c.fee_for_trade(100_000.0) - 60.90).abs() < 1e-12);
    }

    #[test]
    fn no_trade_no_fee() {
        let c = CostModel::maxblue();
        assert_eq!(c.fee_for_trade(0.0), 0.0);
        assert_eq!(c.fee_for_trade(1e-12), 0.0);
        assert_eq!(c.total_fee(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn disabled_is_free() {
        let c = CostModel::maxblue().disabled();
        assert_eq!(c.fee_for_trade(5000.0), 0.0);
        assert!(c.is_free());
    }

    #[test]
    fn percentage_is_linear() {
        let c = CostModel::percentage(0.001);
        assert!((c.total_fee(&[1000.0, -500.0]) - 1.5).abs() < 1e-12);
        assert!(!c.is_free());
    }

    #[test]
    fn zero_model_charges_nothing() {
        let c = CostModel::zero();
        assert!(c.is_free());
        assert_eq!(c.total_fee(&[1e6, -1e6]), 0.0);
    }

    #[test]
    fn validation() {
        assert!(CostModel::maxblue().validate().is_ok());
        assert!(CostModel::percentage(0.01).validate().is_ok());
        assert!(CostModel::new(-0.1, 0.0, 1.0, 0.0).validate().is_err());
        assert!(CostModel::new(0.1, 5.0, 1.0, 0.0).validate().is_err());
        assert!(CostModel::new(0.1, 0.0, f64::NAN, 0.0).validate().is_err());
        assert!(CostModel::new(f64::INFINITY, 0.0, 1.0, 0.0).validate().is_err());
    }
}
