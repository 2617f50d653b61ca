//! Confidence Weighted Mean Reversion.
//!
//! Portfolio weights are modelled as a Gaussian `(mu, Sigma)`. Each date solves
//! a closed-form Lagrange multiplier for the confidence constraint, moves `mu`
//! against the realized relative and tightens `Sigma` along it. `Sigma` is
//! re-symmetrized, floored to positive semi-definite and trace-normalized on
//! every update.

use nalgebra::{DMatrix, DVector};

use crate::diagnostics::Diagnostics;
use crate::domain::History;
use crate::error::ConfigError;
use crate::numeric::linalg::{clamp_eigenvalues, pseudo_inverse};
use crate::numeric::safe::{mean, safe_div, DENOM_EPS};
use crate::numeric::simplex::{finalize, project_euclidean, uniform, Projection};
use crate::numeric::stats::inverse_normal_cdf;

use super::{
    Complexity, ParamReader, Strategy, StrategyFamily, StrategyInfo, StrategyKind, StrategyParams,
};

pub const CWMR_INFO: StrategyInfo = StrategyInfo {
    id: "CWMR",
    name: "Confidence Weighted Mean Reversion",
    family: StrategyFamily::MeanReversion,
    kind: StrategyKind::Causal,
    complexity: Complexity::VeryHigh,
    reference: Some("Li et al. 2013"),
};

/// Upper bound on the Lagrange multiplier.
pub const MAX_MULTIPLIER: f64 = 1e4;

/// Smallest eigenvalue kept in `Sigma`.
const SIGMA_FLOOR: f64 = 1e-10;

/// Confidence is clipped into this margin so the normal quantile stays finite.
const CONFIDENCE_MARGIN: f64 = 1e-6;

/// Covariance update rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigmaRule {
    /// `Sigma^-1 += 2 lambda theta x x^T`
    Variance,
    /// `Sigma^-1 += lambda theta / sqrt(U) x x^T`
    StdDev,
}

impl SigmaRule {
    fn label(self) -> &'static str {
        match self {
            SigmaRule::Variance => "var",
            SigmaRule::StdDev => "sd",
        }
    }
}

/// Lagrange multiplier of the CWMR confidence constraint.
///
/// `m = mu.x`, `v = x^T Sigma x`, `w_sum = 1^T Sigma x`, `x_bar` the mean
/// relative. Solves `a l^2 + b l + c = 0` and keeps the largest of the real
/// roots and the linear solution `-c/b`; only the linear solution is left
/// when no real root exists. Never negative, never above [`MAX_MULTIPLIER`].
pub fn lagrange_multiplier(m: f64, v: f64, w_sum: f64, x_bar: f64, epsilon: f64, theta: f64) -> f64 {
    let expr = v - x_bar * w_sum + theta * theta * v / 2.0;
    let a = expr * expr - theta.powi(4) * v * v / 4.0;
    let b = 2.0 * (epsilon - m) * expr;
    let c = (epsilon - m) * (epsilon - m) - theta * theta * v;

    let linear = safe_div(-c, b, 0.0);
    let discriminant = b * b - 4.0 * a * c;

    let lambda = if a.abs() < DENOM_EPS || discriminant < 0.0 {
        linear
    } else {
        let root = discriminant.sqrt();
        let r1 = (-b + root) / (2.0 * a);
        let r2 = (-b - root) / (2.0 * a);
        r1.max(r2).max(linear)
    };

    if lambda.is_finite() {
        lambda.clamp(0.0, MAX_MULTIPLIER)
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct Cwmr {
    confidence: f64,
    epsilon: f64,
    rule: SigmaRule,
    theta: f64,
    mu: DVector<f64>,
    sigma: DMatrix<f64>,
}

impl Cwmr {
    pub fn new(n_assets: usize, confidence: f64, epsilon: f64, rule: SigmaRule) -> Self {
        let theta =
            inverse_normal_cdf(confidence.clamp(CONFIDENCE_MARGIN, 1.0 - CONFIDENCE_MARGIN));
        Self {
            confidence,
            epsilon,
            rule,
            theta,
            mu: DVector::from_vec(uniform(n_assets)),
            sigma: initial_sigma(n_assets),
        }
    }

    pub fn from_params(params: &StrategyParams, n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(CWMR_INFO.id, params);
        reader.allow_only(&["confidence", "epsilon", "method"])?;
        let confidence = reader.closed("confidence", 0.95, 0.0, 1.0)?;
        let epsilon = reader.closed("epsilon", 0.5, 0.0, 1.0)?;
        let rule = match reader.choice("method", "var", &["var", "sd"])? {
            "sd" => SigmaRule::StdDev,
            _ => SigmaRule::Variance,
        };
        Ok(Self::new(n_assets, confidence, epsilon, rule))
    }

    pub fn mean(&self) -> &[f64] {
        self.mu.as_slice()
    }

    pub fn sigma(&self) -> &DMatrix<f64> {
        &self.sigma
    }

    /// One CWMR update against the realized relative `x`.
    pub fn update(&mut self, x: &[f64]) {
        let n = x.len();
        let xv = DVector::from_column_slice(x);
        let m = self.mu.dot(&xv);
        let sx = &self.sigma * &xv;
        let v = xv.dot(&sx);
        let w_sum = sx.sum();
        let x_bar = mean(x);

        let lambda = lagrange_multiplier(m, v, w_sum, x_bar, self.epsilon, self.theta);

        let centered = &xv - DVector::from_element(n, x_bar);
        let mu_raw = &self.mu - (&self.sigma * centered) * lambda;

        let coefficient = match self.rule {
            SigmaRule::Variance => 2.0 * lambda * self.theta,
            SigmaRule::StdDev => {
                let lt = lambda * self.theta;
                let sqrt_u = (-lt * v + (lt * lt * v * v + 4.0 * v).sqrt()) / 2.0;
                safe_div(lt, sqrt_u, 0.0)
            }
        };
        if coefficient != 0.0 {
            let precision = pseudo_inverse(&self.sigma) + (&xv * xv.transpose()) * coefficient;
            self.sigma = pseudo_inverse(&precision);
        }
        self.sigma = stabilize(&self.sigma, m);
        self.mu = DVector::from_vec(project_euclidean(mu_raw.as_slice()));
    }
}

fn initial_sigma(n: usize) -> DMatrix<f64> {
    let scale = if n == 0 { 1.0 } else { 1.0 / (n * n) as f64 };
    DMatrix::identity(n, n) * scale
}

/// Symmetric, PSD and scaled to trace `1 / m`.
fn stabilize(sigma: &DMatrix<f64>, m: f64) -> DMatrix<f64> {
    let n = sigma.nrows();
    let psd = clamp_eigenvalues(sigma, SIGMA_FLOOR).unwrap_or_else(|| initial_sigma(n));
    let scale = m * psd.trace();
    if scale.is_finite() && scale > DENOM_EPS {
        psd / scale
    } else {
        psd
    }
}

impl Strategy for Cwmr {
    fn info(&self) -> &'static StrategyInfo {
        &CWMR_INFO
    }

    fn params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("confidence", self.confidence)
            .with("epsilon", self.epsilon)
            .with("method", self.rule.label())
    }

    fn step(&mut self, history: &History<'_>, _held: &[f64], _diag: &mut Diagnostics) -> Vec<f64> {
        if history.t() > 0 {
            self.update(history.latest_relative());
        }
        finalize(self.mu.as_slice().to_vec(), Projection::Euclidean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::linalg::min_eigenvalue;
    use crate::strategies::test_support::{assert_all_on_simplex, drive, matrix_from_relatives, zigzag};

    #[test]
    fn multiplier_is_never_negative() {
        let grid = [-2.0, -0.5, 0.0, 0.3, 1.0, 1.7, 5.0];
        for &m in &[0.8, 0.95, 1.0, 1.1] {
            for &v in &[0.0, 1e-6, 0.01, 0.5, 3.0] {
                for &w in &grid {
                    for &x_bar in &[0.9, 1.0, 1.2] {
                        for &eps in &[0.0, 0.5, 1.0] {
                            for &theta in &[-2.0, 0.0, 1.645] {
                                let l = lagrange_multiplier(m, v, w, x_bar, eps, theta);
                                assert!(l.is_finite());
                                assert!((0.0..=MAX_MULTIPLIER).contains(&l));
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn multiplier_keeps_linear_solution_when_larger() {
        let (m, v, w, x_bar, eps, theta): (f64, f64, f64, f64, f64, f64) = (0.8, 0.05, -0.5, 1.0, 1.0, 1.645);
        let expr = v - x_bar * w + theta * theta * v / 2.0;
        let a = expr * expr - theta.powi(4) * v * v / 4.0;
        let b = 2.0 * (eps - m) * expr;
        let c = (eps - m) * (eps - m) - theta * theta * v;
        let disc = b * b - 4.0 * a * c;
        assert!(disc >= 0.0);
        let roots = [(-b + disc.sqrt()) / (2.0 * a), (-b - disc.sqrt()) / (2.0 * a), -c / b];
        assert!(roots[2] > roots[0].max(roots[1]));
        let l = lagrange_multiplier(m, v, w, x_bar, eps, theta);
        assert!((l - roots[2]).abs() < 1e-12, "{l} vs {roots:?}");
    }

    #[test]
    fn second_update_centers_on_plain_mean() {
        let x1 = [0.97, 1.0, 1.03];
        let x2 = [1.001, 0.999, 1.0];
        let mut cwmr = Cwmr::new(3, 0.95, 1.0, SigmaRule::Variance);
        cwmr.update(&x1);

        // Sigma is no longer a multiple of the identity after one update
        let sigma = cwmr.sigma().clone();
        let mu = DVector::from_column_slice(cwmr.mean());
        let xv = DVector::from_column_slice(&x2);
        let sx = &sigma * &xv;
        let x_bar = mean(&x2);
        assert!((sx.sum() / sigma.sum() - x_bar).abs() > 1e-4);

        let lambda = lagrange_multiplier(mu.dot(&xv), xv.dot(&sx), sx.sum(), x_bar, 1.0, cwmr.theta);
        assert!(lambda > 0.0);
        let centered = &xv - DVector::from_element(3, x_bar);
        let expected = project_euclidean((&mu - (&sigma * centered) * lambda).as_slice());

        cwmr.update(&x2);
        for (a, b) in cwmr.mean().iter().zip(&expected) {
            assert!((a - b).abs() < 1e-12, "{:?} vs {expected:?}", cwmr.mean());
        }
        // reference values for this path
        for (a, b) in cwmr.mean().iter().zip(&[0.43989, 0.46249, 0.09762]) {
            assert!((a - b).abs() < 1e-3, "{:?}", cwmr.mean());
        }
    }

    #[test]
    fn multiplier_zero_when_constraint_slack() {
        // m well below epsilon boundary with tiny variance: c > 0, b > 0 -> no positive root
        let l = lagrange_multiplier(0.2, 1e-4, 1e-4, 1.0, 0.5, 1.645);
        assert!(l >= 0.0);
    }

    #[test]
    fn sigma_stays_psd_for_both_rules() {
        for method in ["var", "sd"] {
            for confidence in [0.95, 0.1, 1.0, 0.0] {
                let p = StrategyParams::new()
                    .with("method", method)
                    .with("confidence", confidence);
                let mut cwmr = Cwmr::from_params(&p, 3).unwrap();
                for x in zigzag(40).iter().skip(1) {
                    cwmr.update(x);
                    let min = min_eigenvalue(cwmr.sigma()).unwrap();
                    assert!(min >= -1e-9, "{method} {confidence}: {min}");
                    let s = cwmr.sigma();
                    assert!((s - s.transpose()).abs().max() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn weights_stay_on_simplex() {
        let mut cwmr = Cwmr::new(3, 0.95, 0.5, SigmaRule::Variance);
        let (weights, _) = drive(&mut cwmr, &matrix_from_relatives(&zigzag(30)));
        assert_all_on_simplex(&weights);
    }

    #[test]
    fn initial_state() {
        let cwmr = Cwmr::new(4, 0.95, 0.5, SigmaRule::Variance);
        assert_eq!(cwmr.mean(), &[0.25; 4]);
        assert!((cwmr.sigma()[(0, 0)] - 1.0 / 16.0).abs() < 1e-15);
        assert!((cwmr.theta - 1.644_853_6).abs() < 1e-6);
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let p = StrategyParams::new().with("confidence", 1.2);
        assert!(Cwmr::from_params(&p, 2).is_err());
        let p = StrategyParams::new().with("method", "cov");
        assert!(Cwmr::from_params(&p, 2).is_err());
    }
}
