//! Probability simplex: projection, normalization, validity checks.
//!
//! Every strategy passes its raw output through [`finalize`], the single
//! enforcement point for `w_i >= 0, sum(w) = 1`.

use serde::{Deserialize, Serialize};

use super::safe::all_finite;

/// Tolerance used by [`finalize`] to accept a vector unchanged.
pub const FINALIZE_TOL: f64 = 1e-12;

/// Tolerance for the public weight invariant.
pub const WEIGHT_TOL: f64 = 1e-8;

/// How a raw vector is mapped back onto the simplex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Nearest point in Euclidean distance (sort-based).
    Euclidean,
    /// Clip negatives to zero and divide by the L1 mass.
    Normalize,
}

impl Projection {
    pub fn apply(self, v: &[f64]) -> Vec<f64> {
        match self {
            Projection::Euclidean => project_euclidean(v),
            Projection::Normalize => normalize_l1(v),
        }
    }
}

pub fn uniform(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

/// A vector with all mass on `index`.
pub fn one_hot(n: usize, index: usize) -> Vec<f64> {
    let mut w = vec![0.0; n];
    if let Some(slot) = w.get_mut(index) {
        *slot = 1.0;
    }
    w
}

pub fn is_on_simplex(w: &[f64], tol: f64) -> bool {
    if w.is_empty() || !all_finite(w) {
        return false;
    }
    let sum: f64 = w.iter().sum();
    w.iter().all(|&x| x >= -tol) && (sum - 1.0).abs() <= tol
}

/// Euclidean projection onto the simplex (Duchi et al., 2008).
///
/// Non-finite input yields uniform weights.
pub fn project_euclidean(v: &[f64]) -> Vec<f64> {
    let n = v.len();
    if n == 0 {
        return Vec::new();
    }
    if !all_finite(v) {
        return uniform(n);
    }

    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let mut cumulative = 0.0;
    let mut theta = 0.0;
    for (j, &u) in sorted.iter().enumerate() {
        cumulative += u;
        let candidate = (cumulative - 1.0) / (j + 1) as f64;
        if u - candidate > 0.0 {
            theta = candidate;
        }
    }

    let projected: Vec<f64> = v.iter().map(|&x| (x - theta).max(0.0)).collect();
    renormalize(projected)
}

/// Clip negatives (and non-finite entries) to zero, then scale to unit mass.
///
/// Falls back to uniform weights when nothing positive remains.
pub fn normalize_l1(v: &[f64]) -> Vec<f64> {
    let clipped: Vec<f64> = v
        .iter()
        .map(|&x| if x.is_finite() && x > 0.0 { x } else { 0.0 })
        .collect();
    renormalize(clipped)
}

/// Return `v` untouched if it already lies on the simplex, otherwise project it.
pub fn finalize(v: Vec<f64>, projection: Projection) -> Vec<f64> {
    if is_on_simplex(&v, FINALIZE_TOL) && v.iter().all(|&x| x >= 0.0) {
        return v;
    }
    projection.apply(&v)
}

fn renormalize(mut w: Vec<f64>) -> Vec<f64> {
    let sum: f64 = w.iter().sum();
    if !sum.is_finite() || sum <= 1e-12 {
        return uniform(w.len());
    }
    for x in &mut w {
        *x /= sum;
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_simplex(w: &[f64]) {
        assert!(is_on_simplex(w, WEIGHT_TOL), "not on simplex: {w:?}");
    }

    #[test]
    fn projection_keeps_simplex_points() {
        let w = vec![0.2, 0.3, 0.5];
        let p = project_euclidean(&w);
        for (a, b) in w.iter().zip(&p) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn projection_of_shifted_vector() {
        // (1,1,1) + c projects to uniform for any c
        let p = project_euclidean(&[5.0, 5.0, 5.0]);
        for x in &p {
            assert!((x - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn projection_drops_dominated_coordinates() {
        let p = project_euclidean(&[2.0, 0.0, -1.0]);
        assert_simplex(&p);
        assert!((p[0] - 1.0).abs() < 1e-12);
        assert_eq!(p[1], 0.0);
        assert_eq!(p[2], 0.0);

        let q = project_euclidean(&[0.6, 0.6, -0.5]);
        assert!((q[0] - 0.5).abs() < 1e-12);
        assert!((q[1] - 0.5).abs() < 1e-12);
        assert_eq!(q[2], 0.0);
    }

    #[test]
    fn projection_handles_non_finite() {
        let p = project_euclidean(&[f64::NAN, 1.0]);
        assert_eq!(p, vec![0.5, 0.5]);
        let p = project_euclidean(&[f64::INFINITY, 1.0]);
        assert_eq!(p, vec![0.5, 0.5]);
    }

    #[test]
    fn normalize_falls_back_to_uniform() {
        assert_eq!(normalize_l1(&[-1.0, 0.0]), vec![0.5, 0.5]);
        let w = normalize_l1(&[1.0, -2.0, 3.0]);
        assert!((w[0] - 0.25).abs() < 1e-12);
        assert_eq!(w[1], 0.0);
        assert!((w[2] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn finalize_is_identity_on_valid_weights() {
        let w = vec![0.1, 0.2, 0.7];
        assert_eq!(finalize(w.clone(), Projection::Euclidean), w);
    }

    #[test]
    fn one_hot_out_of_range_is_zero() {
        assert_eq!(one_hot(2, 1), vec![0.0, 1.0]);
        assert_eq!(one_hot(2, 5), vec![0.0, 0.0]);
    }
}
