//! Guarded scalar and vector arithmetic.
//!
//! These never fail: near-zero denominators fall back to a caller-chosen
//! value, and logarithms clip their argument at [`LOG_FLOOR`].

/// Smallest argument passed to `ln`.
pub const LOG_FLOOR: f64 = 1e-10;

/// Denominators with magnitude below this are treated as zero.
pub const DENOM_EPS: f64 = 1e-12;

/// `ln(max(x, 1e-10))`. NaN maps to `ln(1e-10)`.
pub fn safe_ln(x: f64) -> f64 {
    x.max(LOG_FLOOR).ln()
}

/// `num / den`, or `fallback` when `den` is near zero or non-finite.
pub fn safe_div(num: f64, den: f64, fallback: f64) -> f64 {
    if !den.is_finite() || den.abs() < DENOM_EPS {
        return fallback;
    }
    let q = num / den;
    if q.is_finite() {
        q
    } else {
        fallback
    }
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

pub fn l1_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x.abs()).sum()
}

pub fn l2_norm_sq(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

/// `v - mean(v)`.
pub fn demean(v: &[f64]) -> Vec<f64> {
    let m = mean(v);
    v.iter().map(|x| x - m).collect()
}

pub fn all_finite(v: &[f64]) -> bool {
    v.iter().all(|x| x.is_finite())
}
