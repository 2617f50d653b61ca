//! Matrix guards for covariance-like state.
//!
//! Decompositions go through the fallible `try_new` constructors with an
//! iteration cap, so a pathological matrix degrades instead of spinning.

use nalgebra::{DMatrix, SymmetricEigen, SVD};

/// Singular values below this are treated as zero by the pseudo-inverse.
pub const PINV_EPS: f64 = 1e-12;

const MAX_DECOMPOSITION_SWEEPS: usize = 1_000;

/// Moore-Penrose pseudo-inverse.
///
/// Returns the zero matrix if `m` holds non-finite entries or the SVD fails.
pub fn pseudo_inverse(m: &DMatrix<f64>) -> DMatrix<f64> {
    let fallback = DMatrix::zeros(m.ncols(), m.nrows());
    if m.iter().any(|x| !x.is_finite()) {
        return fallback;
    }
    SVD::try_new(m.clone(), true, true, f64::EPSILON, MAX_DECOMPOSITION_SWEEPS)
        .and_then(|svd| svd.pseudo_inverse(PINV_EPS).ok())
        .unwrap_or(fallback)
}

/// `(m + m^T) / 2`.
pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}

/// Nearest symmetric matrix whose eigenvalues are all at least `floor`.
///
/// Returns `None` if the eigen-decomposition does not converge.
pub fn clamp_eigenvalues(m: &DMatrix<f64>, floor: f64) -> Option<DMatrix<f64>> {
    if m.iter().any(|x| !x.is_finite()) {
        return None;
    }
    let mut eig =
        SymmetricEigen::try_new(symmetrize(m), f64::EPSILON, MAX_DECOMPOSITION_SWEEPS)?;
    for value in eig.eigenvalues.iter_mut() {
        if *value < floor {
            *value = floor;
        }
    }
    Some(symmetrize(&eig.recompose()))
}

/// Smallest eigenvalue of the symmetric part of `m`.
pub fn min_eigenvalue(m: &DMatrix<f64>) -> Option<f64> {
    if m.iter().any(|x| !x.is_finite()) {
        return None;
    }
    let eig = SymmetricEigen::try_new(symmetrize(m), f64::EPSILON, MAX_DECOMPOSITION_SWEEPS)?;
    Some(eig.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min))
}
