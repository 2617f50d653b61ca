//! Constrained log-optimal portfolio solver.
//!
//! Maximizes `sum_s ln(w . x_s) - lambda * |w - uniform|^2` over the simplex by
//! projected-gradient ascent with Armijo backtracking. Iteration is bounded;
//! the caller decides what to do with a non-converged outcome.

use serde::{Deserialize, Serialize};

use super::safe::{dot, safe_ln, LOG_FLOOR};
use super::simplex::{project_euclidean, uniform};

const ARMIJO_C: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;
const MAX_STEP: f64 = 1e6;

/// Iteration budget and tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutcome {
    pub weights: Vec<f64>,
    pub objective: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Objective value of `w` on `samples`.
pub fn log_wealth_objective(w: &[f64], samples: &[&[f64]], penalty: f64) -> f64 {
    let growth: f64 = samples.iter().map(|x| safe_ln(dot(w, x))).sum();
    if penalty == 0.0 {
        return growth;
    }
    let u = 1.0 / w.len() as f64;
    growth - penalty * w.iter().map(|wi| (wi - u) * (wi - u)).sum::<f64>()
}

fn gradient(w: &[f64], samples: &[&[f64]], penalty: f64) -> Vec<f64> {
    let n = w.len();
    let u = 1.0 / n as f64;
    let mut g: Vec<f64> = w.iter().map(|wi| -2.0 * penalty * (wi - u)).collect();
    for x in samples {
        let r = dot(w, x).max(LOG_FLOOR);
        for (gi, xi) in g.iter_mut().zip(x.iter()) {
            *gi += xi / r;
        }
    }
    g
}

fn step_along(w: &[f64], g: &[f64], step: f64) -> Vec<f64> {
    let raw: Vec<f64> = w.iter().zip(g).map(|(wi, gi)| wi + step * gi).collect();
    project_euclidean(&raw)
}

/// Maximize penalized log-wealth over `samples` (each of length `n_assets`).
///
/// Starts at uniform weights and only accepts ascent steps, so the returned
/// objective is never below the uniform portfolio's. Converged means the
/// stationarity or objective-change test passed; running out of iterations or
/// of acceptable steps does not count.
pub fn maximize_log_wealth(
    samples: &[&[f64]],
    n_assets: usize,
    penalty: f64,
    settings: &SolverSettings,
) -> SolverOutcome {
    let mut w = uniform(n_assets);
    if samples.is_empty() || n_assets == 0 {
        return SolverOutcome {
            objective: 0.0,
            weights: w,
            iterations: 0,
            converged: true,
        };
    }

    let mut f = log_wealth_objective(&w, samples, penalty);
    let mut step = 1.0 / samples.len() as f64;
    let stationarity_tol = settings.tolerance * 1e3;

    for iteration in 1..=settings.max_iterations {
        let g = gradient(&w, samples, penalty);

        // distance moved by a unit projected-gradient step; zero at a KKT point
        let full_step = step_along(&w, &g, 1.0);
        let stationarity = full_step
            .iter()
            .zip(&w)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        if !stationarity.is_finite() {
            break;
        }
        if stationarity <= stationarity_tol {
            return SolverOutcome {
                weights: w,
                objective: f,
                iterations: iteration,
                converged: true,
            };
        }

        let mut trial_step = (step * 2.0).min(MAX_STEP);
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let candidate = step_along(&w, &g, trial_step);
            if candidate == w {
                // step fell below the resolution of w
                break;
            }
            let delta: Vec<f64> = candidate.iter().zip(&w).map(|(c, wi)| c - wi).collect();
            let f_candidate = log_wealth_objective(&candidate, samples, penalty);
            if f_candidate.is_finite() && f_candidate >= f + ARMIJO_C * dot(&g, &delta) {
                accepted = Some((candidate, f_candidate));
                break;
            }
            trial_step *= 0.5;
        }

        let Some((candidate, f_candidate)) = accepted else {
            // stuck short of a stationary point
            return SolverOutcome {
                weights: w,
                objective: f,
                iterations: iteration,
                converged: false,
            };
        };

        let relative_change = (f_candidate - f).abs() / (1.0 + f.abs());
        w = candidate;
        f = f_candidate;
        step = trial_step;

        if relative_change <= settings.tolerance {
            return SolverOutcome {
                weights: w,
                objective: f,
                iterations: iteration,
                converged: true,
            };
        }
    }

    SolverOutcome {
        weights: w,
        objective: f,
        iterations: settings.max_iterations,
        converged: false,
    }
}
