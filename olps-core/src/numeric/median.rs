//! Componentwise and L1 (geometric) medians.

use super::safe::l1_norm;

/// Distances below this count as coinciding with a window point.
const ZERO_DISTANCE: f64 = 1e-12;

/// Result of the Weiszfeld iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct L1Median {
    pub point: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Median of each coordinate across `points`.
pub fn componentwise_median(points: &[Vec<f64>]) -> Vec<f64> {
    let dim = points.first().map_or(0, Vec::len);
    (0..dim)
        .map(|j| {
            let mut column: Vec<f64> = points.iter().map(|p| p[j]).collect();
            median(&mut column)
        })
        .collect()
}

/// Median of a slice (average of the middle pair for even lengths). Sorts in place.
pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Geometric median via the modified Weiszfeld iteration.
///
/// Starts from the componentwise median and stops when the L1 change of the
/// iterate falls below `tolerance * |y|_1`, or after `max_iterations`. If the
/// iterate coincides with a window point, that point is returned directly.
pub fn l1_median(points: &[Vec<f64>], max_iterations: usize, tolerance: f64) -> L1Median {
    if points.is_empty() {
        return L1Median {
            point: Vec::new(),
            iterations: 0,
            converged: true,
        };
    }

    let dim = points[0].len();
    let mut y = componentwise_median(points);

    for iteration in 1..=max_iterations {
        let distances: Vec<f64> = points.iter().map(|p| euclidean(&y, p)).collect();
        if let Some(hit) = distances.iter().position(|&d| d < ZERO_DISTANCE) {
            return L1Median {
                point: points[hit].clone(),
                iterations: iteration,
                converged: true,
            };
        }

        let mut numerator = vec![0.0; dim];
        let mut denominator = 0.0;
        for (p, &d) in points.iter().zip(&distances) {
            let inv = 1.0 / d;
            for (acc, x) in numerator.iter_mut().zip(p) {
                *acc += x * inv;
            }
            denominator += inv;
        }
        let next: Vec<f64> = numerator.iter().map(|n| n / denominator).collect();

        let change: f64 = next.iter().zip(&y).map(|(a, b)| (a - b).abs()).sum();
        y = next;
        if change <= tolerance * l1_norm(&y) {
            return L1Median {
                point: y,
                iterations: iteration,
                converged: true,
            };
        }
    }

    L1Median {
        point: y,
        iterations: max_iterations,
        converged: false,
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
