//! Decentralized online portfolio selection with transaction costs.
//!
//! Each date maximizes `b.x_hat - c * |b - b_held|_1` over the simplex,
//! subject to `entropy(b) >= xi`, where `c = lambda_param + cost_rate` and
//! `b_held` is the drifted portfolio. Without the entropy constraint the
//! optimum moves every asset whose forecast trails the best one by more
//! than `2c` into the best asset; the constraint then pulls that target back
//! toward the held portfolio until it is diverse enough.
//!
//! DTC1 forecasts with an exponential average of prices. DTC2 smooths price
//! relatives with a per-asset factor that adapts to the forecast error.

use crate::diagnostics::Diagnostics;
use crate::domain::History;
use crate::error::ConfigError;
use crate::numeric::safe::{dot, l1_norm, safe_div, safe_ln};
use crate::numeric::simplex::{is_on_simplex, uniform, WEIGHT_TOL};

use super::{
    Complexity, ParamReader, Strategy, StrategyFamily, StrategyInfo, StrategyKind, StrategyParams,
};

pub const DTC_INFO: StrategyInfo = StrategyInfo {
    id: "DTC",
    name: "Decentralized Online Portfolio Selection",
    family: StrategyFamily::MeanReversion,
    kind: StrategyKind::Causal,
    complexity: Complexity::High,
    reference: Some("Decentralized Online Portfolio Selection with Transaction Costs"),
};

const BISECTION_STEPS: usize = 60;

/// Forecast of the next price relative.
#[derive(Debug, Clone, PartialEq)]
pub enum Forecast {
    /// DTC1: `x_hat = ema(price) / price`.
    PriceAverage { alpha: f64, ema: Option<Vec<f64>> },
    /// DTC2: `x_hat = a + (1 - a) * x_hat_prev / x`, with `a` nudged by
    /// `gamma * sign(x - x_hat_prev)` and clipped to `[0, 1]`.
    AdaptiveRelative {
        alpha: f64,
        gamma: f64,
        factors: Vec<f64>,
        x_hat: Vec<f64>,
    },
}

impl Forecast {
    fn dtc1(alpha: f64) -> Self {
        Forecast::PriceAverage { alpha, ema: None }
    }

    fn dtc2(n_assets: usize, alpha: f64, gamma: f64) -> Self {
        Forecast::AdaptiveRelative {
            alpha,
            gamma,
            factors: vec![alpha; n_assets],
            x_hat: vec![1.0; n_assets],
        }
    }

    fn variant(&self) -> &'static str {
        match self {
            Forecast::PriceAverage { .. } => "DTC1",
            Forecast::AdaptiveRelative { .. } => "DTC2",
        }
    }

    fn update(&mut self, history: &History<'_>) {
        match self {
            Forecast::PriceAverage { alpha, ema } => {
                let price = history.latest_price();
                *ema = Some(match ema.take() {
                    None => price.to_vec(),
                    Some(prev) => prev
                        .iter()
                        .zip(price)
                        .map(|(e, p)| *alpha * p + (1.0 - *alpha) * e)
                        .collect(),
                });
            }
            Forecast::AdaptiveRelative {
                gamma,
                factors,
                x_hat,
                ..
            } => {
                let x = history.latest_relative();
                for ((a, prev), actual) in factors.iter_mut().zip(x_hat.iter_mut()).zip(x) {
                    let error = actual - *prev;
                    if error != 0.0 {
                        *a = (*a + *gamma * error.signum()).clamp(0.0, 1.0);
                    }
                    *prev = *a + (1.0 - *a) * safe_div(*prev, *actual, 1.0);
                }
            }
        }
    }

    fn predict(&self, history: &History<'_>) -> Vec<f64> {
        match self {
            Forecast::PriceAverage { ema, .. } => {
                let price = history.latest_price();
                match ema {
                    Some(ema) => ema
                        .iter()
                        .zip(price)
                        .map(|(e, p)| safe_div(*e, *p, 1.0))
                        .collect(),
                    None => vec![1.0; price.len()],
                }
            }
            Forecast::AdaptiveRelative { x_hat, .. } => x_hat.clone(),
        }
    }
}

/// Shannon entropy in nats, with `0 ln 0 = 0`.
pub fn entropy(w: &[f64]) -> f64 {
    -w.iter()
        .filter(|v| **v > 0.0)
        .map(|v| v * safe_ln(*v))
        .sum::<f64>()
}

fn mix(from: &[f64], to: &[f64], s: f64) -> Vec<f64> {
    from.iter()
        .zip(to)
        .map(|(a, b)| (1.0 - s) * a + s * b)
        .collect()
}

/// Largest `s` in `[0, 1]` with `entropy(mix(from, to, s)) >= floor`.
///
/// Requires `from` to satisfy the floor. Entropy is concave, so the feasible
/// part of the segment is an interval starting at `from`.
fn last_feasible(from: &[f64], to: &[f64], floor: f64) -> f64 {
    if entropy(to) >= floor {
        return 1.0;
    }
    let (mut lo, mut hi) = (0.0, 1.0);
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if entropy(&mix(from, to, mid)) >= floor {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Objective `b.x_hat - penalty * |b - held|_1`.
pub fn dtc_objective(b: &[f64], x_hat: &[f64], held: &[f64], penalty: f64) -> f64 {
    let moved: Vec<f64> = b.iter().zip(held).map(|(a, h)| a - h).collect();
    dot(b, x_hat) - penalty * l1_norm(&moved)
}

/// One DTC decision from the drifted portfolio `held`.
///
/// `held` must be on the simplex. A floor of `ln n` or more leaves only the
/// uniform portfolio feasible.
pub fn dtc_target(held: &[f64], x_hat: &[f64], penalty: f64, xi: f64) -> Vec<f64> {
    let n = held.len();
    let max_entropy = (n as f64).ln();
    if xi >= max_entropy {
        return uniform(n);
    }
    let best = x_hat
        .iter()
        .enumerate()
        .fold(0, |best, (i, v)| if *v > x_hat[best] { i } else { best });

    let mut target = held.to_vec();
    for i in 0..n {
        if i != best && x_hat[best] - x_hat[i] > 2.0 * penalty {
            target[best] += target[i];
            target[i] = 0.0;
        }
    }

    let anchor = if entropy(held) >= xi {
        held.to_vec()
    } else {
        let u = uniform(n);
        mix(&u, held, last_feasible(&u, held, xi))
    };
    let candidate = mix(&anchor, &target, last_feasible(&anchor, &target, xi));
    if dtc_objective(&candidate, x_hat, held, penalty)
        >= dtc_objective(&anchor, x_hat, held, penalty)
    {
        candidate
    } else {
        anchor
    }
}

#[derive(Debug, Clone)]
pub struct Dtc {
    lambda: f64,
    xi: f64,
    cost_rate: f64,
    forecast: Forecast,
    observed_through: Option<usize>,
}

impl Dtc {
    pub fn new(lambda: f64, xi: f64, cost_rate: f64, forecast: Forecast) -> Self {
        Self {
            lambda,
            xi,
            cost_rate,
            forecast,
            observed_through: None,
        }
    }

    pub fn from_params(params: &StrategyParams, n_assets: usize) -> Result<Self, ConfigError> {
        let reader = ParamReader::new(DTC_INFO.id, params);
        reader.allow_only(&["variant", "lambda_param", "xi_param", "alpha", "gamma", "cost_rate"])?;
        let lambda = reader.at_least("lambda_param", 0.05, 0.0)?;
        let xi = reader.at_least("xi_param", 1.0, 0.0)?;
        let alpha = reader.closed("alpha", 0.5, 0.0, 1.0)?;
        let gamma = reader.at_least("gamma", 1e-5, 0.0)?;
        let cost_rate = reader.at_least("cost_rate", 0.0025, 0.0)?;
        let forecast = match reader.choice("variant", "DTC1", &["DTC1", "DTC2"])? {
            "DTC2" => Forecast::dtc2(n_assets, alpha, gamma),
            _ => Forecast::dtc1(alpha),
        };
        Ok(Self::new(lambda, xi, cost_rate, forecast))
    }

    fn penalty(&self) -> f64 {
        self.lambda + self.cost_rate
    }
}

impl Strategy for Dtc {
    fn info(&self) -> &'static StrategyInfo {
        &DTC_INFO
    }

    fn params(&self) -> StrategyParams {
        let p = StrategyParams::new()
            .with("variant", self.forecast.variant())
            .with("lambda_param", self.lambda)
            .with("xi_param", self.xi)
            .with("cost_rate", self.cost_rate);
        match &self.forecast {
            Forecast::PriceAverage { alpha, .. } => p.with("alpha", *alpha),
            Forecast::AdaptiveRelative { alpha, gamma, .. } => {
                p.with("alpha", *alpha).with("gamma", *gamma)
            }
        }
    }

    fn observe(&mut self, history: &History<'_>) {
        let t = history.t();
        if self.observed_through.is_some_and(|done| t <= done) {
            return;
        }
        self.forecast.update(history);
        self.observed_through = Some(t);
    }

    fn step(&mut self, history: &History<'_>, held: &[f64], _diag: &mut Diagnostics) -> Vec<f64> {
        let n = history.n_assets();
        let start = if is_on_simplex(held, WEIGHT_TOL) {
            held.to_vec()
        } else {
            uniform(n)
        };
        let x_hat = self.forecast.predict(history);
        dtc_target(&start, &x_hat, self.penalty(), self.xi)
    }
}
