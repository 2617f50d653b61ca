//! Named hyperparameters and their per-strategy validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::numeric::SolverSettings;

/// A single hyperparameter value as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
    List(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Number(v as f64)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::List(v)
    }
}

impl From<Vec<Vec<f64>>> for ParamValue {
    fn from(v: Vec<Vec<f64>>) -> Self {
        ParamValue::Matrix(v)
    }
}

/// Hyperparameter map, ordered by name for stable hashing and display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyParams(BTreeMap<String, ParamValue>);

impl StrategyParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the solver settings under their parameter names.
    pub fn with_solver(self, settings: &SolverSettings) -> Self {
        self.with("max_iterations", settings.max_iterations)
            .with("tolerance", settings.tolerance)
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Typed, validating accessor over a `StrategyParams` for one strategy.
pub struct ParamReader<'a> {
    strategy: &'static str,
    params: &'a StrategyParams,
}

impl<'a> ParamReader<'a> {
    pub fn new(strategy: &'static str, params: &'a StrategyParams) -> Self {
        Self { strategy, params }
    }

    /// Reject any parameter not in `allowed`.
    pub fn allow_only(&self, allowed: &[&str]) -> Result<(), ConfigError> {
        for name in self.params.0.keys() {
            if !allowed.contains(&name.as_str()) {
                return Err(ConfigError::UnknownParam {
                    strategy: self.strategy.to_string(),
                    param: name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn number(&self, name: &str, default: f64) -> Result<f64, ConfigError> {
        match self.params.get(name) {
            None => Ok(default),
            Some(ParamValue::Number(v)) if v.is_finite() => Ok(*v),
            Some(ParamValue::Number(v)) => Err(self.out_of_range(name, *v, "finite values")),
            Some(_) => Err(self.wrong_type(name, "a number")),
        }
    }

    /// Number in `[min, inf)`.
    pub fn at_least(&self, name: &str, default: f64, min: f64) -> Result<f64, ConfigError> {
        let v = self.number(name, default)?;
        if v < min {
            return Err(self.out_of_range(name, v, &format!("[{min}, inf)")));
        }
        Ok(v)
    }

    /// Number in `[lo, hi]`.
    pub fn closed(&self, name: &str, default: f64, lo: f64, hi: f64) -> Result<f64, ConfigError> {
        let v = self.number(name, default)?;
        if v < lo || v > hi {
            return Err(self.out_of_range(name, v, &format!("[{lo}, {hi}]")));
        }
        Ok(v)
    }

    /// Number in `(lo, hi)`.
    pub fn open(&self, name: &str, default: f64, lo: f64, hi: f64) -> Result<f64, ConfigError> {
        let v = self.number(name, default)?;
        if v <= lo || v >= hi {
            return Err(self.out_of_range(name, v, &format!("({lo}, {hi})")));
        }
        Ok(v)
    }

    /// Number in `[lo, hi)`.
    pub fn half_open(
        &self,
        name: &str,
        default: f64,
        lo: f64,
        hi: f64,
    ) -> Result<f64, ConfigError> {
        let v = self.number(name, default)?;
        if v < lo || v >= hi {
            return Err(self.out_of_range(name, v, &format!("[{lo}, {hi})")));
        }
        Ok(v)
    }

    /// Integer in `[min, max]`.
    pub fn integer(
        &self,
        name: &str,
        default: usize,
        min: usize,
        max: usize,
    ) -> Result<usize, ConfigError> {
        let v = self.number(name, default as f64)?;
        if v.fract() != 0.0 {
            return Err(ConfigError::NotAnInteger {
                strategy: self.strategy.to_string(),
                param: name.to_string(),
                value: v,
            });
        }
        if v < min as f64 || v > max as f64 {
            let domain = if max == usize::MAX {
                format!("[{min}, inf)")
            } else {
                format!("[{min}, {max}]")
            };
            return Err(self.out_of_range(name, v, &domain));
        }
        Ok(v as usize)
    }

    /// One of `allowed`, matched case-insensitively; returns the canonical spelling.
    pub fn choice(
        &self,
        name: &str,
        default: &'static str,
        allowed: &[&'static str],
    ) -> Result<&'static str, ConfigError> {
        let raw = match self.params.get(name) {
            None => return Ok(default),
            Some(ParamValue::Text(s)) => s,
            Some(_) => return Err(self.wrong_type(name, "a string")),
        };
        allowed
            .iter()
            .copied()
            .find(|a| a.eq_ignore_ascii_case(raw))
            .ok_or_else(|| ConfigError::InvalidChoice {
                strategy: self.strategy.to_string(),
                param: name.to_string(),
                value: raw.clone(),
                allowed: allowed.join(", "),
            })
    }

    /// Optional non-negative weight vector of length `n` with positive mass.
    pub fn weights(&self, name: &str, n: usize) -> Result<Option<Vec<f64>>, ConfigError> {
        match self.params.get(name) {
            None => Ok(None),
            Some(ParamValue::List(v)) => self.check_weights(name, v, n).map(Some),
            Some(_) => Err(self.wrong_type(name, "a list of numbers")),
        }
    }

    /// Optional list of weight vectors, each of length `n`.
    pub fn weight_rows(&self, name: &str, n: usize) -> Result<Option<Vec<Vec<f64>>>, ConfigError> {
        match self.params.get(name) {
            None => Ok(None),
            Some(ParamValue::Matrix(rows)) => {
                if rows.is_empty() {
                    return Err(self.out_of_range(name, 0.0, "at least one row"));
                }
                rows.iter()
                    .map(|row| self.check_weights(name, row, n))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Some)
            }
            Some(_) => Err(self.wrong_type(name, "a list of lists of numbers")),
        }
    }

    /// `max_iterations` and `tolerance` for the constrained log-optimal solver.
    pub fn solver(&self) -> Result<SolverSettings, ConfigError> {
        let defaults = SolverSettings::default();
        Ok(SolverSettings {
            max_iterations: self.integer("max_iterations", defaults.max_iterations, 1, usize::MAX)?,
            tolerance: self.open("tolerance", defaults.tolerance, 0.0, 1.0)?,
        })
    }

    fn check_weights(&self, name: &str, v: &[f64], n: usize) -> Result<Vec<f64>, ConfigError> {
        if v.len() != n {
            return Err(ConfigError::DimensionMismatch {
                strategy: self.strategy.to_string(),
                param: name.to_string(),
                expected: n,
                found: v.len(),
            });
        }
        if let Some(&bad) = v.iter().find(|x| !x.is_finite() || **x < 0.0) {
            return Err(self.out_of_range(name, bad, "finite non-negative weights"));
        }
        let mass: f64 = v.iter().sum();
        if mass <= 0.0 {
            return Err(self.out_of_range(name, mass, "positive total weight"));
        }
        Ok(v.iter().map(|x| x / mass).collect())
    }

    fn wrong_type(&self, name: &str, expected: &'static str) -> ConfigError {
        ConfigError::WrongType {
            strategy: self.strategy.to_string(),
            param: name.to_string(),
            expected,
        }
    }

    fn out_of_range(&self, name: &str, value: f64, domain: &str) -> ConfigError {
        ConfigError::OutOfRange {
            strategy: self.strategy.to_string(),
            param: name.to_string(),
            value,
            domain: domain.to_string(),
        }
    }
}
