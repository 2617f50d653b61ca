//! Per-date warnings collected during a backtest.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Why a date fell back to a safe default (or was flagged).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Constrained solver hit its iteration cap; uniform weights used.
    SolverNotConverged,
    /// No historical window cleared the correlation threshold; uniform weights used.
    NoSimilarWindows,
    /// L1-median hit its iteration cap; the last iterate was still used.
    MedianNotConverged,
    /// Strategy output was not a valid weight vector; uniform weights used.
    InvalidWeights,
}

/// One recorded warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceWarning {
    pub date_index: usize,
    pub date: Option<NaiveDate>,
    pub kind: WarningKind,
    pub detail: String,
}

/// Collector handed to strategies; the orchestrator positions it on each date.
#[derive(Debug, Default)]
pub struct Diagnostics {
    date_index: usize,
    date: Option<NaiveDate>,
    warnings: Vec<ConvergenceWarning>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_date(&mut self, date_index: usize, date: NaiveDate) {
        self.date_index = date_index;
        self.date = Some(date);
    }

    pub fn warn(&mut self, kind: WarningKind, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::warn!(date_index = self.date_index, ?kind, %detail, "convergence warning");
        self.warnings.push(ConvergenceWarning {
            date_index: self.date_index,
            date: self.date,
            kind,
            detail,
        });
    }

    pub fn warnings(&self) -> &[ConvergenceWarning] {
        &self.warnings
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    pub fn into_warnings(self) -> Vec<ConvergenceWarning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_carry_current_date() {
        let mut diag = Diagnostics::new();
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        diag.set_date(7, d);
        diag.warn(WarningKind::NoSimilarWindows, "rho=0.9");
        assert_eq!(diag.count(WarningKind::NoSimilarWindows), 1);
        assert_eq!(diag.count(WarningKind::SolverNotConverged), 0);
        let w = &diag.warnings()[0];
        assert_eq!(w.date_index, 7);
        assert_eq!(w.date, Some(d));
    }
}
