//! Rebalancing-date selection.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How often the strategy is invoked and trades are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RebalanceFrequency {
    /// Every date.
    #[default]
    Daily,
    /// First trading date of each ISO week.
    Weekly,
    /// First trading date of each calendar month.
    Monthly,
    /// Every `n`-th date, starting at the first.
    EveryN { n: usize },
}

impl RebalanceFrequency {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            RebalanceFrequency::EveryN { n: 0 } => Err(ConfigError::InvalidRebalanceInterval),
            _ => Ok(()),
        }
    }
}

/// Ordered indices into `dates` on which to rebalance. Index 0 is always included.
pub fn select_rebalance_dates(
    dates: &[NaiveDate],
    frequency: RebalanceFrequency,
) -> Result<Vec<usize>, ConfigError> {
    frequency.validate()?;
    if dates.is_empty() {
        return Ok(Vec::new());
    }
    let selected = match frequency {
        RebalanceFrequency::Daily => (0..dates.len()).collect(),
        RebalanceFrequency::EveryN { n } => (0..dates.len()).step_by(n).collect(),
        RebalanceFrequency::Weekly => first_of_period(dates, |d| {
            let week = d.iso_week();
            (week.year(), week.week())
        }),
        RebalanceFrequency::Monthly => first_of_period(dates, |d| (d.year(), d.month())),
    };
    Ok(selected)
}

fn first_of_period<K: PartialEq>(dates: &[NaiveDate], key: impl Fn(&NaiveDate) -> K) -> Vec<usize> {
    let mut out = vec![0];
    for i in 1..dates.len() {
        if key(&dates[i]) != key(&dates[i - 1]) {
            out.push(i);
        }
    }
    out
}
