//! Dense price matrix: rows are trading dates, columns are assets.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// A validated, gap-free table of positive prices.
///
/// Invariants (checked once in [`PriceMatrix::new`]):
/// - at least 2 dates, strictly increasing
/// - at least 1 asset, identifiers unique
/// - every row has one finite, strictly positive price per asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceMatrix {
    dates: Vec<NaiveDate>,
    assets: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl PriceMatrix {
    pub fn new(
        dates: Vec<NaiveDate>,
        assets: Vec<String>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self, DataError> {
        if dates.len() < 2 {
            return Err(DataError::TooFewDates { found: dates.len() });
        }
        if dates.len() != rows.len() {
            return Err(DataError::RowCountMismatch {
                dates: dates.len(),
                rows: rows.len(),
            });
        }
        if assets.is_empty() {
            return Err(DataError::NoAssets);
        }

        let mut seen = HashSet::with_capacity(assets.len());
        for asset in &assets {
            if !seen.insert(asset.as_str()) {
                return Err(DataError::DuplicateAsset(asset.clone()));
            }
        }

        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(DataError::DatesNotIncreasing {
                    previous: pair[0],
                    next: pair[1],
                });
            }
        }

        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != assets.len() {
                return Err(DataError::RaggedRow {
                    row: row_idx,
                    expected: assets.len(),
                    found: row.len(),
                });
            }
            for (asset_idx, &value) in row.iter().enumerate() {
                if !value.is_finite() || value <= 0.0 {
                    return Err(DataError::InvalidPrice {
                        date: dates[row_idx],
                        asset: assets[asset_idx].clone(),
                        value,
                    });
                }
            }
        }

        Ok(Self {
            dates,
            assets,
            rows,
        })
    }

    /// Build a matrix from price relatives, starting every asset at 1.0.
    ///
    /// `relatives[0]` is ignored beyond its length (conventionally all ones);
    /// row `t` of the result is `row[t-1] * relatives[t]`.
    pub fn from_relatives(
        dates: Vec<NaiveDate>,
        assets: Vec<String>,
        relatives: &[Vec<f64>],
    ) -> Result<Self, DataError> {
        let mut rows = Vec::with_capacity(relatives.len());
        let mut current = vec![1.0; assets.len()];
        for (t, rel) in relatives.iter().enumerate() {
            if t > 0 {
                current = current
                    .iter()
                    .zip(rel.iter())
                    .map(|(p, r)| p * r)
                    .collect();
            }
            rows.push(current.clone());
        }
        Self::new(dates, assets, rows)
    }

    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    pub fn n_assets(&self) -> usize {
        self.assets.len()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Price relatives per date. `relatives()[0]` is all ones.
    pub fn relatives(&self) -> Vec<Vec<f64>> {
        let mut out = Vec::with_capacity(self.rows.len());
        out.push(vec![1.0; self.assets.len()]);
        for pair in self.rows.windows(2) {
            out.push(
                pair[1]
                    .iter()
                    .zip(pair[0].iter())
                    .map(|(now, prev)| now / prev)
                    .collect(),
            );
        }
        out
    }

    /// Restrict the matrix to a subset of assets, in the order given.
    pub fn select_assets(&self, assets: &[String]) -> Result<PriceMatrix, DataError> {
        let mut columns = Vec::with_capacity(assets.len());
        for asset in assets {
            let idx = self
                .assets
                .iter()
                .position(|a| a == asset)
                .ok_or_else(|| DataError::UnknownAsset(asset.clone()))?;
            columns.push(idx);
        }
        let rows = self
            .rows
            .iter()
            .map(|row| columns.iter().map(|&c| row[c]).collect())
            .collect();
        PriceMatrix::new(self.dates.clone(), assets.to_vec(), rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect()
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("A{i}")).collect()
    }

    #[test]
    fn rejects_single_date() {
        let err = PriceMatrix::new(dates(1), names(2), vec![vec![1.0, 2.0]]).unwrap_err();
        assert_eq!(err, DataError::TooFewDates { found: 1 });
    }

    #[test]
    fn rejects_non_positive_price() {
        let err = PriceMatrix::new(
            dates(2),
            names(2),
            vec![vec![1.0, 2.0], vec![1.0, 0.0]],
        )
        .unwrap_err();
        assert!(matches!(err, DataError::InvalidPrice { value, .. } if value == 0.0));
    }

    #[test]
    fn rejects_nan_price() {
        let err = PriceMatrix::new(
            dates(2),
            names(1),
            vec![vec![1.0], vec![f64::NAN]],
        )
        .unwrap_err();
        assert!(matches!(err, DataError::InvalidPrice { .. }));
    }

    #[test]
    fn rejects_unsorted_dates() {
        let mut d = dates(3);
        d.swap(1, 2);
        let err = PriceMatrix::new(d, names(1), vec![vec![1.0]; 3]).unwrap_err();
        assert!(matches!(err, DataError::DatesNotIncreasing { .. }));
    }

    #[test]
    fn rejects_duplicate_assets() {
        let err = PriceMatrix::new(
            dates(2),
            vec!["X".into(), "X".into()],
            vec![vec![1.0, 1.0]; 2],
        )
        .unwrap_err();
        assert_eq!(err, DataError::DuplicateAsset("X".into()));
    }

    #[test]
    fn rejects_ragged_row() {
        let err = PriceMatrix::new(dates(2), names(2), vec![vec![1.0, 1.0], vec![1.0]])
            .unwrap_err();
        assert!(matches!(err, DataError::RaggedRow { row: 1, .. }));
    }

    #[test]
    fn relatives_start_with_ones() {
        let m = PriceMatrix::new(
            dates(3),
            names(2),
            vec![vec![10.0, 20.0], vec![11.0, 18.0], vec![11.0, 27.0]],
        )
        .unwrap();
        let rel = m.relatives();
        assert_eq!(rel.len(), 3);
        assert_eq!(rel[0], vec![1.0, 1.0]);
        assert!((rel[1][0] - 1.1).abs() < 1e-12);
        assert!((rel[1][1] - 0.9).abs() < 1e-12);
        assert!((rel[2][1] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn from_relatives_rebuilds_prices() {
        let rel = vec![vec![1.0, 1.0], vec![1.1, 0.9], vec![1.0, 1.2]];
        let m = PriceMatrix::from_relatives(dates(3), names(2), &rel).unwrap();
        let back = m.relatives();
        for (a, b) in rel.iter().flatten().zip(back.iter().flatten()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn select_assets_reorders_columns() {
        let m = PriceMatrix::new(
            dates(2),
            names(3),
            vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]],
        )
        .unwrap();
        let sub = m.select_assets(&["A2".into(), "A0".into()]).unwrap();
        assert_eq!(sub.assets(), &["A2".to_string(), "A0".to_string()]);
        assert_eq!(sub.rows()[1], vec![6.0, 4.0]);
        assert!(matches!(
            m.select_assets(&["ZZ".into()]),
            Err(DataError::UnknownAsset(_))
        ));
    }
}
