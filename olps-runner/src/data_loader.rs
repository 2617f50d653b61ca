//! Wide-format CSV price loading.
//!
//! The expected layout is one row per trading date and one column per asset:
//!
//! ```text
//! date,AAPL,MSFT,SPY
//! 2024-01-02,185.64,370.87,472.65
//! 2024-01-03,184.25,370.60,468.79
//! ```
//!
//! Dates are ISO `YYYY-MM-DD` and must be strictly increasing. Every cell must
//! hold a price; gaps are rejected rather than filled, since the engine needs a
//! dense matrix. Structural checks beyond parsing are delegated to
//! [`PriceMatrix::new`].

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;

use olps_core::{DataError, PriceMatrix};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors from the price loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("first column must be 'date', found '{0}'")]
    MissingDateColumn(String),
    #[error("line {line}: cannot parse date '{value}' (expected YYYY-MM-DD)")]
    BadDate { line: u64, value: String },
    #[error("line {line}: missing price for '{asset}'")]
    MissingPrice { line: u64, asset: String },
    #[error("line {line}: cannot parse price '{value}' for '{asset}'")]
    BadPrice {
        line: u64,
        asset: String,
        value: String,
    },
    #[error("invalid price data: {0}")]
    Data(#[from] DataError),
}

/// Load a price matrix from a CSV file on disk.
pub fn load_prices_csv(path: &Path) -> Result<PriceMatrix, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let matrix = read_prices_csv(file)?;
    tracing::debug!(
        path = %path.display(),
        dates = matrix.n_dates(),
        assets = matrix.n_assets(),
        "loaded prices"
    );
    Ok(matrix)
}

/// Parse a price matrix from any CSV reader.
pub fn read_prices_csv<R: Read>(reader: R) -> Result<PriceMatrix, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let mut columns = headers.iter();
    match columns.next() {
        Some(first) if first.eq_ignore_ascii_case("date") => {}
        other => {
            return Err(LoadError::MissingDateColumn(
                other.unwrap_or_default().to_string(),
            ))
        }
    }
    let assets: Vec<String> = columns.map(str::to_string).collect();

    let mut dates = Vec::new();
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());

        let raw_date = record.get(0).unwrap_or_default();
        let date = NaiveDate::parse_from_str(raw_date, DATE_FORMAT).map_err(|_| {
            LoadError::BadDate {
                line,
                value: raw_date.to_string(),
            }
        })?;

        let mut row = Vec::with_capacity(assets.len());
        for (i, asset) in assets.iter().enumerate() {
            let cell = record.get(i + 1).unwrap_or_default();
            if cell.is_empty() {
                return Err(LoadError::MissingPrice {
                    line,
                    asset: asset.clone(),
                });
            }
            let price: f64 = cell.parse().map_err(|_| LoadError::BadPrice {
                line,
                asset: asset.clone(),
                value: cell.to_string(),
            })?;
            row.push(price);
        }
        dates.push(date);
        rows.push(row);
    }

    Ok(PriceMatrix::new(dates, assets, rows)?)
}
