//! Reporting and export — JSON, CSV and plain-text artifacts.
//!
//! - **JSON**: the full `RunReport` with schema versioning
//! - **CSV**: the equity series (`date,gross,net,turnover,fee`) and the
//!   per-date weights (`date,<asset>...`)
//! - **Text**: a single-run summary and a batch comparison table for the CLI
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use olps_core::BacktestResult;

use crate::runner::{RunReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `RunReport` to pretty JSON.
pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

/// Deserialize a `RunReport` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunReport> {
    let report: RunReport =
        serde_json::from_str(json).context("failed to deserialize RunReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per completed date: `date,gross,net,turnover,fee`.
pub fn export_equity_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "gross", "net", "turnover", "fee"])?;
    for t in 0..result.len() {
        wtr.write_record([
            &result.dates[t].to_string(),
            &format!("{:.6}", result.gross_values[t]),
            &format!("{:.6}", result.net_values[t]),
            &format!("{:.8}", result.turnover[t]),
            &format!("{:.6}", result.fees[t]),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per completed date: `date` then one weight column per asset.
pub fn export_weights_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["date".to_string()];
    header.extend(result.assets.iter().cloned());
    wtr.write_record(&header)?;
    for (date, weights) in result.dates.iter().zip(&result.weights) {
        let mut row = vec![date.to_string()];
        row.extend(weights.iter().map(|w| format!("{w:.8}")));
        wtr.write_record(&row)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for one run.
///
/// Creates `{name}_{run_id prefix}/` under `output_dir` containing
/// `report.json`, `equity.csv` and `weights.csv`, and returns its path.
pub fn save_artifacts(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    let prefix: String = report.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{prefix}", sanitize(&report.name)));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("equity.csv"), export_equity_csv(&report.result)?)?;
    std::fs::write(run_dir.join("weights.csv"), export_weights_csv(&report.result)?)?;

    tracing::debug!(dir = %run_dir.display(), "artifacts written");
    Ok(run_dir)
}

/// Load a `RunReport` from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<RunReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

// ─── Text reports ───────────────────────────────────────────────────

fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

/// Human-readable summary of one run.
pub fn generate_summary(report: &RunReport) -> String {
    let r = &report.result;
    let m = &report.metrics;
    let s = &r.metadata.strategy;
    let mut out = String::new();

    out.push_str(&format!("{} ({})  run {}\n", s.name, s.id, report.run_id));
    if !s.executable {
        out.push_str("  benchmark with lookahead: not executable\n");
    }
    if let (Some(first), Some(last)) = (r.dates.first(), r.dates.last()) {
        out.push_str(&format!(
            "  {} .. {}  {} dates, {} assets, {} rebalances\n",
            first,
            last,
            m.n_dates,
            r.assets.len(),
            m.n_rebalances
        ));
    }
    if r.metadata.cancelled {
        out.push_str(&format!(
            "  CANCELLED after {} of {} dates\n",
            r.metadata.completed_dates, r.metadata.total_dates
        ));
    }
    out.push('\n');

    let rows = [
        ("Final value", format!("{:.2}", m.final_value)),
        ("Total return", pct(m.total_return)),
        ("CAGR", pct(m.cagr)),
        ("Volatility", pct(m.volatility)),
        ("Sharpe", format!("{:.3}", m.sharpe)),
        ("Sortino", format!("{:.3}", m.sortino)),
        ("Max drawdown", pct(m.max_drawdown)),
        ("Calmar", format!("{:.3}", m.calmar)),
        ("Win rate", pct(m.win_rate)),
        ("Avg turnover", format!("{:.4}", m.avg_turnover)),
        ("Total fees", format!("{:.2}", m.total_fees)),
        ("Cost drag", format!("{:.1} bps", m.cost_drag_bps)),
        ("Warnings", m.n_warnings.to_string()),
    ];
    for (label, value) in rows {
        out.push_str(&format!("  {label:<14} {value:>14}\n"));
    }
    out
}

/// One line per report, sorted as given.
pub fn generate_batch_table(reports: &[&RunReport]) -> String {
    let mut out = format!(
        "{:<20} {:<10} {:>14} {:>10} {:>8} {:>10} {:>12}\n",
        "job", "strategy", "final", "return", "sharpe", "max dd", "fees"
    );
    for report in reports {
        let m = &report.metrics;
        let flag = if report.cancelled() { " (cancelled)" } else { "" };
        out.push_str(&format!(
            "{:<20} {:<10} {:>14.2} {:>10} {:>8.3} {:>10} {:>12.2}{flag}\n",
            report.name,
            report.result.metadata.strategy.id,
            m.final_value,
            pct(m.total_return),
            m.sharpe,
            pct(m.max_drawdown),
            m.total_fees,
        ));
    }
    out
}
