//! Reporting and export: JSON, CSV, and Markdown artifact generation.
//!
//! Row exports (trades, equity, liquidations, metrics, sweep leaderboard) go
//! through `csv::Writer`; the full run report is written as JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use leverlab_core::{EquityPoint, LiquidationEvent, Trade};

use crate::runner::RunReport;
use crate::sweep::SweepOutcome;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

// ─── CSV export ─────────────────────────────────────────────────────

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: timestamp, side, price, quantity, notional, stake, fee, realized_pnl
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "side",
        "price",
        "quantity",
        "notional",
        "stake",
        "fee",
        "realized_pnl",
    ])?;
    for t in trades {
        wtr.write_record([
            &t.timestamp.to_rfc3339(),
            t.side.as_str(),
            &format!("{:.6}", t.price),
            &format!("{:.8}", t.quantity),
            &format!("{:.4}", t.notional()),
            &format!("{:.4}", t.stake),
            &format!("{:.6}", t.fee),
            &format!("{:.6}", t.realized_pnl),
        ])?;
    }
    finish(wtr)
}

pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "timestamp", "equity"])?;
    for (i, point) in equity_curve.iter().enumerate() {
        wtr.write_record([
            &i.to_string(),
            &point.timestamp.to_rfc3339(),
            &format!("{:.6}", point.equity),
        ])?;
    }
    finish(wtr)
}

pub fn export_liquidations_csv(events: &[LiquidationEvent]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "price", "quantity", "entry_price"])?;
    for e in events {
        wtr.write_record([
            &e.timestamp.to_rfc3339(),
            &format!("{:.6}", e.price),
            &format!("{:.8}", e.quantity),
            &format!("{:.6}", e.entry_price),
        ])?;
    }
    finish(wtr)
}

/// Two columns, one row per metric, sorted by name.
pub fn export_metrics_csv(table: &BTreeMap<String, f64>) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["metric", "value"])?;
    for (name, value) in table {
        wtr.write_record([name.as_str(), &value.to_string()])?;
    }
    finish(wtr)
}

/// One row per evaluated combination, in enumeration order. Parameter
/// columns follow the grid's names.
pub fn export_sweep_csv(outcome: &SweepOutcome) -> Result<String> {
    let names: Vec<&String> = outcome
        .rows
        .first()
        .map(|row| row.params.keys().collect())
        .unwrap_or_default();

    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["index", "run_id"];
    header.extend(names.iter().map(|n| n.as_str()));
    header.extend([
        "status",
        "score",
        "final_equity",
        "total_return",
        "max_drawdown",
        "sharpe",
        "liquidation_count",
    ]);
    wtr.write_record(&header)?;

    for row in &outcome.rows {
        let mut record = vec![row.index.to_string(), row.run_id.clone()];
        for name in &names {
            let value = row.params.get(*name).copied().unwrap_or(f64::NAN);
            record.push(value.to_string());
        }
        record.extend([
            row.status.to_string(),
            row.score.to_string(),
            format!("{:.4}", row.report.final_equity),
            format!("{:.6}", row.report.total_return),
            format!("{:.6}", row.report.max_drawdown),
            format!("{:.4}", row.report.sharpe),
            row.report.liquidation_count.to_string(),
        ]);
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single run.
///
/// Creates `{symbol}_{strategy}_{run_id prefix}/` under `output_dir` with
/// `report.json`, `report.md`, `trades.csv`, `equity.csv`, `liquidations.csv`
/// and `metrics.csv`. Returns the created directory.
pub fn save_artifacts(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    let prefix: String = report.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{}_{}", report.symbol, report.strategy, prefix));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let files = [
        ("report.json", export_json(report)?),
        ("report.md", generate_report(report)),
        ("trades.csv", export_trades_csv(&report.result.trades)?),
        ("equity.csv", export_equity_csv(&report.result.equity_curve)?),
        (
            "liquidations.csv",
            export_liquidations_csv(&report.result.liquidations)?,
        ),
        ("metrics.csv", export_metrics_csv(&report.metrics.to_table())?),
    ];
    for (name, contents) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(run_dir)
}

/// Write `sweep.csv` and `sweep.json` into `output_dir`, plus
/// `best_trades.csv` and `best_equity.csv` when the sweep has a winner.
pub fn save_sweep(outcome: &SweepOutcome, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;
    let csv_path = output_dir.join("sweep.csv");
    let mut files = vec![
        ("sweep.csv", export_sweep_csv(outcome)?),
        (
            "sweep.json",
            serde_json::to_string_pretty(outcome).context("failed to serialize sweep")?,
        ),
    ];
    if let Some(run) = &outcome.best_run {
        files.push(("best_trades.csv", export_trades_csv(&run.trades)?));
        files.push(("best_equity.csv", export_equity_csv(&run.equity_curve)?));
    }
    for (name, contents) in files {
        let path = output_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(csv_path)
}

// ─── Markdown report ────────────────────────────────────────────────

pub fn generate_report(report: &RunReport) -> String {
    let m = &report.metrics;
    let engine = &report.spec.engine;
    let mut md = String::with_capacity(2048);

    md.push_str("# Backtest Report\n\n");
    md.push_str("| Field | Value |\n| --- | --- |\n");
    md.push_str(&format!("| Symbol | {} |\n", report.symbol));
    md.push_str(&format!("| Strategy | {} |\n", report.strategy));
    md.push_str(&format!("| Status | {} |\n", report.result.status));
    md.push_str(&format!("| Bars | {} |\n", report.result.bars_processed));
    md.push_str(&format!(
        "| Capital | {:.2} at {}x |\n",
        engine.initial_capital, engine.leverage
    ));
    md.push_str(&format!("| Run ID | {} |\n", report.run_id));
    md.push_str(&format!("| Dataset Hash | {} |\n\n", report.dataset_hash));

    md.push_str("## Performance\n\n");
    md.push_str("| Metric | Value |\n| --- | --- |\n");
    md.push_str(&format!("| Final Equity | {:.2} |\n", m.final_equity));
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return * 100.0));
    md.push_str(&format!(
        "| Annualized Return | {:.2}% |\n",
        m.annualized_return * 100.0
    ));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe));
    md.push_str(&format!("| Sortino | {:.3} |\n", m.sortino));
    md.push_str(&format!("| Calmar | {:.3} |\n", m.calmar));
    md.push_str(&format!("| Trades | {} |\n", m.trade_count));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate * 100.0));
    md.push_str(&format!("| Fees | {:.2} |\n", m.total_fees));
    md.push_str(&format!("| Liquidations | {} |\n", m.liquidation_count));
    md.push_str(&format!("| Crash Streaks | {} |\n", m.crash_streaks));

    if let Some(s) = &report.result.final_settlement {
        md.push_str(&format!(
            "\nOpen position of {:.8} settled at {:.4} ({:+.2}).\n",
            s.quantity, s.price, s.realized_pnl
        ));
    }
    md
}
