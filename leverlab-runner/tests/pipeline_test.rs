//! Integration tests for the runner: config file in, reports and artifacts out.
//!
//! Uses the seeded synthetic provider so every run sees the same bars.

use std::path::Path;

use leverlab_core::EngineStatus;
use leverlab_runner::export::{save_artifacts, save_sweep};
use leverlab_runner::{run_single, run_sweep, BacktestConfig, Objective, RunError, RunReport};

const CONFIG: &str = r#"
[data]
symbol = "BTCUSDT"
interval = "1h"
start = "2024-04-01T00:00:00Z"
end = "2024-05-01T00:00:00Z"
source = { type = "synthetic", seed = 7, start_price = 30000.0, step = 60.0 }
cache_ttl_secs = 60

[engine]
initial_capital = 10000.0
leverage = 5.0
fee_taker = 0.0005
fee_maker = 0.0002
liquidation = "continue_flat"

[strategy]
type = "grid"
grid_size_pct = 0.01
base_qty = 100.0

[sweep]
objective = "sharpe"
[sweep.grid]
leverage = [2.0, 5.0]
grid_size_pct = [0.005, 0.01, 0.02]
"#;

fn config() -> BacktestConfig {
    BacktestConfig::from_toml_str(CONFIG).unwrap()
}

fn single(config: &BacktestConfig) -> Result<RunReport, RunError> {
    run_single(config, config.provider().as_ref())
}

fn csv_config(dir: &Path) -> BacktestConfig {
    let toml = CONFIG.replace(
        r#"source = { type = "synthetic", seed = 7, start_price = 30000.0, step = 60.0 }"#,
        &format!("source = {{ type = \"csv\", dir = {:?} }}", dir.display().to_string()),
    );
    BacktestConfig::from_toml_str(&toml).unwrap()
}

fn write_hourly_csv(path: &Path) {
    let mut rows = String::from("timestamp,close\n");
    let start = chrono::DateTime::parse_from_rfc3339("2024-04-01T00:00:00Z").unwrap();
    for i in 0..48 {
        let ts = start + chrono::Duration::hours(i);
        let close = 30_000.0 + (i as f64 * 0.7).sin() * 900.0;
        rows.push_str(&format!("{},{close}\n", ts.to_rfc3339()));
    }
    std::fs::write(path, rows).unwrap();
}

#[test]
fn single_run_processes_every_bar() {
    let report = single(&config()).unwrap();
    assert_eq!(report.symbol, "BTCUSDT");
    assert_eq!(report.result.status, EngineStatus::Complete);
    assert_eq!(report.result.bars_processed, 30 * 24);
    assert_eq!(report.result.equity_curve.len(), 30 * 24);
    assert_eq!(report.metrics.trade_count, report.result.trades.len());
    assert!(report.metrics.final_equity.is_finite());
}

#[test]
fn single_run_is_reproducible() {
    let a = single(&config()).unwrap();
    let b = single(&config()).unwrap();
    assert_eq!(a.run_id, b.run_id);
    assert_eq!(a.dataset_hash, b.dataset_hash);
    assert_eq!(a.result.equity_values(), b.result.equity_values());
}

#[test]
fn sweep_covers_the_grid_and_picks_the_max() {
    let config = config();
    let outcomes = run_sweep(&config, config.provider().as_ref(), true).unwrap();
    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert_eq!(outcome.symbol, "BTCUSDT");
    assert_eq!(outcome.objective, Objective::Sharpe);
    assert_eq!(outcome.combinations, 6);
    assert_eq!(outcome.len(), 6);
    let indices: Vec<usize> = outcome.rows.iter().map(|r| r.index).collect();
    assert_eq!(indices, (0..6).collect::<Vec<_>>());

    let best = outcome.best().unwrap();
    for row in &outcome.rows {
        assert!(best.score >= row.score);
    }
}

#[test]
fn sweep_without_grid_section_is_an_error() {
    let mut config = config();
    config.sweep = None;
    assert!(matches!(
        run_sweep(&config, config.provider().as_ref(), false),
        Err(RunError::NoSweep)
    ));
}

#[test]
fn missing_csv_data_is_reported() {
    let toml = CONFIG.replace(
        r#"source = { type = "synthetic", seed = 7, start_price = 30000.0, step = 60.0 }"#,
        r#"source = { type = "csv", dir = "/definitely/not/here" }"#,
    );
    let config = BacktestConfig::from_toml_str(&toml).unwrap();
    assert!(matches!(single(&config), Err(RunError::Data(_))));
}

#[test]
fn cached_series_survives_source_removal_within_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("BTCUSDT_1h.csv");
    write_hourly_csv(&file);
    let config = csv_config(dir.path());
    let provider = config.provider();

    let first = run_single(&config, provider.as_ref()).unwrap();
    assert_eq!(first.result.bars_processed, 48);
    std::fs::remove_file(&file).unwrap();

    let second = run_single(&config, provider.as_ref()).unwrap();
    assert_eq!(second.dataset_hash, first.dataset_hash);
    // A fresh provider has no cache and goes back to the missing file.
    assert!(matches!(single(&config), Err(RunError::Data(_))));
}

#[test]
fn sweep_runs_each_symbol_independently() {
    let toml = CONFIG.replace(
        r#"symbol = "BTCUSDT""#,
        r#"symbol = "BTCUSDT"
symbols = ["ETHUSDT", "BNBUSDT"]"#,
    );
    let config = BacktestConfig::from_toml_str(&toml).unwrap();
    let outcomes = run_sweep(&config, config.provider().as_ref(), true).unwrap();

    let symbols: Vec<&str> = outcomes.iter().map(|o| o.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT", "BNBUSDT"]);
    for outcome in &outcomes {
        assert_eq!(outcome.len(), 6);
        assert!(outcome.best().is_some());
    }
    // Each symbol gets its own seeded walk.
    assert_ne!(
        outcomes[0].rows[0].report.final_equity,
        outcomes[1].rows[0].report.final_equity
    );
}

#[test]
fn artifacts_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let report = single(&config()).unwrap();
    let run_dir = save_artifacts(&report, dir.path()).unwrap();
    let json = std::fs::read_to_string(run_dir.join("report.json")).unwrap();
    let loaded: RunReport = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded.run_id, report.run_id);
    assert_eq!(loaded.result.trades.len(), report.result.trades.len());

    let equity = std::fs::read_to_string(run_dir.join("equity.csv")).unwrap();
    assert_eq!(equity.lines().count(), report.result.equity_curve.len() + 1);
}

#[test]
fn sweep_csv_lists_params_as_columns() {
    let dir = tempfile::tempdir().unwrap();
    let config = config();
    let outcomes = run_sweep(&config, config.provider().as_ref(), false).unwrap();
    let path = save_sweep(&outcomes[0], dir.path()).unwrap();
    let csv = std::fs::read_to_string(&path).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.starts_with("index,run_id,grid_size_pct,leverage,status,score"));
    assert_eq!(csv.lines().count(), 7);
    assert!(dir.path().join("sweep.json").exists());
}

#[test]
fn sweep_export_includes_the_winners_trades() {
    let dir = tempfile::tempdir().unwrap();
    let config = config();
    let outcomes = run_sweep(&config, config.provider().as_ref(), true).unwrap();
    let outcome = &outcomes[0];
    let best = outcome.best_run.as_ref().unwrap();
    save_sweep(outcome, dir.path()).unwrap();

    let trades = std::fs::read_to_string(dir.path().join("best_trades.csv")).unwrap();
    assert_eq!(trades.lines().count(), best.trades.len() + 1);
    let equity = std::fs::read_to_string(dir.path().join("best_equity.csv")).unwrap();
    assert_eq!(equity.lines().count(), best.equity_curve.len() + 1);
}
