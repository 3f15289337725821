//! LeverLab CLI: run and sweep leveraged backtests from TOML config files.
//!
//! Commands:
//! - `run`: execute one backtest and print its risk report
//! - `sweep`: evaluate every combination of the config's `[sweep.grid]`,
//!   once per configured symbol

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use leverlab_runner::export::{export_trades_csv, save_artifacts, save_sweep};
use leverlab_runner::{run_single, run_sweep, BacktestConfig, RunReport, SweepOutcome};

#[derive(Parser)]
#[command(name = "leverlab", about = "LeverLab CLI: leveraged backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Write the trade log to this CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Save the full artifact set (JSON, Markdown, CSVs) under this directory.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Optimize over the config's `[sweep.grid]`.
    Sweep {
        /// Path to a TOML config file with a `[sweep]` section.
        #[arg(long)]
        config: PathBuf,

        /// Run combinations one at a time instead of in parallel.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Number of leaderboard rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Write sweep.csv, sweep.json and the winner's trades and equity
        /// into `DIR/{SYMBOL}/`.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, csv, out } => run_cmd(config, csv, out),
        Commands::Sweep {
            config,
            sequential,
            top,
            out,
        } => sweep_cmd(config, sequential, top, out),
    }
}

fn load_config(path: &Path) -> Result<BacktestConfig> {
    BacktestConfig::load(path).with_context(|| format!("loading config {}", path.display()))
}

fn run_cmd(config_path: PathBuf, csv: Option<PathBuf>, out: Option<PathBuf>) -> Result<()> {
    let config = load_config(&config_path)?;
    let provider = config.provider();
    let report = run_single(&config, provider.as_ref())?;
    print_summary(&report);

    if let Some(path) = csv {
        std::fs::write(&path, export_trades_csv(&report.result.trades)?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "trade log written");
    }
    if let Some(dir) = out {
        let run_dir = save_artifacts(&report, &dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn sweep_cmd(config_path: PathBuf, sequential: bool, top: usize, out: Option<PathBuf>) -> Result<()> {
    let config = load_config(&config_path)?;
    let provider = config.provider();
    let outcomes = run_sweep(&config, provider.as_ref(), !sequential)?;
    for outcome in &outcomes {
        print_leaderboard(outcome, top);
        if let Some(dir) = &out {
            let path = save_sweep(outcome, &dir.join(&outcome.symbol))?;
            println!("Sweep saved to: {}", path.display());
        }
    }
    if outcomes.len() > 1 {
        print_best_per_symbol(&outcomes);
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    let m = &report.metrics;
    let result = &report.result;
    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:         {}", report.symbol);
    println!("Strategy:       {}", report.strategy);
    println!("Leverage:       {}x", report.spec.engine.leverage);
    println!("Status:         {}", result.status);
    println!("Bars:           {}", result.bars_processed);
    println!("Trades:         {}", m.trade_count);
    println!("Rejected:       {}", result.rejected_orders);
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {:.2}", m.final_equity);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Annualized:     {:.2}%", m.annualized_return * 100.0);
    println!("Volatility:     {:.2}%", m.volatility * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Sortino:        {:.3}", m.sortino);
    println!("Calmar:         {:.3}", m.calmar);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Fees:           {:.2}", m.total_fees);
    println!("Liquidations:   {}", m.liquidation_count);
    println!("Crash Streaks:  {}", m.crash_streaks);
    if let Some(s) = &result.final_settlement {
        println!();
        println!(
            "Open position of {:.8} settled at {:.4} ({:+.2})",
            s.quantity, s.price, s.realized_pnl
        );
    }
}

fn print_leaderboard(outcome: &SweepOutcome, top: usize) {
    println!();
    println!(
        "=== Sweep {}: {} of {} combinations, objective {} ===",
        outcome.symbol,
        outcome.len(),
        outcome.combinations,
        outcome.objective.as_str()
    );
    if outcome.cancelled {
        println!("WARNING: sweep was cancelled before every combination ran");
    }
    for (rank, row) in outcome.top_n(top).into_iter().enumerate() {
        let params: Vec<String> = row.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!(
            "{:>3}. score {:>14.4}  equity {:>12.2}  liq {:>2}  {:<10}  {}",
            rank + 1,
            row.score,
            row.report.final_equity,
            row.report.liquidation_count,
            row.status.to_string(),
            params.join(" ")
        );
    }
}

fn print_best_per_symbol(outcomes: &[SweepOutcome]) {
    println!();
    println!("=== Best per symbol ===");
    for outcome in outcomes {
        match outcome.best() {
            Some(row) => {
                let params: Vec<String> =
                    row.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
                println!(
                    "{:<10}  score {:>14.4}  equity {:>12.2}  {}",
                    outcome.symbol,
                    row.score,
                    row.report.final_equity,
                    params.join(" ")
                );
            }
            None => println!("{:<10}  no winner", outcome.symbol),
        }
    }
}
