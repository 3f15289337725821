//! LeverLab Runner: config files, risk metrics, parameter sweeps, export.
//!
//! This crate builds on `leverlab-core` to provide:
//! - TOML backtest configuration with data source selection
//! - Single-run orchestration with content-addressed run ids
//! - Risk analysis (returns, Sharpe/Sortino/Calmar, drawdown, crash streaks)
//! - Parallel grid optimizer with a configurable objective
//! - CSV/JSON/Markdown artifact export

pub mod config;
pub mod export;
pub mod fitness;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError, DataConfig, DataSource, RiskConfig, SweepConfig};
pub use fitness::Objective;
pub use metrics::{CrashStreakRule, RiskAnalyzer, RiskReport};
pub use runner::{run_single, run_spec, run_sweep, BacktestSpec, RunError, RunId, RunReport};
pub use sweep::{Optimizer, ParamGrid, SweepError, SweepOutcome, SweepRow};
