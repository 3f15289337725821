//! Backtesting engine: the per-bar account state machine.
//!
//! The engine pulls bars from a validated `PriceSeries`, marks the broker to
//! market, runs the margin check, asks the strategy for orders and routes them
//! to the broker. See `loop_runner` for the exact per-bar order.

pub mod loop_runner;
pub mod state;

pub use loop_runner::BacktestEngine;
pub use state::{EngineConfig, EngineStatus, LiquidationPolicy, RunResult};
