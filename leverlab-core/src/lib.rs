//! LeverLab Core: domain types, strategies, broker simulator, bar loop, data providers.
//!
//! This crate contains the leveraged backtesting engine:
//! - Domain types (bars, price series, orders, trades, positions, account)
//! - Strategy trait with grid and breakout implementations
//! - Broker simulator with fees, slippage and isolated-margin liquidation
//! - Bar-by-bar engine state machine
//! - Market data providers (synthetic, CSV, TTL cache)

pub mod broker;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod strategy;

pub use broker::{BrokerSimulator, CostModel, ExecOutcome, Rejection};
pub use domain::{
    Account, EquityPoint, Interval, LiquidationEvent, Order, OrderKind, OrderSide, Position,
    PriceBar, PriceSeries, Settlement, Trade,
};
pub use engine::{BacktestEngine, EngineConfig, EngineStatus, LiquidationPolicy, RunResult};
pub use error::EngineError;
pub use strategy::{BreakoutStrategy, GridStrategy, Strategy, StrategyConfig};
