//! Engine configuration, run status, and run result types.

use serde::{Deserialize, Serialize};

use crate::broker::{validate_leverage, BrokerSimulator, CostModel};
use crate::domain::{EquityPoint, LiquidationEvent, OrderKind, Settlement, Trade};
use crate::error::{require_positive, EngineError};

/// What the engine does after a forced close.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidationPolicy {
    /// Stop at the liquidation bar with status `Liquidated`.
    #[default]
    Terminate,
    /// Keep processing bars with a flat account; the strategy may re-enter.
    ContinueFlat,
}

/// Account and execution settings for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_capital: f64,
    pub leverage: f64,
    #[serde(flatten)]
    pub costs: CostModel,
    #[serde(default)]
    pub liquidation: LiquidationPolicy,
}

impl EngineConfig {
    /// Frictionless, unlevered config that stops on liquidation.
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            leverage: 1.0,
            costs: CostModel::frictionless(),
            liquidation: LiquidationPolicy::Terminate,
        }
    }

    pub fn with_leverage(mut self, leverage: f64) -> Self {
        self.leverage = leverage;
        self
    }

    pub fn with_costs(mut self, costs: CostModel) -> Self {
        self.costs = costs;
        self
    }

    /// Same taker/maker rate for both kinds of order.
    pub fn with_fee(mut self, fee: f64) -> Self {
        self.costs.fee_taker = fee;
        self.costs.fee_maker = fee;
        self
    }

    pub fn with_slippage(mut self, slippage_pct: f64) -> Self {
        self.costs.slippage_pct = slippage_pct;
        self
    }

    pub fn with_order_kind(mut self, order_kind: OrderKind) -> Self {
        self.costs.order_kind = order_kind;
        self
    }

    pub fn with_liquidation(mut self, policy: LiquidationPolicy) -> Self {
        self.liquidation = policy;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        require_positive("initial_capital", self.initial_capital)?;
        validate_leverage(self.leverage)?;
        self.costs.validate()
    }

    /// Fresh broker for one run.
    pub fn broker(&self) -> Result<BrokerSimulator, EngineError> {
        BrokerSimulator::new(self.initial_capital, self.leverage, self.costs)
    }
}

/// Engine lifecycle. `Init -> Running -> {Liquidated | Complete | Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Init,
    Running,
    Liquidated,
    Complete,
    Cancelled,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Running => "running",
            Self::Liquidated => "liquidated",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Result of a backtest run. Immutable once `run` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub status: EngineStatus,
    /// Every fill, in execution order.
    pub trades: Vec<Trade>,
    /// One point per processed bar.
    pub equity_curve: Vec<EquityPoint>,
    pub liquidations: Vec<LiquidationEvent>,
    /// Close of the position still open at the end of a completed run.
    pub final_settlement: Option<Settlement>,
    pub final_equity: f64,
    pub final_cash: f64,
    pub bars_processed: usize,
    pub rejected_orders: usize,
}

impl RunResult {
    pub fn equity_values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.equity).collect()
    }

    pub fn total_fees(&self) -> f64 {
        self.trades.iter().map(|t| t.fee).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults() {
        let config = EngineConfig::new(10_000.0);
        assert_eq!(config.leverage, 1.0);
        assert_eq!(config.liquidation, LiquidationPolicy::Terminate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_catches_each_field() {
        assert!(EngineConfig::new(0.0).validate().is_err());
        assert!(EngineConfig::new(1.0).with_leverage(0.0).validate().is_err());
        assert!(EngineConfig::new(1.0).with_fee(-0.01).validate().is_err());
        assert!(EngineConfig::new(1.0).with_slippage(1.5).validate().is_err());
    }

    #[test]
    fn config_deserializes_flat_cost_fields() {
        let json = r#"{
            "initial_capital": 10000.0,
            "leverage": 10.0,
            "fee_taker": 0.0005,
            "fee_maker": 0.0002,
            "order_kind": "limit",
            "slippage_pct": 0.0,
            "liquidation": "continue_flat"
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.costs.order_kind, OrderKind::Limit);
        assert_eq!(config.costs.fee_rate(), 0.0002);
        assert_eq!(config.liquidation, LiquidationPolicy::ContinueFlat);
    }

    #[test]
    fn status_display_is_lowercase() {
        assert_eq!(EngineStatus::Complete.to_string(), "complete");
        assert_eq!(EngineStatus::Liquidated.to_string(), "liquidated");
    }
}
