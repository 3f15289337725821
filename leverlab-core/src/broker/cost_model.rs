//! Cost model: slippage and maker/taker fees.
//!
//! Slippage is directional: buyers pay more, sellers receive less.
//! The fee rate is chosen by order kind, never by how a fill turned out.

use serde::{Deserialize, Serialize};

use crate::domain::{OrderKind, OrderSide};
use crate::error::{require_non_negative, EngineError};

/// Execution friction applied to every ordinary fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Fee rate for orders that take liquidity.
    pub fee_taker: f64,
    /// Fee rate for orders that rest on the book.
    pub fee_maker: f64,
    #[serde(default)]
    pub order_kind: OrderKind,
    /// Fractional adverse price adjustment (0.001 = 10 bps).
    #[serde(default)]
    pub slippage_pct: f64,
}

impl CostModel {
    pub fn new(
        fee_taker: f64,
        fee_maker: f64,
        order_kind: OrderKind,
        slippage_pct: f64,
    ) -> Result<Self, EngineError> {
        let model = Self {
            fee_taker,
            fee_maker,
            order_kind,
            slippage_pct,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn frictionless() -> Self {
        Self {
            fee_taker: 0.0,
            fee_maker: 0.0,
            order_kind: OrderKind::Market,
            slippage_pct: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        require_non_negative("fee_taker", self.fee_taker)?;
        require_non_negative("fee_maker", self.fee_maker)?;
        require_non_negative("slippage_pct", self.slippage_pct)?;
        if self.slippage_pct >= 1.0 {
            return Err(EngineError::invalid("slippage_pct", "must be < 1"));
        }
        Ok(())
    }

    /// Fee rate for the configured order kind.
    pub fn fee_rate(&self) -> f64 {
        match self.order_kind {
            OrderKind::Market => self.fee_taker,
            OrderKind::Limit => self.fee_maker,
        }
    }

    /// Reference price moved against the initiator.
    pub fn fill_price(&self, reference_price: f64, side: OrderSide) -> f64 {
        match side {
            OrderSide::Buy => reference_price * (1.0 + self.slippage_pct),
            OrderSide::Sell => reference_price * (1.0 - self.slippage_pct),
        }
    }

    /// Fee charged on `amount` (the stake on buys, the proceeds on sells).
    pub fn fee(&self, amount: f64) -> f64 {
        amount * self.fee_rate()
    }
}
