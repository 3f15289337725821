//! Immutable records produced by the broker: fills, equity marks,
//! liquidations and the end-of-run settlement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::order::OrderSide;

/// A fill. `price` is after slippage; `stake` is the cash notional committed
/// (buy) or released (sell), which is what the fee is charged on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: DateTime<Utc>,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
    pub fee: f64,
    pub stake: f64,
    /// Realized on sells against the average entry price, net of this
    /// fill's fee. 0 for buys.
    pub realized_pnl: f64,
}

impl Trade {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }

    pub fn is_close(&self) -> bool {
        self.side == OrderSide::Sell
    }
}

/// Account equity at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Forced close triggered by the margin check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub quantity: f64,
    pub entry_price: f64,
}

/// Closing of a still-open position at the final bar of a completed run.
/// Carries no fee or slippage and is kept out of the trade log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub quantity: f64,
    pub realized_pnl: f64,
}
