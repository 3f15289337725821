use serde::{Deserialize, Serialize};

/// Long position in a single instrument.
///
/// `borrowed` is the financed part of the notional. It is repaid pro rata
/// when units are sold, so `quantity * price - borrowed` is what the position
/// is worth to the account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: f64,
    pub entry_price: f64,
    pub borrowed: f64,
}

impl Position {
    pub fn flat() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    /// Account value of the position: posted margin plus unrealized PnL.
    pub fn net_value(&self, price: f64) -> f64 {
        self.market_value(price) - self.borrowed
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity * (price - self.entry_price)
    }

    /// Price at which the posted margin is exhausted: `entry * (1 - 1/L)`.
    pub fn liquidation_price(&self, leverage: f64) -> f64 {
        self.entry_price * (1.0 - 1.0 / leverage)
    }
}
