//! Orders emitted by strategies for the current bar.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

/// How orders are placed. Selects the fee schedule: market orders take
/// liquidity (taker rate), limit orders rest on the book (maker rate).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    #[default]
    Market,
    Limit,
}

/// A request to trade `quantity` units on the current bar.
///
/// No lifecycle beyond submission: the broker either fills it immediately
/// or drops it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub side: OrderSide,
    pub quantity: f64,
}

impl Order {
    pub fn buy(quantity: f64) -> Self {
        Self {
            side: OrderSide::Buy,
            quantity,
        }
    }

    pub fn sell(quantity: f64) -> Self {
        Self {
            side: OrderSide::Sell,
            quantity,
        }
    }
}
