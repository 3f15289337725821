//! Account: cash plus the single open position.

use serde::{Deserialize, Serialize};

use super::position::Position;

/// Cash and position of one simulated margin account.
///
/// The accounting identity holds after every operation:
/// `equity == cash + position.quantity * price - position.borrowed`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub cash: f64,
    pub position: Position,
}

impl Account {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            position: Position::flat(),
        }
    }

    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.position.net_value(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equity_with_no_position() {
        let account = Account::new(10_000.0);
        assert_eq!(account.equity(50.0), 10_000.0);
    }

    #[test]
    fn equity_with_unlevered_position() {
        let account = Account {
            cash: 9_000.0,
            position: Position {
                quantity: 10.0,
                entry_price: 100.0,
                borrowed: 0.0,
            },
        };
        // 9_000 + 10 * 110 = 10_100
        assert_eq!(account.equity(110.0), 10_100.0);
    }
}
