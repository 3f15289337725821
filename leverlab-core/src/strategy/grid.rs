//! Grid strategy: buy each `grid_size_pct` drop and sell each
//! `grid_size_pct` rise, measured from the level of the last trigger.

use chrono::{DateTime, Utc};

use super::Strategy;
use crate::domain::Order;
use crate::error::{require_positive, EngineError};

/// Percentage grid around a moving reference level.
///
/// The first observed price becomes the reference and produces no order.
/// Every trigger resets the reference to the triggering price, so
/// consecutive trigger levels are always at least `grid_size_pct` apart.
///
/// Each order carries `base_qty * leverage` of quote-currency exposure,
/// converted to units at the trigger price.
#[derive(Debug, Clone)]
pub struct GridStrategy {
    pub grid_size_pct: f64,
    pub leverage: f64,
    pub base_qty: f64,
    last_level: Option<f64>,
}

impl GridStrategy {
    pub fn new(grid_size_pct: f64, leverage: f64, base_qty: f64) -> Result<Self, EngineError> {
        require_positive("grid_size_pct", grid_size_pct)?;
        require_positive("leverage", leverage)?;
        require_positive("base_qty", base_qty)?;
        Ok(Self {
            grid_size_pct,
            leverage,
            base_qty,
            last_level: None,
        })
    }

    pub fn last_level(&self) -> Option<f64> {
        self.last_level
    }

    fn units_at(&self, price: f64) -> f64 {
        self.base_qty * self.leverage / price
    }
}

impl Strategy for GridStrategy {
    fn name(&self) -> &str {
        "grid"
    }

    fn generate(&mut self, _timestamp: DateTime<Utc>, price: f64) -> Vec<Order> {
        let Some(level) = self.last_level else {
            self.last_level = Some(price);
            return Vec::new();
        };

        let diff = (price - level) / level;
        if diff <= -self.grid_size_pct {
            self.last_level = Some(price);
            vec![Order::buy(self.units_at(price))]
        } else if diff >= self.grid_size_pct {
            self.last_level = Some(price);
            vec![Order::sell(self.units_at(price))]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderSide;

    fn ts() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    #[test]
    fn first_observation_sets_level_without_order() {
        let mut grid = GridStrategy::new(0.01, 10.0, 100.0).unwrap();
        assert!(grid.generate(ts(), 100.0).is_empty());
        assert_eq!(grid.last_level(), Some(100.0));
    }

    #[test]
    fn drop_beyond_grid_buys_leveraged_stake() {
        let mut grid = GridStrategy::new(0.01, 10.0, 100.0).unwrap();
        grid.generate(ts(), 100.0);
        let orders = grid.generate(ts(), 98.0);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Buy);
        assert!((orders[0].quantity - 1000.0 / 98.0).abs() < 1e-12);
        assert_eq!(grid.last_level(), Some(98.0));
    }

    #[test]
    fn rise_beyond_grid_sells() {
        let mut grid = GridStrategy::new(0.02, 1.0, 50.0).unwrap();
        grid.generate(ts(), 100.0);
        let orders = grid.generate(ts(), 102.5);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].side, OrderSide::Sell);
    }

    #[test]
    fn moves_inside_band_are_ignored_and_keep_level() {
        let mut grid = GridStrategy::new(0.01, 10.0, 100.0).unwrap();
        grid.generate(ts(), 100.0);
        assert!(grid.generate(ts(), 99.5).is_empty());
        assert!(grid.generate(ts(), 100.9).is_empty());
        assert_eq!(grid.last_level(), Some(100.0));
    }

    #[test]
    fn level_follows_triggers_not_every_bar() {
        let mut grid = GridStrategy::new(0.01, 1.0, 100.0).unwrap();
        grid.generate(ts(), 100.0);
        grid.generate(ts(), 98.0); // buy, level 98
        assert!(grid.generate(ts(), 98.5).is_empty());
        // +1.2% from 98, not from 98.5
        let orders = grid.generate(ts(), 99.2);
        assert_eq!(orders[0].side, OrderSide::Sell);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(GridStrategy::new(0.0, 1.0, 1.0).is_err());
        assert!(GridStrategy::new(0.01, -1.0, 1.0).is_err());
        assert!(GridStrategy::new(0.01, 1.0, 0.0).is_err());
    }
}
