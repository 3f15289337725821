//! Rolling-window breakout strategy.
//!
//! The window is updated with the current price *before* the comparison, so
//! the band a price is tested against already contains that price.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use super::Strategy;
use crate::domain::Order;
use crate::error::{require_non_negative, require_positive, EngineError};

/// Long-only band breakout with a fixed order size.
#[derive(Debug, Clone)]
pub struct BreakoutStrategy {
    pub window: usize,
    pub threshold_pct: f64,
    pub qty: f64,
    prices: VecDeque<f64>,
    in_position: bool,
}

impl BreakoutStrategy {
    pub fn new(window: usize, threshold_pct: f64, qty: f64) -> Result<Self, EngineError> {
        if window == 0 {
            return Err(EngineError::invalid("window", "must be >= 1"));
        }
        require_non_negative("threshold_pct", threshold_pct)?;
        require_positive("qty", qty)?;
        Ok(Self {
            window,
            threshold_pct,
            qty,
            prices: VecDeque::with_capacity(window + 1),
            in_position: false,
        })
    }

    pub fn in_position(&self) -> bool {
        self.in_position
    }

    fn band(&self) -> (f64, f64) {
        self.prices
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &p| {
                (lo.min(p), hi.max(p))
            })
    }
}

impl Strategy for BreakoutStrategy {
    fn name(&self) -> &str {
        "breakout"
    }

    fn generate(&mut self, _timestamp: DateTime<Utc>, price: f64) -> Vec<Order> {
        self.prices.push_back(price);
        if self.prices.len() > self.window {
            self.prices.pop_front();
        }
        if self.prices.len() < self.window {
            return Vec::new();
        }

        let (low, high) = self.band();
        if !self.in_position && price >= high * (1.0 + self.threshold_pct) {
            self.in_position = true;
            vec![Order::buy(self.qty)]
        } else if self.in_position && price <= low * (1.0 - self.threshold_pct) {
            self.in_position = false;
            vec![Order::sell(self.qty)]
        } else {
            Vec::new()
        }
    }
}
