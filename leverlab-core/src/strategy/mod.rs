//! Strategy signal generation.
//!
//! A strategy sees one `(timestamp, price)` observation per bar, in bar
//! order, and answers with the orders it wants for that bar. It never sees
//! the account: whatever it remembers (grid level, rolling window) lives in
//! its own state.

pub mod breakout;
pub mod grid;

pub use breakout::BreakoutStrategy;
pub use grid::GridStrategy;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Order;
use crate::error::{require_non_negative, require_positive, EngineError};

/// Per-bar signal generator.
///
/// # Contract
/// `generate` is called exactly once per bar, in bar order. The
/// implementation may only use the current and previously seen prices.
pub trait Strategy: Send + Sync {
    /// Human-readable name (e.g., "grid").
    fn name(&self) -> &str;

    /// Orders for the current bar, in submission order. Usually empty.
    fn generate(&mut self, timestamp: DateTime<Utc>, price: f64) -> Vec<Order>;
}

/// Serializable strategy selection with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Trade fixed percentage crossings from a tracked reference level.
    Grid { grid_size_pct: f64, base_qty: f64 },

    /// Trade exits from a rolling high/low band.
    Breakout {
        window: usize,
        threshold_pct: f64,
        qty: f64,
    },
}

impl StrategyConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Grid { .. } => "grid",
            Self::Breakout { .. } => "breakout",
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        match *self {
            Self::Grid {
                grid_size_pct,
                base_qty,
            } => {
                require_positive("grid_size_pct", grid_size_pct)?;
                require_positive("base_qty", base_qty)
            }
            Self::Breakout {
                window,
                threshold_pct,
                qty,
            } => {
                if window == 0 {
                    return Err(EngineError::invalid("window", "must be >= 1"));
                }
                require_non_negative("threshold_pct", threshold_pct)?;
                require_positive("qty", qty)
            }
        }
    }

    /// Build a fresh strategy instance. `leverage` is the account leverage;
    /// the grid sizes its exposure with it.
    pub fn build(&self, leverage: f64) -> Result<Box<dyn Strategy>, EngineError> {
        self.validate()?;
        Ok(match *self {
            Self::Grid {
                grid_size_pct,
                base_qty,
            } => Box::new(GridStrategy::new(grid_size_pct, leverage, base_qty)?),
            Self::Breakout {
                window,
                threshold_pct,
                qty,
            } => Box::new(BreakoutStrategy::new(window, threshold_pct, qty)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_roundtrips_through_toml_style_tags() {
        let cfg = StrategyConfig::Breakout {
            window: 20,
            threshold_pct: 0.0,
            qty: 0.5,
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"type\":\"breakout\""));
        let back: StrategyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn zero_window_rejected_at_build() {
        let cfg = StrategyConfig::Breakout {
            window: 0,
            threshold_pct: 0.01,
            qty: 1.0,
        };
        let err = cfg.build(1.0).err().unwrap();
        assert!(matches!(err, EngineError::InvalidConfiguration { .. }));
    }

    #[test]
    fn grid_rejects_non_positive_leverage() {
        let cfg = StrategyConfig::Grid {
            grid_size_pct: 0.01,
            base_qty: 100.0,
        };
        assert!(cfg.build(0.0).is_err());
        assert_eq!(cfg.build(10.0).unwrap().name(), "grid");
    }
}
