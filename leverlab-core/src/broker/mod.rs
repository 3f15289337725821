//! Broker simulator: cash, position, fills, margin and equity marks.
//!
//! Accounting model (isolated margin, long only):
//! - a buy of `q` units at fill price `p` commits a stake of `q * p / L` cash
//!   plus the fee on that stake; the remaining `q * p * (1 - 1/L)` is borrowed;
//! - a sell releases `q * p` proceeds, repays the matching share of the
//!   borrowed amount and pays the fee on the full proceeds;
//! - equity is `cash + quantity * price - borrowed`.
//!
//! With `L = 1` nothing is borrowed and this reduces to plain cash accounting.

pub mod cost_model;

pub use cost_model::CostModel;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{
    Account, EquityPoint, LiquidationEvent, OrderSide, Position, Settlement, Trade,
};
use crate::error::{require_positive, EngineError};

/// Sell quantities within this relative distance of the held quantity
/// close the whole position, so float noise cannot strand dust or reject a
/// full exit.
const QTY_EPSILON: f64 = 1e-9;

/// Why an order was dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    InsufficientCash { required: f64, available: f64 },
    InsufficientPosition { requested: f64, held: f64 },
    InvalidQuantity(f64),
}

/// Result of submitting one order.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Filled(Trade),
    Rejected(Rejection),
}

impl ExecOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, Self::Filled(_))
    }
}

/// Everything the broker recorded over a run.
#[derive(Debug, Clone, Default)]
pub struct BrokerRecords {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub liquidations: Vec<LiquidationEvent>,
    pub rejected_orders: usize,
}

/// Single-instrument margin account simulator.
#[derive(Debug, Clone)]
pub struct BrokerSimulator {
    account: Account,
    leverage: f64,
    costs: CostModel,
    last_price: Option<f64>,
    records: BrokerRecords,
}

impl BrokerSimulator {
    pub fn new(initial_capital: f64, leverage: f64, costs: CostModel) -> Result<Self, EngineError> {
        require_positive("initial_capital", initial_capital)?;
        validate_leverage(leverage)?;
        costs.validate()?;
        Ok(Self {
            account: Account::new(initial_capital),
            leverage,
            costs,
            last_price: None,
            records: BrokerRecords::default(),
        })
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn cash(&self) -> f64 {
        self.account.cash
    }

    pub fn position(&self) -> &Position {
        &self.account.position
    }

    pub fn leverage(&self) -> f64 {
        self.leverage
    }

    pub fn costs(&self) -> &CostModel {
        &self.costs
    }

    pub fn trades(&self) -> &[Trade] {
        &self.records.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.records.equity_curve
    }

    pub fn liquidations(&self) -> &[LiquidationEvent] {
        &self.records.liquidations
    }

    pub fn rejected_orders(&self) -> usize {
        self.records.rejected_orders
    }

    pub fn equity(&self, price: f64) -> f64 {
        self.account.equity(price)
    }

    /// Liquidation price of the open position, if any.
    pub fn liquidation_price(&self) -> Option<f64> {
        let pos = &self.account.position;
        pos.is_open().then(|| pos.liquidation_price(self.leverage))
    }

    /// Record this bar's equity at `price`. Cash and position are untouched.
    pub fn mark_to_market(&mut self, price: f64, timestamp: DateTime<Utc>) -> f64 {
        self.last_price = Some(price);
        let equity = self.account.equity(price);
        self.records.equity_curve.push(EquityPoint { timestamp, equity });
        equity
    }

    /// Apply slippage and fees, update the account and log the trade.
    ///
    /// Orders the account cannot cover are dropped without touching state.
    pub fn execute(
        &mut self,
        side: OrderSide,
        price: f64,
        quantity: f64,
        timestamp: DateTime<Utc>,
    ) -> ExecOutcome {
        let outcome = match side {
            OrderSide::Buy => self.buy(price, quantity, timestamp),
            OrderSide::Sell => self.sell(price, quantity, timestamp),
        };
        match &outcome {
            ExecOutcome::Filled(trade) => {
                debug!(
                    side = trade.side.as_str(),
                    price = trade.price,
                    quantity = trade.quantity,
                    fee = trade.fee,
                    cash = self.account.cash,
                    "fill"
                );
                self.records.trades.push(trade.clone());
                self.last_price = Some(price);
                self.remark();
            }
            ExecOutcome::Rejected(reason) => {
                debug!(side = side.as_str(), quantity, ?reason, "order rejected");
                self.records.rejected_orders += 1;
            }
        }
        outcome
    }

    fn buy(&mut self, price: f64, quantity: f64, timestamp: DateTime<Utc>) -> ExecOutcome {
        if !(quantity.is_finite() && quantity > 0.0) {
            return ExecOutcome::Rejected(Rejection::InvalidQuantity(quantity));
        }
        let fill_price = self.costs.fill_price(price, OrderSide::Buy);
        let notional = quantity * fill_price;
        let stake = notional / self.leverage;
        let fee = self.costs.fee(stake);
        let required = stake + fee;
        if self.account.cash < required {
            return ExecOutcome::Rejected(Rejection::InsufficientCash {
                required,
                available: self.account.cash,
            });
        }

        let pos = &mut self.account.position;
        let new_quantity = pos.quantity + quantity;
        pos.entry_price = if pos.is_open() {
            (pos.quantity * pos.entry_price + notional) / new_quantity
        } else {
            fill_price
        };
        pos.quantity = new_quantity;
        pos.borrowed += notional - stake;
        self.account.cash -= required;

        ExecOutcome::Filled(Trade {
            timestamp,
            side: OrderSide::Buy,
            price: fill_price,
            quantity,
            fee,
            stake,
            realized_pnl: 0.0,
        })
    }

    fn sell(&mut self, price: f64, quantity: f64, timestamp: DateTime<Utc>) -> ExecOutcome {
        if !(quantity.is_finite() && quantity > 0.0) {
            return ExecOutcome::Rejected(Rejection::InvalidQuantity(quantity));
        }
        let held = self.account.position.quantity;
        if !self.account.position.is_open() {
            return ExecOutcome::Rejected(Rejection::InsufficientPosition {
                requested: quantity,
                held,
            });
        }
        let closes_all = (held - quantity).abs() <= QTY_EPSILON * held;
        if held < quantity && !closes_all {
            return ExecOutcome::Rejected(Rejection::InsufficientPosition {
                requested: quantity,
                held,
            });
        }
        let quantity = if closes_all { held } else { quantity };

        let fill_price = self.costs.fill_price(price, OrderSide::Sell);
        let proceeds = quantity * fill_price;
        let stake = proceeds / self.leverage;
        let fee = self.costs.fee(proceeds);

        let pos = &mut self.account.position;
        let repaid = if closes_all {
            pos.borrowed
        } else {
            pos.borrowed * quantity / held
        };
        let realized_pnl = quantity * (fill_price - pos.entry_price);
        self.account.cash += proceeds - repaid - fee;
        if closes_all {
            *pos = Position::flat();
        } else {
            pos.quantity -= quantity;
            pos.borrowed -= repaid;
        }

        ExecOutcome::Filled(Trade {
            timestamp,
            side: OrderSide::Sell,
            price: fill_price,
            quantity,
            fee,
            stake,
            realized_pnl: realized_pnl - fee,
        })
    }

    /// Force-close the position if `price` has reached its liquidation price.
    ///
    /// The close happens at `price` with no fee or slippage. Whatever margin
    /// is left is returned to cash; a gap through the liquidation price never
    /// takes more than the posted margin.
    pub fn check_liquidation(
        &mut self,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Option<LiquidationEvent> {
        let pos = self.account.position;
        if !pos.is_open() || price > pos.liquidation_price(self.leverage) {
            return None;
        }

        self.account.cash += pos.net_value(price).max(0.0);
        self.account.position = Position::flat();
        let event = LiquidationEvent {
            timestamp,
            price,
            quantity: pos.quantity,
            entry_price: pos.entry_price,
        };
        warn!(
            %timestamp,
            price,
            entry_price = pos.entry_price,
            quantity = pos.quantity,
            "position liquidated"
        );
        self.records.liquidations.push(event.clone());
        self.last_price = Some(price);
        self.remark();
        Some(event)
    }

    /// Close any open position at `price` without fees. Used once, at the
    /// end of a completed run.
    pub fn settle(&mut self, price: f64, timestamp: DateTime<Utc>) -> Option<Settlement> {
        let pos = self.account.position;
        if !pos.is_open() {
            return None;
        }
        self.account.cash += pos.net_value(price).max(0.0);
        self.account.position = Position::flat();
        self.last_price = Some(price);
        self.remark();
        Some(Settlement {
            timestamp,
            price,
            quantity: pos.quantity,
            realized_pnl: pos.unrealized_pnl(price),
        })
    }

    /// Refresh the latest equity point after a state change on the same bar.
    fn remark(&mut self) {
        if let (Some(price), Some(point)) = (self.last_price, self.records.equity_curve.last_mut())
        {
            point.equity = self.account.equity(price);
        }
    }

    pub fn into_records(self) -> (Account, BrokerRecords) {
        (self.account, self.records)
    }
}

/// Leverage below 1 would mean negative borrowing; the model needs `L >= 1`.
pub fn validate_leverage(leverage: f64) -> Result<(), EngineError> {
    require_positive("leverage", leverage)?;
    if leverage < 1.0 {
        return Err(EngineError::invalid(
            "leverage",
            format!("must be >= 1, got {leverage}"),
        ));
    }
    Ok(())
}
