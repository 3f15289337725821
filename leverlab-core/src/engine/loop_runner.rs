//! Bar-by-bar event loop.
//!
//! Per bar:
//! 1. Mark-to-market: append the bar's equity point
//! 2. Margin check: force-close a position at or below its liquidation price
//! 3. Signal: the strategy sees the bar (always, so its state stays in sync)
//! 4. Routing: orders go to the broker, unless the bar liquidated
//!
//! Fills and liquidations re-mark the bar's equity point in place.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};

use crate::domain::{validate_bars, PriceSeries};
use crate::error::EngineError;
use crate::strategy::Strategy;

use super::state::{EngineConfig, EngineStatus, LiquidationPolicy, RunResult};

/// One backtest over one price series.
///
/// `run` consumes the engine, so an instance can execute exactly one run and
/// its account never leaks into another.
pub struct BacktestEngine {
    config: EngineConfig,
    strategy: Box<dyn Strategy>,
    status: EngineStatus,
}

impl std::fmt::Debug for BacktestEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BacktestEngine")
            .field("config", &self.config)
            .field("strategy", &self.strategy.name())
            .field("status", &self.status)
            .finish()
    }
}

impl BacktestEngine {
    /// Validate the configuration up front; nothing is discovered mid-run.
    pub fn new(config: EngineConfig, strategy: Box<dyn Strategy>) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            strategy,
            status: EngineStatus::Init,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn run(self, series: &PriceSeries) -> Result<RunResult, EngineError> {
        self.run_with_cancel(series, None)
    }

    /// Run until the data is exhausted, a terminating liquidation, or the
    /// cancel flag is observed between bars.
    ///
    /// A cancelled run keeps whatever position it holds; its result covers
    /// the bars processed so far.
    pub fn run_with_cancel(
        mut self,
        series: &PriceSeries,
        cancel: Option<&AtomicBool>,
    ) -> Result<RunResult, EngineError> {
        // A deserialized series skips the constructor checks.
        validate_bars(series.symbol(), series.bars())?;

        let mut broker = self.config.broker()?;
        let mut bars_processed = 0;
        self.status = EngineStatus::Running;
        info!(
            symbol = series.symbol(),
            strategy = self.strategy.name(),
            bars = series.len(),
            leverage = self.config.leverage,
            "backtest started"
        );

        for bar in series.bars() {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                self.status = EngineStatus::Cancelled;
                break;
            }
            let (ts, price) = (bar.timestamp, bar.close);

            broker.mark_to_market(price, ts);
            let liquidated = broker.check_liquidation(price, ts).is_some();

            let orders = self.strategy.generate(ts, price);
            bars_processed += 1;

            if liquidated {
                if !orders.is_empty() {
                    debug!(%ts, discarded = orders.len(), "orders dropped on liquidation bar");
                }
                if self.config.liquidation == LiquidationPolicy::Terminate {
                    self.status = EngineStatus::Liquidated;
                    break;
                }
                continue;
            }

            for order in orders {
                broker.execute(order.side, price, order.quantity, ts);
            }
        }

        let mut final_settlement = None;
        if self.status == EngineStatus::Running {
            self.status = EngineStatus::Complete;
            // Non-empty series, so there is a last bar.
            if let Some(last) = series.bars().last() {
                final_settlement = broker.settle(last.close, last.timestamp);
            }
        }

        let final_equity = broker
            .equity_curve()
            .last()
            .map_or(self.config.initial_capital, |p| p.equity);
        let rejected_orders = broker.rejected_orders();
        let (account, records) = broker.into_records();

        info!(
            status = %self.status,
            bars = bars_processed,
            trades = records.trades.len(),
            liquidations = records.liquidations.len(),
            final_equity,
            "backtest finished"
        );

        Ok(RunResult {
            status: self.status,
            trades: records.trades,
            equity_curve: records.equity_curve,
            liquidations: records.liquidations,
            final_settlement,
            final_equity,
            final_cash: account.cash,
            bars_processed,
            rejected_orders,
        })
    }
}
