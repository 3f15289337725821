//! Backtest runner: wires together data, engine, and metrics.
//!
//! Entry points:
//! - `run_spec()`: one spec over pre-loaded data. Used by the optimizer and tests.
//! - `run_single()`: loads data for a config file, then runs. Used by the CLI.
//! - `run_sweep()`: optimizes over the config's grid, once per configured symbol.
//!
//! Both take the provider from the caller so its cache outlives a single run.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use leverlab_core::data::{DataError, DataRequest, MarketDataProvider};
use leverlab_core::{
    BacktestEngine, EngineConfig, EngineError, PriceSeries, RunResult, StrategyConfig,
};

use crate::config::{BacktestConfig, ConfigError};
use crate::metrics::{RiskAnalyzer, RiskReport};
use crate::sweep::{Optimizer, SweepError, SweepOutcome};

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("sweep error: {0}")]
    Sweep(#[from] SweepError),
    #[error("config has no [sweep] section")]
    NoSweep,
}

/// Everything needed to reproduce one run over a given series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSpec {
    pub engine: EngineConfig,
    pub strategy: StrategyConfig,
}

impl BacktestSpec {
    pub fn new(engine: EngineConfig, strategy: StrategyConfig) -> Self {
        Self { engine, strategy }
    }

    /// Deterministic hash of the serialized spec.
    ///
    /// Two specs with identical settings share a RunId.
    pub fn run_id(&self) -> RunId {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        self.engine.validate()?;
        self.strategy.validate()
    }

    /// Overwrite one named setting.
    ///
    /// Engine settings apply to every strategy; strategy settings only to the
    /// variant that has them. `window` must be a whole number.
    pub fn apply_param(&mut self, name: &str, value: f64) -> Result<(), SweepError> {
        match name {
            "initial_capital" => self.engine.initial_capital = value,
            "leverage" => self.engine.leverage = value,
            "fee_taker" => self.engine.costs.fee_taker = value,
            "fee_maker" => self.engine.costs.fee_maker = value,
            "slippage_pct" => self.engine.costs.slippage_pct = value,
            _ => return self.apply_strategy_param(name, value),
        }
        Ok(())
    }

    fn apply_strategy_param(&mut self, name: &str, value: f64) -> Result<(), SweepError> {
        let strategy = self.strategy.name();
        match (&mut self.strategy, name) {
            (StrategyConfig::Grid { grid_size_pct, .. }, "grid_size_pct") => *grid_size_pct = value,
            (StrategyConfig::Grid { base_qty, .. }, "base_qty") => *base_qty = value,
            (StrategyConfig::Breakout { window, .. }, "window") => {
                if !(value.is_finite() && value >= 0.0 && value.fract() == 0.0) {
                    return Err(SweepError::NonIntegerWindow(value));
                }
                *window = value as usize;
            }
            (StrategyConfig::Breakout { threshold_pct, .. }, "threshold_pct") => {
                *threshold_pct = value
            }
            (StrategyConfig::Breakout { qty, .. }, "qty") => *qty = value,
            _ => {
                return Err(SweepError::UnknownParameter {
                    name: name.to_string(),
                    strategy: strategy.to_string(),
                })
            }
        }
        Ok(())
    }

    /// Copy of this spec with every `name = value` pair applied.
    pub fn with_params(&self, params: &BTreeMap<String, f64>) -> Result<Self, SweepError> {
        let mut spec = self.clone();
        for (name, &value) in params {
            spec.apply_param(name, value)?;
        }
        Ok(spec)
    }

    /// Fresh engine with a fresh strategy instance.
    pub fn engine(&self) -> Result<BacktestEngine, EngineError> {
        let strategy = self.strategy.build(self.engine.leverage)?;
        BacktestEngine::new(self.engine.clone(), strategy)
    }

    pub fn run(
        &self,
        series: &PriceSeries,
        cancel: Option<&AtomicBool>,
    ) -> Result<RunResult, EngineError> {
        self.engine()?.run_with_cancel(series, cancel)
    }
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub symbol: String,
    pub strategy: String,
    pub dataset_hash: String,
    pub spec: BacktestSpec,
    pub metrics: RiskReport,
    pub result: RunResult,
}

/// Run one spec over pre-loaded data and score it.
pub fn run_spec(
    spec: &BacktestSpec,
    series: &PriceSeries,
    analyzer: &RiskAnalyzer,
) -> Result<RunReport, RunError> {
    let result = spec.run(series, None)?;
    let metrics = analyzer.analyze(&result, series);
    Ok(RunReport {
        run_id: spec.run_id(),
        symbol: series.symbol().to_string(),
        strategy: spec.strategy.name().to_string(),
        dataset_hash: series.fingerprint(),
        spec: spec.clone(),
        metrics,
        result,
    })
}

/// Load the config's data and run its spec once.
pub fn run_single(
    config: &BacktestConfig,
    provider: &dyn MarketDataProvider,
) -> Result<RunReport, RunError> {
    config.validate()?;
    let series = load_series(provider, &config.data_request())?;
    let report = run_spec(&config.spec(), &series, &config.analyzer()?)?;
    info!(
        run_id = %report.run_id,
        status = %report.result.status,
        final_equity = report.metrics.final_equity,
        trades = report.metrics.trade_count,
        "backtest finished"
    );
    Ok(report)
}

/// Optimize over the config's `[sweep]` grid for each symbol in turn.
///
/// Symbols are independent: each gets its own series and its own winner.
/// Outcomes come back in `DataConfig::all_symbols` order.
pub fn run_sweep(
    config: &BacktestConfig,
    provider: &dyn MarketDataProvider,
    parallel: bool,
) -> Result<Vec<SweepOutcome>, RunError> {
    config.validate()?;
    let sweep = config.sweep.as_ref().ok_or(RunError::NoSweep)?;
    let optimizer = Optimizer::new(sweep.objective, config.analyzer()?).with_parallelism(parallel);
    let template = config.spec();
    config
        .data
        .all_symbols()
        .into_iter()
        .map(|symbol| -> Result<SweepOutcome, RunError> {
            let series = load_series(provider, &config.data_request_for(symbol))?;
            Ok(optimizer.run(&template, &sweep.grid, &series)?)
        })
        .collect()
}

fn load_series(
    provider: &dyn MarketDataProvider,
    request: &DataRequest,
) -> Result<PriceSeries, RunError> {
    let series = provider.fetch(request)?;
    info!(
        provider = provider.name(),
        symbol = series.symbol(),
        bars = series.len(),
        "loaded price data"
    );
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use leverlab_core::{EngineStatus, Interval};

    fn grid_spec() -> BacktestSpec {
        BacktestSpec::new(
            EngineConfig::new(10_000.0).with_leverage(10.0).with_fee(0.0005),
            StrategyConfig::Grid {
                grid_size_pct: 0.01,
                base_qty: 100.0,
            },
        )
    }

    fn breakout_spec() -> BacktestSpec {
        BacktestSpec::new(
            EngineConfig::new(1_000.0),
            StrategyConfig::Breakout {
                window: 20,
                threshold_pct: 0.0,
                qty: 1.0,
            },
        )
    }

    #[test]
    fn run_id_is_deterministic_and_sensitive() {
        let a = grid_spec();
        assert_eq!(a.run_id(), grid_spec().run_id());
        assert_eq!(a.run_id().len(), 64);

        let mut b = grid_spec();
        b.apply_param("leverage", 5.0).unwrap();
        assert_ne!(a.run_id(), b.run_id());
    }

    #[test]
    fn engine_params_apply_to_any_strategy() {
        let mut spec = breakout_spec();
        spec.apply_param("fee_taker", 0.001).unwrap();
        spec.apply_param("slippage_pct", 0.0002).unwrap();
        assert_eq!(spec.engine.costs.fee_taker, 0.001);
        assert_eq!(spec.engine.costs.slippage_pct, 0.0002);
    }

    #[test]
    fn strategy_params_must_match_variant() {
        let mut spec = grid_spec();
        spec.apply_param("base_qty", 150.0).unwrap();
        assert!(matches!(
            spec.strategy,
            StrategyConfig::Grid { base_qty, .. } if base_qty == 150.0
        ));
        let err = spec.apply_param("window", 10.0).unwrap_err();
        assert!(matches!(err, SweepError::UnknownParameter { .. }));
        assert!(spec.apply_param("gird_size_pct", 0.02).is_err());
    }

    #[test]
    fn window_must_be_whole() {
        let mut spec = breakout_spec();
        spec.apply_param("window", 30.0).unwrap();
        assert!(matches!(spec.strategy, StrategyConfig::Breakout { window: 30, .. }));
        assert!(matches!(
            spec.apply_param("window", 2.5),
            Err(SweepError::NonIntegerWindow(_))
        ));
    }

    #[test]
    fn run_spec_reports_scenario() {
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let series =
            PriceSeries::from_closes("BTCUSDT", Interval::Hour1, start, &[100.0, 98.0, 98.5])
                .unwrap();
        let analyzer = RiskAnalyzer::new(8_760.0).unwrap();
        let report = run_spec(&grid_spec(), &series, &analyzer).unwrap();

        assert_eq!(report.result.status, EngineStatus::Complete);
        assert_eq!(report.strategy, "grid");
        assert_eq!(report.metrics.trade_count, 1);
        assert_eq!(report.metrics.liquidation_count, 0);
        assert_eq!(report.dataset_hash, series.fingerprint());
        assert_eq!(report.run_id, grid_spec().run_id());
    }
}
