//! Serializable backtest configuration, loaded from TOML.
//!
//! One file describes the data to load, the engine and strategy settings,
//! how to score the run, and optionally a parameter grid to sweep.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use leverlab_core::data::{
    CachedProvider, CsvProvider, DataRequest, MarketDataProvider, SyntheticProvider,
};
use leverlab_core::{EngineConfig, EngineError, Interval, StrategyConfig};

use crate::fitness::Objective;
use crate::metrics::{CrashStreakRule, RiskAnalyzer};
use crate::runner::BacktestSpec;
use crate::sweep::ParamGrid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Where bars come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataSource {
    /// Seeded random walk.
    Synthetic {
        seed: u64,
        start_price: f64,
        step: f64,
    },
    /// `{dir}/{SYMBOL}_{interval}.csv` files.
    Csv { dir: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub symbol: String,
    /// More symbols for `sweep`, each optimized on its own after `symbol`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<String>,
    pub interval: Interval,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub source: DataSource,
    /// Keep fetched series in memory for this long.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Defaults to the bar interval's periods per year.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub periods_per_year: Option<f64>,
    #[serde(default = "default_crash_min_bars")]
    pub crash_min_bars: usize,
    #[serde(default = "default_crash_drop_pct")]
    pub crash_drop_pct: f64,
}

impl DataConfig {
    /// `symbol` followed by `symbols`, without repeats.
    pub fn all_symbols(&self) -> Vec<&str> {
        let mut all = vec![self.symbol.as_str()];
        for symbol in &self.symbols {
            if !all.contains(&symbol.as_str()) {
                all.push(symbol);
            }
        }
        all
    }
}

fn default_crash_min_bars() -> usize {
    CrashStreakRule::default().min_bars
}

fn default_crash_drop_pct() -> f64 {
    CrashStreakRule::default().drop_pct
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            periods_per_year: None,
            crash_min_bars: default_crash_min_bars(),
            crash_drop_pct: default_crash_drop_pct(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default)]
    pub objective: Objective,
    pub grid: ParamGrid,
}

/// Top-level config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub data: DataConfig,
    pub engine: EngineConfig,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepConfig>,
}

impl BacktestConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.symbol.trim().is_empty() {
            return Err(ConfigError::invalid("data.symbol", "must not be empty"));
        }
        if self.data.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::invalid("data.symbols", "must not contain empty names"));
        }
        if self.data.start >= self.data.end {
            return Err(ConfigError::invalid(
                "data.end",
                format!("{} is not after start {}", self.data.end, self.data.start),
            ));
        }
        if let DataSource::Synthetic {
            start_price, step, ..
        } = self.data.source
        {
            if !(start_price.is_finite() && start_price > 0.0) {
                return Err(ConfigError::invalid("data.source.start_price", "must be > 0"));
            }
            if !(step.is_finite() && step >= 0.0) {
                return Err(ConfigError::invalid("data.source.step", "must be >= 0"));
            }
        }
        self.spec().validate()?;
        self.analyzer()?;
        if let Some(sweep) = &self.sweep {
            if sweep.grid.size() == 0 {
                return Err(ConfigError::invalid(
                    "sweep.grid",
                    "needs at least one parameter with candidates",
                ));
            }
        }
        Ok(())
    }

    pub fn spec(&self) -> BacktestSpec {
        BacktestSpec::new(self.engine.clone(), self.strategy.clone())
    }

    pub fn data_request(&self) -> DataRequest {
        self.data_request_for(&self.data.symbol)
    }

    pub fn data_request_for(&self, symbol: &str) -> DataRequest {
        DataRequest::new(
            symbol,
            self.data.interval,
            self.data.start,
            self.data.end,
        )
    }

    /// Build the configured provider. Keep it for the whole session: the
    /// TTL cache lives inside it.
    pub fn provider(&self) -> Box<dyn MarketDataProvider> {
        let inner: Box<dyn MarketDataProvider> = match &self.data.source {
            DataSource::Synthetic {
                seed,
                start_price,
                step,
            } => Box::new(SyntheticProvider::new(*seed, *start_price, *step)),
            DataSource::Csv { dir } => Box::new(CsvProvider::new(dir.clone())),
        };
        match self.data.cache_ttl_secs {
            Some(secs) => Box::new(CachedProvider::new(inner, Duration::from_secs(secs))),
            None => inner,
        }
    }

    pub fn analyzer(&self) -> Result<RiskAnalyzer, ConfigError> {
        let ppy = self
            .risk
            .periods_per_year
            .unwrap_or_else(|| self.data.interval.periods_per_year());
        if self.risk.crash_min_bars == 0 {
            return Err(ConfigError::invalid("risk.crash_min_bars", "must be >= 1"));
        }
        if !(self.risk.crash_drop_pct.is_finite() && self.risk.crash_drop_pct >= 0.0) {
            return Err(ConfigError::invalid("risk.crash_drop_pct", "must be >= 0"));
        }
        Ok(RiskAnalyzer::new(ppy)?.with_crash_rule(CrashStreakRule {
            min_bars: self.risk.crash_min_bars,
            drop_pct: self.risk.crash_drop_pct,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leverlab_core::{LiquidationPolicy, OrderKind};

    const FULL: &str = r#"
[data]
symbol = "BTCUSDT"
interval = "1h"
start = "2024-04-01T00:00:00Z"
end = "2024-06-01T00:00:00Z"
source = { type = "synthetic", seed = 7, start_price = 30000.0, step = 1.0 }

[engine]
initial_capital = 10000.0
leverage = 10.0
fee_taker = 0.0005
fee_maker = 0.0002
order_kind = "market"
slippage_pct = 0.0
liquidation = "continue_flat"

[strategy]
type = "grid"
grid_size_pct = 0.01
base_qty = 100.0

[risk]
periods_per_year = 8760.0

[sweep]
objective = "final_equity"
[sweep.grid]
leverage = [5.0, 10.0]
base_qty = [100.0, 150.0]
"#;

    fn with_engine(engine: &str) -> String {
        format!(
            r#"
[data]
symbol = "BTCUSDT"
interval = "1d"
start = "2024-01-01T00:00:00Z"
end = "2024-03-01T00:00:00Z"
source = {{ type = "csv", dir = "data" }}

[engine]
{engine}

[strategy]
type = "breakout"
window = 20
threshold_pct = 0.0
qty = 0.1
"#
        )
    }

    #[test]
    fn parses_full_config() {
        let config = BacktestConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.data.interval, Interval::Hour1);
        assert_eq!(config.engine.leverage, 10.0);
        assert_eq!(config.engine.costs.order_kind, OrderKind::Market);
        assert_eq!(config.engine.liquidation, LiquidationPolicy::ContinueFlat);
        assert_eq!(config.strategy.name(), "grid");
        let sweep = config.sweep.as_ref().unwrap();
        assert_eq!(sweep.objective, Objective::FinalEquity);
        assert_eq!(sweep.grid.size(), 4);
        assert_eq!(config.analyzer().unwrap().periods_per_year(), 8_760.0);
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let config = BacktestConfig::from_toml_str(&with_engine(
            "initial_capital = 1000.0\nleverage = 1.0\nfee_taker = 0.001\nfee_maker = 0.001",
        ))
        .unwrap();
        assert!(config.sweep.is_none());
        assert_eq!(config.risk, RiskConfig::default());
        assert_eq!(config.engine.liquidation, LiquidationPolicy::Terminate);
        assert_eq!(config.engine.costs.slippage_pct, 0.0);
        // Daily bars, around the clock.
        assert_eq!(config.analyzer().unwrap().periods_per_year(), 365.0);
        assert!(matches!(config.data.source, DataSource::Csv { .. }));
    }

    #[test]
    fn invalid_engine_values_are_rejected() {
        let err = BacktestConfig::from_toml_str(&with_engine(
            "initial_capital = 1000.0\nleverage = 0.0\nfee_taker = 0.001\nfee_maker = 0.001",
        ))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Engine(_)));
    }

    #[test]
    fn reversed_range_is_rejected() {
        let toml = FULL.replace("2024-06-01T00:00:00Z", "2024-03-01T00:00:00Z");
        let err = BacktestConfig::from_toml_str(&toml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn unknown_strategy_type_is_a_parse_error() {
        let toml = FULL.replace("type = \"grid\"", "type = \"martingale\"");
        assert!(matches!(
            BacktestConfig::from_toml_str(&toml),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn extra_symbols_follow_the_primary_without_repeats() {
        let toml = FULL.replace(
            "symbol = \"BTCUSDT\"",
            "symbol = \"BTCUSDT\"\nsymbols = [\"ETHUSDT\", \"BTCUSDT\", \"BNBUSDT\"]",
        );
        let config = BacktestConfig::from_toml_str(&toml).unwrap();
        assert_eq!(config.data.all_symbols(), vec!["BTCUSDT", "ETHUSDT", "BNBUSDT"]);
        assert_eq!(config.data_request_for("ETHUSDT").symbol, "ETHUSDT");

        let single = BacktestConfig::from_toml_str(FULL).unwrap();
        assert_eq!(single.data.all_symbols(), vec!["BTCUSDT"]);
    }

    #[test]
    fn blank_extra_symbol_is_rejected() {
        let toml = FULL.replace(
            "symbol = \"BTCUSDT\"",
            "symbol = \"BTCUSDT\"\nsymbols = [\" \"]",
        );
        assert!(matches!(
            BacktestConfig::from_toml_str(&toml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = BacktestConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backtest.toml");
        std::fs::write(&path, FULL).unwrap();
        let config = BacktestConfig::load(&path).unwrap();
        assert_eq!(config.data_request().symbol, "BTCUSDT");
        assert_eq!(config.spec().engine.initial_capital, 10_000.0);
    }
}
