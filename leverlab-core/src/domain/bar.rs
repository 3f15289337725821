//! Price bars and the validated price series the engine consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// One price observation. Only `close` is required by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl PriceBar {
    /// Close-only bar.
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self {
            timestamp,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }

    /// A close the engine can trade on: finite and strictly positive.
    pub fn is_tradable(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

/// Bar interval. Exchange klines trade around the clock, so the
/// annualization constant counts every calendar minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
}

impl Interval {
    pub fn minutes(&self) -> i64 {
        match self {
            Self::Minute1 => 1,
            Self::Minute5 => 5,
            Self::Minute15 => 15,
            Self::Hour1 => 60,
            Self::Hour4 => 240,
            Self::Day1 => 1440,
        }
    }

    /// Bars per 365-day year at this interval.
    pub fn periods_per_year(&self) -> f64 {
        (365 * 24 * 60) as f64 / self.minutes() as f64
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute1 => "1m",
            Self::Minute5 => "5m",
            Self::Minute15 => "15m",
            Self::Hour1 => "1h",
            Self::Hour4 => "4h",
            Self::Day1 => "1d",
        }
    }
}

impl std::str::FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Self::Minute1),
            "5m" => Ok(Self::Minute5),
            "15m" => Ok(Self::Minute15),
            "1h" => Ok(Self::Hour1),
            "4h" => Ok(Self::Hour4),
            "1d" => Ok(Self::Day1),
            other => Err(format!("unknown interval '{other}'")),
        }
    }
}

/// Ordered, validated sequence of bars for one symbol.
///
/// Construction guarantees: at least one bar, every close finite and > 0,
/// timestamps strictly increasing (so no duplicates).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    interval: Interval,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        bars: Vec<PriceBar>,
    ) -> Result<Self, EngineError> {
        let symbol = symbol.into();
        validate_bars(&symbol, &bars)?;
        Ok(Self {
            symbol,
            interval,
            bars,
        })
    }

    /// Build a series from bare closes spaced one interval apart.
    pub fn from_closes(
        symbol: impl Into<String>,
        interval: Interval,
        start: DateTime<Utc>,
        closes: &[f64],
    ) -> Result<Self, EngineError> {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| -> Result<PriceBar, EngineError> {
                let timestamp = i64::try_from(i)
                    .ok()
                    .and_then(|i| interval.minutes().checked_mul(i))
                    .and_then(chrono::Duration::try_minutes)
                    .and_then(|offset| start.checked_add_signed(offset))
                    .ok_or_else(|| {
                        EngineError::data(format!("bar {i} is past the representable time range"))
                    })?;
                Ok(PriceBar::new(timestamp, close))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(symbol, interval, bars)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// BLAKE3 over the serialized bars, for tagging results with their dataset.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(&self.bars).unwrap_or_default();
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.symbol.as_bytes());
        hasher.update(self.interval.as_str().as_bytes());
        hasher.update(&bytes);
        hasher.finalize().to_hex().to_string()
    }
}

/// Check the invariants the bar loop relies on.
pub fn validate_bars(symbol: &str, bars: &[PriceBar]) -> Result<(), EngineError> {
    if bars.is_empty() {
        return Err(EngineError::data(format!("{symbol}: empty price sequence")));
    }
    for (i, bar) in bars.iter().enumerate() {
        if !bar.is_tradable() {
            return Err(EngineError::data(format!(
                "{symbol}: bar {i} has unusable close {}",
                bar.close
            )));
        }
        if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
            return Err(EngineError::data(format!(
                "{symbol}: bar {i} at {} is not after {}",
                bar.timestamp,
                bars[i - 1].timestamp
            )));
        }
    }
    Ok(())
}
