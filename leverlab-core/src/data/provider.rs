//! Data provider trait and structured error types.
//!
//! The MarketDataProvider trait abstracts over price sources (synthetic walk,
//! CSV import) so the engine only ever sees a validated `PriceSeries`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Interval, PriceSeries};
use crate::error::EngineError;

/// Which bars to load: `[start, end)` at `interval` for `symbol`.
///
/// Also the cache key, so it is `Eq + Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataRequest {
    pub symbol: String,
    pub interval: Interval,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DataRequest {
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            start,
            end,
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Number of whole intervals in the range.
    pub fn expected_bars(&self) -> usize {
        let span = (self.end - self.start).num_minutes();
        if span <= 0 {
            0
        } else {
            (span / self.interval.minutes()) as usize
        }
    }
}

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("no data for {symbol}: {reason}")]
    Unavailable { symbol: String, reason: String },

    #[error(transparent)]
    Series(#[from] EngineError),
}

impl DataError {
    pub fn unavailable(symbol: &str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}

/// Source of historical bars.
///
/// Implementations return fully materialized, validated series; any waiting
/// happens here, before a backtest starts.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    fn fetch(&self, request: &DataRequest) -> Result<PriceSeries, DataError>;
}

impl<P: MarketDataProvider + ?Sized> MarketDataProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, request: &DataRequest) -> Result<PriceSeries, DataError> {
        (**self).fetch(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn request_range_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap();
        let req = DataRequest::new("BTCUSDT", Interval::Hour1, start, end);
        assert!(req.contains(start));
        assert!(!req.contains(end));
        assert_eq!(req.expected_bars(), 24);
    }

    #[test]
    fn inverted_range_expects_nothing() {
        let start = Utc.with_ymd_and_hms(2024, 4, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let req = DataRequest::new("BTCUSDT", Interval::Day1, start, end);
        assert_eq!(req.expected_bars(), 0);
    }
}
