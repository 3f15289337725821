//! CSV file provider.
//!
//! Expected header: `timestamp,close` plus any of `open,high,low,volume`.
//! Timestamps are RFC 3339. Rows outside the requested range are skipped.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::provider::{DataError, DataRequest, MarketDataProvider};
use crate::domain::{PriceBar, PriceSeries};

/// Reads `{dir}/{SYMBOL}_{interval}.csv`, e.g. `data/BTCUSDT_1h.csv`.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, request: &DataRequest) -> PathBuf {
        self.dir.join(format!(
            "{}_{}.csv",
            request.symbol,
            request.interval.as_str()
        ))
    }
}

/// Parse every bar in a CSV file, in file order.
pub fn read_bars(path: &Path) -> Result<Vec<PriceBar>, DataError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut bars = Vec::new();
    for record in reader.deserialize() {
        let bar: PriceBar = record?;
        bars.push(bar);
    }
    Ok(bars)
}

impl MarketDataProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, request: &DataRequest) -> Result<PriceSeries, DataError> {
        let path = self.path_for(request);
        if !path.exists() {
            return Err(DataError::unavailable(
                &request.symbol,
                format!("{} not found", path.display()),
            ));
        }
        let bars: Vec<PriceBar> = read_bars(&path)?
            .into_iter()
            .filter(|b| request.contains(b.timestamp))
            .collect();
        debug!(path = %path.display(), bars = bars.len(), "loaded csv bars");
        Ok(PriceSeries::new(&request.symbol, request.interval, bars)?)
    }
}
