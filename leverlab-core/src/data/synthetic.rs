//! Seeded random-walk price generator for demos and tests.
//!
//! Closes follow `start_price + cumsum(N(0, step))`, floored at a small
//! fraction of the start price so every close stays tradable.

use chrono::Duration;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::provider::{DataError, DataRequest, MarketDataProvider};
use crate::domain::{PriceBar, PriceSeries};

/// Lowest close as a fraction of `start_price`.
const PRICE_FLOOR_FRACTION: f64 = 0.01;

/// Deterministic synthetic provider: the same seed and request always yield
/// the same series, regardless of thread or call order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticProvider {
    pub seed: u64,
    pub start_price: f64,
    /// Standard deviation of the per-bar price change.
    pub step: f64,
}

impl SyntheticProvider {
    pub fn new(seed: u64, start_price: f64, step: f64) -> Self {
        Self {
            seed,
            start_price,
            step,
        }
    }

    /// RNG for one request, derived from the seed and symbol via BLAKE3.
    fn rng_for(&self, symbol: &str) -> StdRng {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        StdRng::from_seed(*hasher.finalize().as_bytes())
    }

    pub fn closes(&self, symbol: &str, count: usize) -> Result<Vec<f64>, DataError> {
        if !(self.start_price.is_finite() && self.start_price > 0.0) {
            return Err(DataError::Parse(format!(
                "synthetic start_price must be > 0, got {}",
                self.start_price
            )));
        }
        let normal = Normal::new(0.0, self.step)
            .map_err(|e| DataError::Parse(format!("synthetic step {}: {e}", self.step)))?;
        let mut rng = self.rng_for(symbol);
        let floor = self.start_price * PRICE_FLOOR_FRACTION;

        let mut price = self.start_price;
        let mut closes = Vec::with_capacity(count);
        for _ in 0..count {
            price = (price + normal.sample(&mut rng)).max(floor);
            closes.push(price);
        }
        Ok(closes)
    }
}

impl MarketDataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, request: &DataRequest) -> Result<PriceSeries, DataError> {
        let count = request.expected_bars();
        if count == 0 {
            return Err(DataError::unavailable(
                &request.symbol,
                format!("empty range {} .. {}", request.start, request.end),
            ));
        }
        let step = Duration::minutes(request.interval.minutes());
        let bars = self
            .closes(&request.symbol, count)?
            .into_iter()
            .enumerate()
            .map(|(i, close)| PriceBar::new(request.start + step * i as i32, close))
            .collect();
        Ok(PriceSeries::new(&request.symbol, request.interval, bars)?)
    }
}
