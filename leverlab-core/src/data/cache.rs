//! In-memory TTL cache in front of any provider.
//!
//! Keyed by the full `DataRequest` (symbol, interval, start, end). Entries
//! older than the TTL are refetched. Errors are never cached.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use super::provider::{DataError, DataRequest, MarketDataProvider};
use crate::domain::PriceSeries;

#[derive(Debug, Clone)]
struct CacheEntry {
    fetched_at: Instant,
    series: PriceSeries,
}

/// Caching decorator for a `MarketDataProvider`.
#[derive(Debug)]
pub struct CachedProvider<P> {
    inner: P,
    ttl: Duration,
    entries: Mutex<HashMap<DataRequest, CacheEntry>>,
}

impl<P: MarketDataProvider> CachedProvider<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .values()
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn lookup(&self, request: &DataRequest) -> Option<PriceSeries> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(request) {
            Some(entry) if entry.fetched_at.elapsed() < self.ttl => Some(entry.series.clone()),
            Some(_) => {
                entries.remove(request);
                None
            }
            None => None,
        }
    }
}

impl<P: MarketDataProvider> MarketDataProvider for CachedProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch(&self, request: &DataRequest) -> Result<PriceSeries, DataError> {
        if let Some(series) = self.lookup(request) {
            debug!(symbol = %request.symbol, "cache hit");
            return Ok(series);
        }

        // Fetch outside the lock so slow providers don't serialize callers.
        let series = self.inner.fetch(request)?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                request.clone(),
                CacheEntry {
                    fetched_at: Instant::now(),
                    series: series.clone(),
                },
            );
        debug!(symbol = %request.symbol, bars = series.len(), "cache fill");
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SyntheticProvider;
    use crate::domain::Interval;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and delegates to a synthetic walk.
    struct Counting {
        calls: AtomicUsize,
        inner: SyntheticProvider,
    }

    impl MarketDataProvider for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn fetch(&self, request: &DataRequest) -> Result<PriceSeries, DataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(request)
        }
    }

    fn counting() -> Counting {
        Counting {
            calls: AtomicUsize::new(0),
            inner: SyntheticProvider::new(3, 100.0, 1.0),
        }
    }

    fn request(symbol: &str) -> DataRequest {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        DataRequest::new(symbol, Interval::Hour1, start, start + chrono::Duration::hours(10))
    }

    #[test]
    fn second_fetch_is_served_from_cache() {
        let cache = CachedProvider::new(counting(), Duration::from_secs(60));
        let a = cache.fetch(&request("BTCUSDT")).unwrap();
        let b = cache.fetch(&request("BTCUSDT")).unwrap();
        assert_eq!(a.closes(), b.closes());
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn different_keys_miss() {
        let cache = CachedProvider::new(counting(), Duration::from_secs(60));
        cache.fetch(&request("BTCUSDT")).unwrap();
        cache.fetch(&request("ETHUSDT")).unwrap();
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn zero_ttl_always_refetches() {
        let cache = CachedProvider::new(counting(), Duration::ZERO);
        cache.fetch(&request("BTCUSDT")).unwrap();
        cache.fetch(&request("BTCUSDT")).unwrap();
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_drops_entries() {
        let cache = CachedProvider::new(counting(), Duration::from_secs(60));
        cache.fetch(&request("BTCUSDT")).unwrap();
        cache.clear();
        cache.fetch(&request("BTCUSDT")).unwrap();
        assert_eq!(cache.inner.calls.load(Ordering::SeqCst), 2);
    }
}
