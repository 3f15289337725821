//! Price data providers.
//!
//! Everything here runs before a backtest starts. The engine only depends on
//! the `PriceSeries` these return, never on the providers themselves.

pub mod cache;
pub mod csv_file;
pub mod provider;
pub mod synthetic;

pub use cache::CachedProvider;
pub use csv_file::{read_bars, CsvProvider};
pub use provider::{DataError, DataRequest, MarketDataProvider};
pub use synthetic::SyntheticProvider;
