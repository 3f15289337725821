//! Domain types for the leveraged backtester.

pub mod account;
pub mod bar;
pub mod order;
pub mod position;
pub mod trade;

pub use account::Account;
pub use bar::{validate_bars, Interval, PriceBar, PriceSeries};
pub use order::{Order, OrderKind, OrderSide};
pub use position::Position;
pub use trade::{EquityPoint, LiquidationEvent, Settlement, Trade};
