mod market;
mod price_client;

pub mod chart;
pub mod indicators;
pub mod series;
pub mod validate;

pub use chart::{ChartRenderer, ChartSize};
pub use market::{DateRange, PriceRow, PriceSeries, Ticker, TradingDate};
pub use price_client::{Bar, PriceClient, PriceSource};
pub use series::{ChartKind, SeriesPayload};
