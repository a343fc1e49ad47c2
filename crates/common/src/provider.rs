use async_trait::async_trait;

use crate::{ExchangeId, PriceBar, Result, TickerRecord};

/// Source of recent OHLCV bars.
///
/// `YahooClient` implements this against the live chart API.
/// `CsvBarStore` implements this over a directory of CSV files.
///
/// Only the Signal Engine calls `fetch_bars`; callers wrap each call in a
/// timeout, so implementations need not enforce one themselves.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetch at most `lookback` of the most recent bars, oldest first.
    /// Fails with `Error::DataUnavailable` when the ticker cannot be served.
    async fn fetch_bars(
        &self,
        ticker: &str,
        exchange: &ExchangeId,
        lookback: usize,
    ) -> Result<Vec<PriceBar>>;
}

/// Source of the screened halal universe.
#[async_trait]
pub trait UniverseProvider: Send + Sync {
    /// Fails with `Error::MalformedUniverse` on a corrupt or empty listing.
    async fn fetch_universe(&self) -> Result<Vec<TickerRecord>>;
}
