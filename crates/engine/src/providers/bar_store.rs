use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use common::{Error, ExchangeId, MarketDataProvider, PriceBar, Result};

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

impl From<BarRow> for PriceBar {
    fn from(row: BarRow) -> Self {
        PriceBar {
            timestamp: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        }
    }
}

/// Offline bar source: one CSV per ticker.
///
/// Looks up `<dir>/<EXCHANGE>/<TICKER>.csv` first, then `<dir>/<TICKER>.csv`.
/// Columns: `timestamp,open,high,low,close,volume`, RFC 3339 timestamps,
/// oldest row first.
pub struct CsvBarStore {
    dir: PathBuf,
}

impl CsvBarStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn candidates(&self, ticker: &str, exchange: &ExchangeId) -> [PathBuf; 2] {
        let file = format!("{}.csv", ticker.to_uppercase());
        [self.dir.join(exchange.as_str()).join(&file), self.dir.join(file)]
    }
}

/// Parse bar rows from CSV, keeping the most recent `lookback`.
pub fn parse_bars<R: std::io::Read>(ticker: &str, reader: R, lookback: usize) -> Result<Vec<PriceBar>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut bars = rdr
        .deserialize::<BarRow>()
        .map(|row| row.map(PriceBar::from))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::InvalidData(format!("{ticker}: {e}")))?;

    if bars.len() > lookback {
        bars.drain(..bars.len() - lookback);
    }
    Ok(bars)
}

async fn read_existing(paths: &[PathBuf]) -> Option<(&Path, Vec<u8>)> {
    for path in paths {
        if let Ok(bytes) = tokio::fs::read(path).await {
            return Some((path.as_path(), bytes));
        }
    }
    None
}

#[async_trait]
impl MarketDataProvider for CsvBarStore {
    async fn fetch_bars(
        &self,
        ticker: &str,
        exchange: &ExchangeId,
        lookback: usize,
    ) -> Result<Vec<PriceBar>> {
        let paths = self.candidates(ticker, exchange);
        let (path, bytes) = read_existing(&paths).await.ok_or_else(|| Error::DataUnavailable {
            ticker: ticker.to_string(),
            reason: format!("no bar file under {}", self.dir.display()),
        })?;
        debug!(ticker, path = %path.display(), "Reading bars");
        parse_bars(ticker, bytes.as_slice(), lookback)
    }
}
