use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use common::{Error, ExchangeId, Result, TickerRecord, Universe, UniverseProvider};

/// Columns every universe file must carry (any order, extras ignored).
pub const UNIVERSE_COLUMNS: [&str; 4] = ["ticker", "exchange", "name", "source"];

/// Exchange assigned to `DEFAULT_TICKERS` entries without an explicit `:EXCHANGE`.
pub const DEFAULT_EXCHANGE: &str = "NASDAQ";

/// Parse a halal universe CSV. Header row required.
///
/// Fails with `MalformedUniverse` on missing columns, rows with an empty
/// ticker or exchange, duplicate `(ticker, exchange)` pairs, or no rows.
pub fn parse_universe<R: std::io::Read>(reader: R) -> Result<Vec<TickerRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().map_err(malformed)?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
    };
    let missing: Vec<&str> = UNIVERSE_COLUMNS
        .iter()
        .copied()
        .filter(|c| column(*c).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MalformedUniverse(format!(
            "missing column(s): {}",
            missing.join(", ")
        )));
    }
    let idx: Vec<usize> = UNIVERSE_COLUMNS.iter().filter_map(|c| column(*c)).collect();

    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for row in rdr.records() {
        let row = row.map_err(malformed)?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        let field = |i: usize| row.get(idx[i]).unwrap_or("");

        if field(0).is_empty() || field(1).is_empty() {
            return Err(Error::MalformedUniverse(format!(
                "line {line}: ticker and exchange are required"
            )));
        }

        let record = TickerRecord::new(field(0), field(1), field(2), field(3));
        if !seen.insert((record.ticker.clone(), record.exchange.clone())) {
            return Err(Error::MalformedUniverse(format!(
                "line {line}: duplicate entry {} on {}",
                record.ticker, record.exchange
            )));
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(Error::MalformedUniverse("universe file has no rows".to_string()));
    }
    Ok(records)
}

fn malformed(e: csv::Error) -> Error {
    Error::MalformedUniverse(e.to_string())
}

/// Universe read from a CSV file on every fetch.
pub struct CsvUniverse {
    path: PathBuf,
}

impl CsvUniverse {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl UniverseProvider for CsvUniverse {
    async fn fetch_universe(&self) -> Result<Vec<TickerRecord>> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            Error::MalformedUniverse(format!("cannot read {}: {e}", self.path.display()))
        })?;
        parse_universe(bytes.as_slice())
    }
}

/// Universe built from configured symbols, `TICKER` or `TICKER:EXCHANGE`.
pub struct DefaultTickers {
    tickers: Vec<String>,
}

impl DefaultTickers {
    pub fn new(tickers: Vec<String>) -> Self {
        Self { tickers }
    }
}

#[async_trait]
impl UniverseProvider for DefaultTickers {
    async fn fetch_universe(&self) -> Result<Vec<TickerRecord>> {
        Ok(self
            .tickers
            .iter()
            .map(|entry| {
                let (ticker, exchange) = match entry.split_once(':') {
                    Some((t, e)) => (t, ExchangeId::new(e)),
                    None => (entry.as_str(), ExchangeId::new(DEFAULT_EXCHANGE)),
                };
                TickerRecord::new(ticker, exchange, ticker.trim().to_uppercase(), "default")
            })
            .collect())
    }
}

/// Fetch and validate a universe. The engine never runs on a corrupt one.
pub async fn load_universe(provider: &dyn UniverseProvider) -> Result<Universe> {
    let universe = Universe::new(provider.fetch_universe().await?)?;
    info!(tickers = universe.len(), "Halal universe loaded");
    Ok(universe)
}
