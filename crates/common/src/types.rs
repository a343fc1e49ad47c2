use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Exchange code such as `NYSE` or `LSE`. Always stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ExchangeId(String);

impl ExchangeId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ExchangeId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ExchangeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<ExchangeId> for String {
    fn from(id: ExchangeId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One screened stock from the halal universe.
/// Identity is the `(ticker, exchange)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickerRecord {
    pub ticker: String,
    pub exchange: ExchangeId,
    pub name: String,
    /// Where the screening came from (e.g. a fund prospectus or index provider).
    pub source: String,
}

impl TickerRecord {
    pub fn new(
        ticker: impl AsRef<str>,
        exchange: impl Into<ExchangeId>,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.as_ref().trim().to_uppercase(),
            exchange: exchange.into(),
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Validated halal universe: non-empty, no duplicate `(ticker, exchange)` pairs,
/// records kept in load order.
#[derive(Debug, Clone)]
pub struct Universe {
    records: Vec<TickerRecord>,
}

impl Universe {
    pub fn new(records: Vec<TickerRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::MalformedUniverse(
                "universe contains no tickers".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if record.ticker.is_empty() {
                return Err(Error::MalformedUniverse("empty ticker symbol".to_string()));
            }
            if record.exchange.as_str().is_empty() {
                return Err(Error::MalformedUniverse(format!(
                    "ticker {} has no exchange",
                    record.ticker
                )));
            }
            if !seen.insert((record.ticker.as_str(), &record.exchange)) {
                return Err(Error::MalformedUniverse(format!(
                    "duplicate entry {} on {}",
                    record.ticker, record.exchange
                )));
            }
        }

        Ok(Self { records })
    }

    pub fn records(&self) -> &[TickerRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Case-insensitive lookup by symbol. Returns the first listing when a
    /// symbol trades on several exchanges.
    pub fn get(&self, ticker: &str) -> Option<&TickerRecord> {
        let ticker = ticker.trim().to_uppercase();
        self.records.iter().find(|r| r.ticker == ticker)
    }

    /// Lookup of one specific listing.
    pub fn get_on(&self, ticker: &str, exchange: &ExchangeId) -> Option<&TickerRecord> {
        let ticker = ticker.trim().to_uppercase();
        self.records
            .iter()
            .find(|r| r.ticker == ticker && &r.exchange == exchange)
    }
}

/// One OHLCV bar. Series are ordered by strictly increasing `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Raw indicator values behind a composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalComponents {
    /// Fractional change over the momentum lookback (0.05 = +5%).
    pub momentum: f64,
    pub rsi: f64,
    pub volume_factor: f64,
}

/// Price context shown alongside a signal in chat replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDetail {
    pub last_close: f64,
    pub previous_close: f64,
    pub recent_high: f64,
    pub recent_low: f64,
    pub last_volume: u64,
    pub projected_target: f64,
    pub reason: String,
}

impl SignalDetail {
    /// Percent change of the last bar against the one before it.
    pub fn change_pct(&self) -> f64 {
        change_pct(self.previous_close, self.last_close)
    }
}

/// Percent change from `previous` to `last`; zero when there is no base.
pub fn change_pct(previous: f64, last: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (last / previous - 1.0) * 100.0
    }
}

/// A scored ticker from one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub ticker: TickerRecord,
    pub score: f64,
    pub components: SignalComponents,
    pub detail: SignalDetail,
    pub computed_at: DateTime<Utc>,
}

/// Open/closed state of one exchange at `as_of`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatus {
    pub exchange: ExchangeId,
    /// IANA timezone name of the exchange.
    pub timezone: String,
    pub is_open: bool,
    pub as_of: DateTime<Utc>,
    /// Close of the current session when open, otherwise the next open.
    pub next_transition: DateTime<Utc>,
    pub next_open: DateTime<Utc>,
    pub next_close: DateTime<Utc>,
}
