use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use common::{Error, ExchangeId, MarketDataProvider, PriceBar, Result};

const BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; halalbot/0.1)";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

// Yahoo occasionally reports volume as a float
#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Yahoo symbol for a listing: US tickers are bare, other venues carry a suffix.
pub fn yahoo_symbol(ticker: &str, exchange: &ExchangeId) -> String {
    let suffix = match exchange.as_str() {
        "LSE" => ".L",
        "TSX" => ".TO",
        "TSE" => ".T",
        "BSE" => ".BO",
        "DFM" => ".AE",
        _ => "",
    };
    format!("{}{suffix}", ticker.to_uppercase())
}

/// Trading days a chart `range` covers, rounded down to allow for holidays.
pub fn range_trading_days(range: &str) -> Option<u32> {
    Some(match range {
        "1d" => 1,
        "5d" => 5,
        "1mo" => 19,
        "3mo" => 60,
        "6mo" => 120,
        "1y" => 250,
        "2y" => 500,
        "5y" => 1250,
        _ => return None,
    })
}

/// Bars Yahoo returns for `range` at `interval` on an exchange trading
/// `session_minutes` a day. `None` when either value is not recognised.
pub fn expected_bars(range: &str, interval: &str, session_minutes: u32) -> Option<usize> {
    let days = range_trading_days(range)?;
    let per_day = if interval == "1d" {
        1
    } else {
        let minutes: u32 = match interval {
            "1h" => 60,
            i if i.ends_with('m') => i.trim_end_matches('m').parse().ok()?,
            _ => return None,
        };
        session_minutes / minutes.max(1)
    };
    Some((days * per_day) as usize)
}

/// Yahoo Finance v8 chart client. Used in live mode.
pub struct YahooClient {
    http: Client,
    base_url: String,
    range: String,
    interval: String,
}

impl YahooClient {
    pub fn new(range: impl Into<String>, interval: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            range: range.into(),
            interval: interval.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn chart_url(&self, symbol: &str) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/v8/finance/chart/{symbol}", self.base_url.trim_end_matches('/')),
            &[("range", self.range.as_str()), ("interval", self.interval.as_str())],
        )
        .map_err(|e| Error::Http(e.to_string()))
    }
}

/// Turn a chart response into bars, oldest first.
///
/// Rows with any missing OHLC field are dropped, as are rows whose timestamp
/// does not advance past the previous kept row.
fn parse_chart(ticker: &str, body: &str, lookback: usize) -> Result<Vec<PriceBar>> {
    let unavailable = |reason: String| Error::DataUnavailable {
        ticker: ticker.to_string(),
        reason,
    };

    let resp: ChartResponse = serde_json::from_str(body)?;
    let data = match resp.chart.result.and_then(|r| r.into_iter().next()) {
        Some(data) => data,
        None => {
            let reason = resp
                .chart
                .error
                .map(|e| format!("{}: {}", e.code, e.description))
                .unwrap_or_else(|| "empty chart result".to_string());
            return Err(unavailable(reason));
        }
    };

    let timestamps = data.timestamp.unwrap_or_default();
    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| unavailable("no quote data".to_string()))?;

    let mut bars: Vec<PriceBar> = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let field = |v: &Vec<Option<f64>>| v.get(i).copied().flatten().filter(|x| x.is_finite());
        let (Some(open), Some(high), Some(low), Some(close)) =
            (field(&quote.open), field(&quote.high), field(&quote.low), field(&quote.close))
        else {
            continue;
        };
        let Some(timestamp) = DateTime::from_timestamp(ts, 0) else {
            continue;
        };
        if bars.last().is_some_and(|b| b.timestamp >= timestamp) {
            continue;
        }
        let volume = field(&quote.volume).map(|v| v.max(0.0) as u64).unwrap_or(0);
        bars.push(PriceBar { timestamp, open, high, low, close, volume });
    }

    if bars.is_empty() {
        return Err(unavailable("no complete bars in response".to_string()));
    }
    if bars.len() > lookback {
        bars.drain(..bars.len() - lookback);
    }
    Ok(bars)
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn fetch_bars(
        &self,
        ticker: &str,
        exchange: &ExchangeId,
        lookback: usize,
    ) -> Result<Vec<PriceBar>> {
        let symbol = yahoo_symbol(ticker, exchange);
        let url = self.chart_url(&symbol)?;
        debug!(ticker, %symbol, "Fetching chart");

        let resp = self.http.get(url).send().await.map_err(|e| Error::DataUnavailable {
            ticker: ticker.to_string(),
            reason: e.to_string(),
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        // Yahoo returns a chart error body with 404 for unknown symbols
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(Error::DataUnavailable {
                ticker: ticker.to_string(),
                reason: format!("HTTP {status}"),
            });
        }
        parse_chart(ticker, &body, lookback).map_err(|e| match e {
            Error::Json(e) => Error::DataUnavailable {
                ticker: ticker.to_string(),
                reason: format!("unreadable chart response: {e}"),
            },
            other => other,
        })
    }
}
