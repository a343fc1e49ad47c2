use std::sync::Arc;

use chrono::{DateTime, Utc};

use calendar::MarketCalendar;
use common::{Error, ExchangeId, MarketStatus, Result, SignalResult, TickerRecord, Universe};
use signals::{RefreshOutcome, SignalReader, SignalSnapshot};

/// Read-only query surface shared by the Telegram bot and the HTTP API.
///
/// Every call reads the latest published snapshot once, so a single query
/// never mixes results from two refresh cycles.
#[derive(Clone)]
pub struct SignalService {
    universe: Arc<Universe>,
    reader: SignalReader,
    calendar: Arc<MarketCalendar>,
}

impl SignalService {
    pub fn new(universe: Arc<Universe>, reader: SignalReader, calendar: Arc<MarketCalendar>) -> Self {
        Self { universe, reader, calendar }
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// Exchanges the calendar knows, in configuration order.
    pub fn exchanges(&self) -> Vec<ExchangeId> {
        self.calendar.exchanges().cloned().collect()
    }

    /// Resolve `TICKER` or `TICKER:EXCHANGE` to a universe listing. A bare
    /// symbol listed on several exchanges resolves to its first listing.
    pub fn lookup(&self, query: &str) -> Option<&TickerRecord> {
        match query.split_once(':') {
            Some((ticker, exchange)) => self.universe.get_on(ticker, &ExchangeId::new(exchange)),
            None => self.universe.get(query),
        }
    }

    /// Latest snapshot, or `NotYetComputed` before the first cycle finishes.
    pub fn snapshot(&self) -> Result<Arc<SignalSnapshot>> {
        self.reader.latest().ok_or(Error::NotYetComputed)
    }

    /// Best `n` ranked signals. Empty when nothing currently qualifies.
    pub fn get_top_signals(&self, n: usize) -> Result<Vec<SignalResult>> {
        let snapshot = self.snapshot()?;
        if snapshot.outcome() == RefreshOutcome::NoDataAvailable {
            return Err(Error::NoDataAvailable);
        }
        Ok(snapshot.ranked().iter().take(n).cloned().collect())
    }

    /// Latest scored result for a universe listing, ranked or not.
    ///
    /// A cycle that scored nothing reports `NoDataAvailable` rather than
    /// claiming the ticker has no signal.
    pub fn get_ticker_detail(&self, ticker: &str) -> Result<SignalResult> {
        let record = self
            .lookup(ticker)
            .ok_or_else(|| Error::NotFound(format!("{} is not in the halal universe", ticker.trim().to_uppercase())))?;
        let snapshot = self.snapshot()?;
        if snapshot.outcome() == RefreshOutcome::NoDataAvailable {
            return Err(Error::NoDataAvailable);
        }
        snapshot
            .find(&record.ticker, &record.exchange)
            .map(|(_, result)| result.clone())
            .ok_or_else(|| Error::NotFound(format!("no current signal for {}", record.ticker)))
    }

    pub fn get_market_status(&self, exchange: &str) -> Result<MarketStatus> {
        self.get_market_status_at(exchange, Utc::now())
    }

    pub fn get_market_status_at(&self, exchange: &str, now: DateTime<Utc>) -> Result<MarketStatus> {
        self.calendar.status(&ExchangeId::new(exchange), now)
    }

    pub fn get_all_market_statuses(&self) -> Result<Vec<MarketStatus>> {
        self.get_all_market_statuses_at(Utc::now())
    }

    pub fn get_all_market_statuses_at(&self, now: DateTime<Utc>) -> Result<Vec<MarketStatus>> {
        self.calendar.all(now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use common::{SignalComponents, SignalDetail, TickerRecord};
    use signals::signal_cache;

    use super::*;

    fn result(ticker: &str, score: f64) -> SignalResult {
        listed(ticker, "NASDAQ", score)
    }

    fn listed(ticker: &str, exchange: &str, score: f64) -> SignalResult {
        SignalResult {
            ticker: TickerRecord::new(ticker, exchange, ticker, "test"),
            score,
            components: SignalComponents { momentum: 0.01, rsi: 55.0, volume_factor: 1.2 },
            detail: SignalDetail {
                last_close: 100.0,
                previous_close: 99.0,
                recent_high: 101.0,
                recent_low: 98.0,
                last_volume: 10_000,
                projected_target: 101.4,
                reason: "Steady uptrend".to_string(),
            },
            computed_at: Utc::now(),
        }
    }

    fn universe() -> Arc<Universe> {
        let mut records: Vec<TickerRecord> = ["AAPL", "MSFT", "NVDA", "INTC"]
            .iter()
            .map(|t| TickerRecord::new(t, "NASDAQ", *t, "test"))
            .collect();
        records.push(TickerRecord::new("SHEL", "LSE", "Shell plc", "test"));
        records.push(TickerRecord::new("SHEL", "NYSE", "Shell plc ADR", "test"));
        Arc::new(Universe::new(records).unwrap())
    }

    fn service() -> (signals::SignalPublisher, SignalService) {
        let (publisher, reader) = signal_cache();
        let calendar = Arc::new(MarketCalendar::with_defaults().unwrap());
        (publisher, SignalService::new(universe(), reader, calendar))
    }

    fn snapshot(scored: Vec<SignalResult>, ranked_len: usize) -> SignalSnapshot {
        SignalSnapshot {
            computed_at: Utc::now(),
            scored,
            ranked_len,
            universe_size: 4,
            failures: 0,
        }
    }

    #[test]
    fn queries_before_first_refresh_are_not_yet_computed() {
        let (_publisher, service) = service();
        assert!(matches!(service.get_top_signals(5), Err(Error::NotYetComputed)));
        assert!(matches!(service.get_ticker_detail("AAPL"), Err(Error::NotYetComputed)));
    }

    #[test]
    fn top_signals_respect_n_and_order() {
        let (publisher, service) = service();
        publisher.publish(snapshot(vec![result("NVDA", 0.6), result("AAPL", 0.4), result("MSFT", 0.2)], 3));

        let top = service.get_top_signals(2).unwrap();
        let tickers: Vec<&str> = top.iter().map(|r| r.ticker.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["NVDA", "AAPL"]);
        assert_eq!(service.get_top_signals(50).unwrap().len(), 3);
    }

    #[test]
    fn empty_cycle_reports_no_data() {
        let (publisher, service) = service();
        publisher.publish(snapshot(Vec::new(), 0));
        assert!(matches!(service.get_top_signals(5), Err(Error::NoDataAvailable)));
        assert!(matches!(service.get_ticker_detail("AAPL"), Err(Error::NoDataAvailable)));
        // Tickers outside the universe are still reported as unknown
        assert!(matches!(service.get_ticker_detail("TSLA"), Err(Error::NotFound(_))));
    }

    #[test]
    fn ticker_detail_resolves_the_requested_listing() {
        let (publisher, service) = service();
        publisher.publish(snapshot(vec![listed("SHEL", "NYSE", 0.5)], 1));
        assert_eq!(service.get_ticker_detail("shel:nyse").unwrap().ticker.exchange.as_str(), "NYSE");
        // The bare symbol resolves to the LSE listing, which was not scored
        assert!(matches!(service.get_ticker_detail("SHEL"), Err(Error::NotFound(_))));
        assert!(matches!(service.get_ticker_detail("SHEL:TSX"), Err(Error::NotFound(_))));
    }

    #[test]
    fn nothing_qualifying_is_an_empty_list() {
        let (publisher, service) = service();
        publisher.publish(snapshot(vec![result("INTC", -0.3)], 0));
        assert!(service.get_top_signals(5).unwrap().is_empty());
        // Unranked tickers are still queryable
        assert_eq!(service.get_ticker_detail("intc").unwrap().score, -0.3);
    }

    #[test]
    fn ticker_detail_not_found_cases() {
        let (publisher, service) = service();
        publisher.publish(snapshot(vec![result("AAPL", 0.4)], 1));
        assert!(matches!(service.get_ticker_detail("TSLA"), Err(Error::NotFound(_))));
        // In the universe but its fetch failed this cycle
        assert!(matches!(service.get_ticker_detail("MSFT"), Err(Error::NotFound(_))));
        assert_eq!(service.get_ticker_detail(" aapl ").unwrap().ticker.ticker, "AAPL");
    }

    #[test]
    fn market_status_lookups() {
        let (_publisher, service) = service();
        // Monday 2026-03-02 15:00 UTC: New York 10:00, Tokyo midnight
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap();
        assert!(service.get_market_status_at("nyse", now).unwrap().is_open);
        assert!(!service.get_market_status_at("TSE", now).unwrap().is_open);
        assert!(matches!(
            service.get_market_status_at("XETRA", now),
            Err(Error::UnknownExchange(_))
        ));
        assert_eq!(service.get_all_market_statuses_at(now).unwrap().len(), 7);
    }

    #[test]
    fn exchanges_follow_calendar_order() {
        let (_publisher, service) = service();
        let exchanges = service.exchanges();
        assert_eq!(exchanges.len(), 7);
        assert!(exchanges.contains(&ExchangeId::new("DFM")));
        let statuses = service.get_all_market_statuses_at(Utc::now()).unwrap();
        let status_order: Vec<ExchangeId> = statuses.into_iter().map(|s| s.exchange).collect();
        assert_eq!(exchanges, status_order);
    }
}
