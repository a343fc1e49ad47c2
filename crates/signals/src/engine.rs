use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::{stream, StreamExt};
use tracing::{debug, error, info, warn};

use common::{Error, MarketDataProvider, Result, SignalResult, TickerRecord};

use crate::cache::{SignalPublisher, SignalSnapshot};
use crate::score::{Scored, Scorer};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Ranks the halal universe by composite momentum score.
///
/// Per-ticker fetches run concurrently (bounded) and each is capped by a
/// timeout. A failing ticker is logged and skipped; it never aborts the cycle.
pub struct SignalEngine {
    provider: Arc<dyn MarketDataProvider>,
    scorer: Scorer,
    fetch_timeout: Duration,
    concurrency: usize,
}

impl SignalEngine {
    pub fn new(provider: Arc<dyn MarketDataProvider>, scorer: Scorer) -> Self {
        Self {
            provider,
            scorer,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Score every ticker and build a new snapshot. The ranked view holds at
    /// most `top_n` entries.
    ///
    /// A cycle where every fetch fails is not an error: the snapshot comes back
    /// empty with `RefreshOutcome::NoDataAvailable`.
    pub async fn refresh(&self, universe: &[TickerRecord], top_n: usize) -> Result<SignalSnapshot> {
        if top_n == 0 {
            return Err(Error::Config("top_n must be greater than zero".to_string()));
        }
        if universe.is_empty() {
            return Err(Error::MalformedUniverse(
                "refusing to refresh an empty universe".to_string(),
            ));
        }

        let started = Instant::now();
        let computed_at = Utc::now();
        let history = self.scorer.config().history_bars;

        let mut seen = HashSet::with_capacity(universe.len());
        let records: Vec<&TickerRecord> = universe
            .iter()
            .filter(|r| {
                let fresh = seen.insert((r.ticker.as_str(), &r.exchange));
                if !fresh {
                    warn!(ticker = %r.ticker, exchange = %r.exchange, "Duplicate ticker skipped");
                }
                fresh
            })
            .collect();
        let universe_size = records.len();

        // Futures are built up front so the stream type carries no closure
        // over a borrowed record, which keeps the refresh future `Send`.
        let fetches: Vec<_> = records
            .into_iter()
            .map(|record| async move { (record, self.score_one(record, history).await) })
            .collect();
        let outcomes: Vec<(&TickerRecord, Result<Scored>)> = stream::iter(fetches)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut failures = 0;
        let mut scored = Vec::with_capacity(outcomes.len());
        for (record, outcome) in outcomes {
            match outcome {
                Ok(s) => scored.push(SignalResult {
                    ticker: record.clone(),
                    score: s.score,
                    components: s.components,
                    detail: s.detail,
                    computed_at,
                }),
                Err(e) if e.is_per_ticker() => {
                    failures += 1;
                    warn!(ticker = %record.ticker, exchange = %record.exchange, error = %e, "Ticker skipped");
                }
                Err(e) => {
                    failures += 1;
                    error!(ticker = %record.ticker, exchange = %record.exchange, error = %e, "Provider failure, ticker skipped");
                }
            }
        }

        rank(&mut scored);
        let min_score = self.scorer.config().min_score;
        let ranked_len = scored
            .iter()
            .take(top_n)
            .take_while(|r| r.score >= min_score)
            .count();

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if scored.is_empty() {
            warn!(universe = universe_size, failed = failures, elapsed_ms, "Refresh scored no tickers");
        } else {
            info!(
                universe = universe_size,
                scored = scored.len(),
                failed = failures,
                ranked = ranked_len,
                elapsed_ms,
                "Refresh complete"
            );
        }

        Ok(SignalSnapshot {
            computed_at,
            scored,
            ranked_len,
            universe_size,
            failures,
        })
    }

    /// Run a refresh and publish the snapshot with a single swap.
    pub async fn refresh_and_publish(
        &self,
        universe: &[TickerRecord],
        top_n: usize,
        publisher: &SignalPublisher,
    ) -> Result<Arc<SignalSnapshot>> {
        let snapshot = self.refresh(universe, top_n).await?;
        Ok(publisher.publish(snapshot))
    }

    async fn score_one(&self, record: &TickerRecord, history: usize) -> Result<Scored> {
        let fetch = self
            .provider
            .fetch_bars(&record.ticker, &record.exchange, history);
        let bars = match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(bars) => bars?,
            Err(_) => {
                return Err(Error::FetchTimeout {
                    ticker: record.ticker.clone(),
                    after: self.fetch_timeout,
                })
            }
        };
        debug!(ticker = %record.ticker, bars = bars.len(), "Fetched bars");
        self.scorer.score(&bars)
    }
}

/// Score descending, then ticker ascending, then exchange ascending.
pub fn rank(results: &mut [SignalResult]) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.ticker.ticker.cmp(&b.ticker.ticker))
            .then_with(|| a.ticker.exchange.cmp(&b.ticker.exchange))
    });
}
