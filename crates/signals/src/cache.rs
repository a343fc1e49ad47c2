use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use common::{ExchangeId, SignalResult};

/// How a refresh cycle turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// At least one ticker qualified for the ranked list.
    Ranked,
    /// Tickers were scored, but none reached `min_score`.
    NoneMeetCriteria,
    /// Not a single ticker could be scored.
    NoDataAvailable,
}

/// The complete result of one refresh cycle. Never mutated after publication.
#[derive(Debug, Clone)]
pub struct SignalSnapshot {
    pub computed_at: DateTime<Utc>,
    /// Every scored ticker, best first.
    pub scored: Vec<SignalResult>,
    /// How many leading entries of `scored` form the ranked top-N list.
    pub ranked_len: usize,
    pub universe_size: usize,
    pub failures: usize,
}

impl SignalSnapshot {
    /// The ranked top-N list.
    pub fn ranked(&self) -> &[SignalResult] {
        &self.scored[..self.ranked_len]
    }

    pub fn outcome(&self) -> RefreshOutcome {
        if self.scored.is_empty() {
            RefreshOutcome::NoDataAvailable
        } else if self.ranked_len == 0 {
            RefreshOutcome::NoneMeetCriteria
        } else {
            RefreshOutcome::Ranked
        }
    }

    /// Scored entry for one listing and its 1-based position in the full ranking.
    pub fn find(&self, ticker: &str, exchange: &ExchangeId) -> Option<(usize, &SignalResult)> {
        let ticker = ticker.trim().to_uppercase();
        self.scored
            .iter()
            .enumerate()
            .find(|(_, r)| r.ticker.ticker == ticker && &r.ticker.exchange == exchange)
            .map(|(i, r)| (i + 1, r))
    }
}

/// Create the publishing side and a reader for the signal cache.
///
/// The publisher is the only writer and is not `Clone`; readers are cheap to
/// clone and always see either the previous or the next complete snapshot.
pub fn signal_cache() -> (SignalPublisher, SignalReader) {
    let (tx, rx) = watch::channel(None);
    (SignalPublisher { tx }, SignalReader { rx })
}

pub struct SignalPublisher {
    tx: watch::Sender<Option<Arc<SignalSnapshot>>>,
}

impl SignalPublisher {
    /// Replace the current snapshot in one swap.
    pub fn publish(&self, snapshot: SignalSnapshot) -> Arc<SignalSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.tx.send_replace(Some(snapshot.clone()));
        snapshot
    }
}

#[derive(Clone)]
pub struct SignalReader {
    rx: watch::Receiver<Option<Arc<SignalSnapshot>>>,
}

impl SignalReader {
    /// Latest published snapshot, or `None` before the first refresh completes.
    pub fn latest(&self) -> Option<Arc<SignalSnapshot>> {
        self.rx.borrow().clone()
    }

    /// Wait until a snapshot newer than the last one seen is published.
    /// Returns `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<Arc<SignalSnapshot>> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}
