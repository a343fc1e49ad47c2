use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("insufficient data: need {required} values, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("data unavailable for {ticker}: {reason}")]
    DataUnavailable { ticker: String, reason: String },

    #[error("fetch for {ticker} timed out after {after:?}")]
    FetchTimeout { ticker: String, after: Duration },

    /// The whole refresh cycle produced zero scored tickers.
    #[error("no market data available for any ticker")]
    NoDataAvailable,

    /// No refresh cycle has completed yet.
    #[error("signals have not been computed yet")]
    NotYetComputed,

    #[error("unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("no upcoming session for exchange {0}")]
    NoUpcomingSession(String),

    #[error("malformed universe: {0}")]
    MalformedUniverse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Failures that only affect a single ticker and must never abort a refresh.
    pub fn is_per_ticker(&self) -> bool {
        matches!(
            self,
            Error::InsufficientData { .. }
                | Error::InvalidData(_)
                | Error::DataUnavailable { .. }
                | Error::FetchTimeout { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_ticker_classification() {
        assert!(Error::InsufficientData { required: 21, actual: 5 }.is_per_ticker());
        assert!(Error::FetchTimeout { ticker: "AAPL".into(), after: Duration::from_secs(1) }
            .is_per_ticker());
        assert!(!Error::Http("reset".into()).is_per_ticker());
        assert!(!Error::NoDataAvailable.is_per_ticker());
    }
}
