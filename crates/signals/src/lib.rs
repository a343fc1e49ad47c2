pub mod cache;
pub mod config;
pub mod engine;
pub mod indicators;
pub mod score;

pub use cache::{signal_cache, RefreshOutcome, SignalPublisher, SignalReader, SignalSnapshot};
pub use config::ScoringConfig;
pub use engine::SignalEngine;
pub use score::Scorer;
