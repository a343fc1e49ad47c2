pub mod config;
pub mod error;
pub mod provider;
pub mod types;

pub use config::{Config, DataSourceKind};
pub use error::{Error, Result};
pub use provider::{MarketDataProvider, UniverseProvider};
pub use types::*;
