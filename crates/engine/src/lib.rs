pub mod providers;
pub mod scheduler;
pub mod service;
pub mod universe;

pub use providers::{expected_bars, CsvBarStore, YahooClient};
pub use scheduler::{RefreshScheduler, SchedulerCommand, SchedulerHandle};
pub use service::SignalService;
pub use universe::{load_universe, CsvUniverse, DefaultTickers};
