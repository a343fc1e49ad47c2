pub mod bar_store;
pub mod yahoo;

pub use bar_store::CsvBarStore;
pub use yahoo::{expected_bars, yahoo_symbol, YahooClient};
