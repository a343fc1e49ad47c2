pub mod momentum;
pub mod rsi;
pub mod volume;

pub use momentum::momentum;
pub use rsi::RsiIndicator;
pub use volume::{volume_factor, DEFAULT_VOLUME_CEILING};
