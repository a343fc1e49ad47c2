pub mod schedule;
pub mod status;

pub use schedule::{ExchangeSchedule, ScheduleFile, Session};
pub use status::MarketCalendar;
