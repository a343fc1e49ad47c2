use std::collections::HashMap;

use chrono::{DateTime, Days, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::info;

use common::{Error, ExchangeId, MarketStatus, Result};

use crate::schedule::{ExchangeSchedule, ScheduleFile, Session, DEFAULT_SCHEDULES_TOML};

/// How far ahead to look for the next session before giving up.
const SCAN_DAYS: u64 = 366;

/// Open/closed state for a set of exchanges.
///
/// Pure function of `(exchange, now)`: no interior state, safe to share
/// across tasks without locking.
#[derive(Debug, Clone)]
pub struct MarketCalendar {
    schedules: Vec<ExchangeSchedule>,
    index: HashMap<ExchangeId, usize>,
}

impl MarketCalendar {
    pub fn new(schedules: Vec<ExchangeSchedule>) -> Result<Self> {
        let mut index = HashMap::with_capacity(schedules.len());
        for (i, schedule) in schedules.iter().enumerate() {
            if index.insert(schedule.exchange.clone(), i).is_some() {
                return Err(Error::Config(format!(
                    "exchange {} is configured twice",
                    schedule.exchange
                )));
            }
        }
        Ok(Self { schedules, index })
    }

    /// The built-in NYSE, NASDAQ, LSE, TSX, TSE, BSE and DFM hours.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ScheduleFile::from_toml(DEFAULT_SCHEDULES_TOML)?)
    }

    /// Load from `path` when given, otherwise fall back to the built-in hours.
    pub fn from_config(path: Option<&str>) -> Result<Self> {
        let calendar = match path {
            Some(path) => Self::new(ScheduleFile::load(path)?)?,
            None => Self::with_defaults()?,
        };
        info!(exchanges = calendar.schedules.len(), "Market calendar loaded");
        Ok(calendar)
    }

    /// Configured exchanges in configuration order.
    pub fn exchanges(&self) -> impl Iterator<Item = &ExchangeId> {
        self.schedules.iter().map(|s| &s.exchange)
    }

    pub fn schedule(&self, exchange: &ExchangeId) -> Result<&ExchangeSchedule> {
        self.index
            .get(exchange)
            .map(|&i| &self.schedules[i])
            .ok_or_else(|| Error::UnknownExchange(exchange.to_string()))
    }

    pub fn status(&self, exchange: &ExchangeId, now: DateTime<Utc>) -> Result<MarketStatus> {
        status_of(self.schedule(exchange)?, now)
    }

    /// Statuses in the caller's order. Any unknown exchange fails the call.
    pub fn status_all(&self, exchanges: &[ExchangeId], now: DateTime<Utc>) -> Result<Vec<MarketStatus>> {
        exchanges.iter().map(|e| self.status(e, now)).collect()
    }

    /// Statuses of every configured exchange.
    pub fn all(&self, now: DateTime<Utc>) -> Result<Vec<MarketStatus>> {
        self.schedules.iter().map(|s| status_of(s, now)).collect()
    }
}

fn status_of(schedule: &ExchangeSchedule, now: DateTime<Utc>) -> Result<MarketStatus> {
    let tz = schedule.timezone;
    let local = now.with_timezone(&tz);
    let date = local.date_naive();
    let time = local.time();

    let current = schedule.sessions_on(date).find(|s| s.contains(time));

    let (is_open, next_open, next_close) = match current {
        Some(session) => {
            let close = localize(tz, date, session.close).ok_or_else(|| no_session(schedule))?;
            let (next_open, _) = next_session(schedule, close, true)?;
            (true, next_open, close)
        }
        None => {
            let (open, close) = next_session(schedule, now, false)?;
            (false, open, close)
        }
    };

    Ok(MarketStatus {
        exchange: schedule.exchange.clone(),
        timezone: tz.name().to_string(),
        is_open,
        as_of: now,
        next_transition: if is_open { next_close } else { next_open },
        next_open,
        next_close,
    })
}

/// First session opening after `reference` (or at it, when `inclusive`),
/// scanning forward day by day. Returns its open and close instants.
fn next_session(
    schedule: &ExchangeSchedule,
    reference: DateTime<Utc>,
    inclusive: bool,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let tz = schedule.timezone;
    let start = reference.with_timezone(&tz).date_naive();

    for offset in 0..=SCAN_DAYS {
        let Some(date) = start.checked_add_days(Days::new(offset)) else {
            break;
        };
        for session in schedule.sessions_on(date) {
            let Some((open, close)) = session_instants(tz, date, session) else {
                continue;
            };
            if open > reference || (inclusive && open == reference) {
                return Ok((open, close));
            }
        }
    }

    Err(no_session(schedule))
}

fn session_instants(tz: Tz, date: NaiveDate, session: &Session) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    Some((localize(tz, date, session.open)?, localize(tz, date, session.close)?))
}

/// Local wall-clock time to an instant. Ambiguous times (DST fall-back) take
/// the earlier instant; times inside a DST gap move to the first valid
/// quarter hour after it.
fn localize(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    let naive = date.and_time(time);
    let local = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => (1..=12)
            .map(|q| naive + Duration::minutes(15 * q))
            .find_map(|shifted| tz.from_local_datetime(&shifted).earliest()),
    };
    local.map(|dt| dt.with_timezone(&Utc))
}

fn no_session(schedule: &ExchangeSchedule) -> Error {
    Error::NoUpcomingSession(schedule.exchange.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Weekday;

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn calendar() -> MarketCalendar {
        MarketCalendar::with_defaults().unwrap()
    }

    fn id(s: &str) -> ExchangeId {
        ExchangeId::new(s)
    }

    #[test]
    fn open_exactly_at_open_time() {
        // Mon 2026-03-02 09:30 EST
        let status = calendar().status(&id("NYSE"), utc(2026, 3, 2, 14, 30)).unwrap();
        assert!(status.is_open);
        assert_eq!(status.next_transition, utc(2026, 3, 2, 21, 0));
        assert_eq!(status.next_close, utc(2026, 3, 2, 21, 0));
        assert_eq!(status.next_open, utc(2026, 3, 3, 14, 30));
    }

    #[test]
    fn closed_exactly_at_close_time() {
        // Mon 2026-03-02 16:00 EST
        let status = calendar().status(&id("NYSE"), utc(2026, 3, 2, 21, 0)).unwrap();
        assert!(!status.is_open);
        assert_eq!(status.next_transition, utc(2026, 3, 3, 14, 30));
        assert_eq!(status.next_close, utc(2026, 3, 3, 21, 0));
    }

    #[test]
    fn closed_before_open_points_at_same_day_open() {
        let status = calendar().status(&id("LSE"), utc(2026, 3, 2, 7, 59)).unwrap();
        assert!(!status.is_open);
        assert_eq!(status.next_transition, utc(2026, 3, 2, 8, 0));
    }

    #[test]
    fn friday_evening_rolls_to_monday_open() {
        // Fri 2026-03-06 17:00 EST; US clocks spring forward on Sun 2026-03-08
        let status = calendar().status(&id("NASDAQ"), utc(2026, 3, 6, 22, 0)).unwrap();
        assert!(!status.is_open);
        // Mon 2026-03-09 09:30 EDT
        assert_eq!(status.next_transition, utc(2026, 3, 9, 13, 30));
    }

    #[test]
    fn lunch_break_is_closed() {
        // Mon 2026-03-02 11:45 JST
        let status = calendar().status(&id("TSE"), utc(2026, 3, 2, 2, 45)).unwrap();
        assert!(!status.is_open);
        assert_eq!(status.next_transition, utc(2026, 3, 2, 3, 30));
        assert_eq!(status.next_close, utc(2026, 3, 2, 6, 0));
    }

    #[test]
    fn morning_session_next_open_is_afternoon_session() {
        // Mon 2026-03-02 10:00 JST
        let status = calendar().status(&id("TSE"), utc(2026, 3, 2, 1, 0)).unwrap();
        assert!(status.is_open);
        assert_eq!(status.next_transition, utc(2026, 3, 2, 2, 30));
        assert_eq!(status.next_open, utc(2026, 3, 2, 3, 30));
    }

    #[test]
    fn dfm_weekend_is_friday_and_saturday() {
        // Fri 2026-03-06 11:00 GST
        let status = calendar().status(&id("DFM"), utc(2026, 3, 6, 7, 0)).unwrap();
        assert!(!status.is_open);
        // Sun 2026-03-08 10:00 GST
        assert_eq!(status.next_transition, utc(2026, 3, 8, 6, 0));
    }

    #[test]
    fn london_summer_time_shifts_utc_open() {
        // Mon 2026-06-15 08:00 BST
        let status = calendar().status(&id("LSE"), utc(2026, 6, 15, 7, 0)).unwrap();
        assert!(status.is_open);
        assert_eq!(status.next_transition, utc(2026, 6, 15, 15, 30));
    }

    #[test]
    fn holiday_is_skipped() {
        let open = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        let close = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        let sessions = [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
            .into_iter()
            .map(|weekday| Session { weekday, open, close })
            .collect();
        let schedule = ExchangeSchedule::new(id("NYSE"), chrono_tz::America::New_York, sessions)
            .unwrap()
            .with_holidays([NaiveDate::from_ymd_opt(2026, 12, 25).unwrap()]);
        let calendar = MarketCalendar::new(vec![schedule]).unwrap();

        // Thu 2026-12-24 17:00 EST
        let status = calendar.status(&id("NYSE"), utc(2026, 12, 24, 22, 0)).unwrap();
        assert!(!status.is_open);
        // Mon 2026-12-28 09:30 EST
        assert_eq!(status.next_transition, utc(2026, 12, 28, 14, 30));

        // During the holiday itself
        let status = calendar.status(&id("NYSE"), utc(2026, 12, 25, 16, 0)).unwrap();
        assert!(!status.is_open);
    }

    #[test]
    fn unknown_exchange_is_an_error() {
        let result = calendar().status(&id("MOON"), utc(2026, 3, 2, 14, 30));
        assert!(matches!(result, Err(Error::UnknownExchange(ref e)) if e == "MOON"));
    }

    #[test]
    fn status_all_preserves_caller_order() {
        let order = [id("TSE"), id("NYSE"), id("LSE")];
        let statuses = calendar().status_all(&order, utc(2026, 3, 2, 12, 0)).unwrap();
        let got: Vec<&str> = statuses.iter().map(|s| s.exchange.as_str()).collect();
        assert_eq!(got, vec!["TSE", "NYSE", "LSE"]);
    }

    #[test]
    fn status_all_fails_on_any_unknown() {
        let order = [id("NYSE"), id("NOPE")];
        assert!(calendar().status_all(&order, utc(2026, 3, 2, 12, 0)).is_err());
    }

    #[test]
    fn all_covers_every_configured_exchange() {
        let statuses = calendar().all(utc(2026, 3, 2, 12, 0)).unwrap();
        assert_eq!(statuses.len(), 7);
        // 12:00 UTC Monday: London is open, New York is not yet
        let lse = statuses.iter().find(|s| s.exchange.as_str() == "LSE").unwrap();
        let nyse = statuses.iter().find(|s| s.exchange.as_str() == "NYSE").unwrap();
        assert!(lse.is_open);
        assert!(!nyse.is_open);
    }

    #[test]
    fn duplicate_exchange_is_rejected() {
        let mut schedules = ScheduleFile::from_toml(DEFAULT_SCHEDULES_TOML).unwrap();
        schedules.push(schedules[0].clone());
        assert!(matches!(MarketCalendar::new(schedules), Err(Error::Config(_))));
    }

    #[test]
    fn session_in_dst_gap_moves_after_gap() {
        // 02:30 does not exist in New York on 2026-03-08
        let naive = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let t = NaiveTime::from_hms_opt(2, 30, 0).unwrap();
        let instant = localize(chrono_tz::America::New_York, naive, t).unwrap();
        // 03:00 EDT
        assert_eq!(instant, utc(2026, 3, 8, 7, 0));
    }
}
