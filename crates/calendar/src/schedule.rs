use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::Deserialize;

use common::{Error, ExchangeId, Result};

/// Built-in trading hours. Same format as `EXCHANGES_CONFIG_PATH` files.
pub const DEFAULT_SCHEDULES_TOML: &str = r#"
[[exchange]]
id = "NYSE"
timezone = "America/New_York"
[[exchange.session]]
days = ["Mon", "Tue", "Wed", "Thu", "Fri"]
open = "09:30"
close = "16:00"

[[exchange]]
id = "NASDAQ"
timezone = "America/New_York"
[[exchange.session]]
days = ["Mon", "Tue", "Wed", "Thu", "Fri"]
open = "09:30"
close = "16:00"

[[exchange]]
id = "LSE"
timezone = "Europe/London"
[[exchange.session]]
days = ["Mon", "Tue", "Wed", "Thu", "Fri"]
open = "08:00"
close = "16:30"

[[exchange]]
id = "TSX"
timezone = "America/Toronto"
[[exchange.session]]
days = ["Mon", "Tue", "Wed", "Thu", "Fri"]
open = "09:30"
close = "16:00"

[[exchange]]
id = "TSE"
timezone = "Asia/Tokyo"
[[exchange.session]]
days = ["Mon", "Tue", "Wed", "Thu", "Fri"]
open = "09:00"
close = "11:30"
[[exchange.session]]
days = ["Mon", "Tue", "Wed", "Thu", "Fri"]
open = "12:30"
close = "15:00"

[[exchange]]
id = "BSE"
timezone = "Asia/Kolkata"
[[exchange.session]]
days = ["Mon", "Tue", "Wed", "Thu", "Fri"]
open = "09:15"
close = "15:30"

[[exchange]]
id = "DFM"
timezone = "Asia/Dubai"
[[exchange.session]]
days = ["Sun", "Mon", "Tue", "Wed", "Thu"]
open = "10:00"
close = "14:00"
"#;

/// One weekday's trading interval, half-open: `[open, close)` in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub weekday: Weekday,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Session {
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.open <= time && time < self.close
    }
}

/// Trading hours of one exchange. Sessions are sorted by weekday then open
/// time and never overlap.
#[derive(Debug, Clone)]
pub struct ExchangeSchedule {
    pub exchange: ExchangeId,
    pub timezone: Tz,
    sessions: Vec<Session>,
    holidays: BTreeSet<NaiveDate>,
}

impl ExchangeSchedule {
    pub fn new(exchange: ExchangeId, timezone: Tz, mut sessions: Vec<Session>) -> Result<Self> {
        if sessions.is_empty() {
            return Err(Error::Config(format!("exchange {exchange} has no sessions")));
        }
        if let Some(s) = sessions.iter().find(|s| s.open >= s.close) {
            return Err(Error::Config(format!(
                "exchange {exchange}: session on {} opens at {} but closes at {}",
                s.weekday, s.open, s.close
            )));
        }

        sessions.sort_by_key(|s| (s.weekday.num_days_from_monday(), s.open));
        for pair in sessions.windows(2) {
            if pair[0].weekday == pair[1].weekday && pair[1].open < pair[0].close {
                return Err(Error::Config(format!(
                    "exchange {exchange}: overlapping sessions on {}",
                    pair[0].weekday
                )));
            }
        }

        Ok(Self {
            exchange,
            timezone,
            sessions,
            holidays: BTreeSet::new(),
        })
    }

    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Trading minutes on the shortest trading weekday.
    pub fn shortest_day_minutes(&self) -> u32 {
        let mut per_day: BTreeMap<u32, i64> = BTreeMap::new();
        for s in &self.sessions {
            *per_day.entry(s.weekday.num_days_from_monday()).or_default() +=
                (s.close - s.open).num_minutes();
        }
        per_day.into_values().min().unwrap_or_default().max(0) as u32
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// Sessions trading on a local date, earliest first. Empty on holidays.
    pub fn sessions_on(&self, date: NaiveDate) -> impl Iterator<Item = &Session> {
        let weekday = date.weekday();
        let holiday = self.is_holiday(date);
        self.sessions
            .iter()
            .filter(move |s| !holiday && s.weekday == weekday)
    }
}

/// Exchange schedule file (TOML).
///
/// ```toml
/// [[exchange]]
/// id = "NYSE"
/// timezone = "America/New_York"
/// holidays = ["2026-12-25"]
///
/// [[exchange.session]]
/// days = ["Mon", "Tue", "Wed", "Thu", "Fri"]
/// open = "09:30"
/// close = "16:00"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleFile {
    #[serde(rename = "exchange")]
    pub exchanges: Vec<ExchangeEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExchangeEntry {
    pub id: String,
    pub timezone: String,
    #[serde(default)]
    pub holidays: Vec<String>,
    #[serde(rename = "session", default)]
    pub sessions: Vec<SessionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionEntry {
    pub days: Vec<String>,
    pub open: String,
    pub close: String,
}

impl ScheduleFile {
    pub fn from_toml(content: &str) -> Result<Vec<ExchangeSchedule>> {
        let file: ScheduleFile =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        file.exchanges.iter().map(ExchangeEntry::build).collect()
    }

    pub fn load(path: &str) -> Result<Vec<ExchangeSchedule>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("exchange schedules at '{path}': {e}")))
    }
}

impl ExchangeEntry {
    fn build(&self) -> Result<ExchangeSchedule> {
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|e| Error::Config(format!("exchange {}: bad timezone: {e}", self.id)))?;

        let mut sessions = Vec::new();
        for entry in &self.sessions {
            let open = parse_time(&self.id, &entry.open)?;
            let close = parse_time(&self.id, &entry.close)?;
            for day in &entry.days {
                let weekday: Weekday = day.parse().map_err(|_| {
                    Error::Config(format!("exchange {}: bad weekday '{day}'", self.id))
                })?;
                sessions.push(Session { weekday, open, close });
            }
        }

        let holidays = self
            .holidays
            .iter()
            .map(|d| {
                NaiveDate::parse_from_str(d, "%Y-%m-%d").map_err(|_| {
                    Error::Config(format!("exchange {}: bad holiday date '{d}'", self.id))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ExchangeSchedule::new(ExchangeId::new(&self.id), timezone, sessions)?
            .with_holidays(holidays))
    }
}

fn parse_time(exchange: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| Error::Config(format!("exchange {exchange}: bad time '{value}' (want HH:MM)")))
}
