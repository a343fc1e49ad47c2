//! Plain-text replies. Kept free of Telegram types so they can be tested
//! without a bot.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use common::{Error, ExchangeId, MarketStatus, SignalResult, Universe};

/// How many universe entries `/halal` lists.
pub const UNIVERSE_LISTING_LIMIT: usize = 40;

pub const NO_SETUPS: &str = "No strong halal momentum setups right now. Check back soon!";
pub const TICKER_NOT_FOUND: &str = "Ticker not found in the halal universe.";

pub fn greeting() -> String {
    "👋 Assalamu alaikum! I monitor global halal stock opportunities 24/7.\n\n\
     /signals top momentum setups\n\
     /halal the screened universe\n\
     /open which exchanges are trading\n\
     /market EXCHANGE one exchange\n\
     /info TICKER details for one stock\n\
     /refresh recompute signals now\n\
     /help all commands"
        .to_string()
}

pub fn universe_listing(universe: &Universe) -> String {
    let mut out = format!("🕌 Halal universe ({} tickers):\n", universe.len());
    for r in universe.records().iter().take(UNIVERSE_LISTING_LIMIT) {
        let _ = write!(out, "\n• {} ({})", r.ticker, r.exchange);
        if !r.name.is_empty() && r.name != r.ticker {
            let _ = write!(out, " {}", r.name);
        }
    }
    if universe.len() > UNIVERSE_LISTING_LIMIT {
        let _ = write!(out, "\n…and {} more", universe.len() - UNIVERSE_LISTING_LIMIT);
    }
    out
}

fn countdown(from: DateTime<Utc>, to: DateTime<Utc>) -> String {
    let minutes = (to - from).num_minutes().max(0);
    let (days, hours, mins) = (minutes / 1440, minutes % 1440 / 60, minutes % 60);
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {mins:02}m")
    } else {
        format!("{mins}m")
    }
}

fn local(status: &MarketStatus, at: DateTime<Utc>) -> String {
    match status.timezone.parse::<Tz>() {
        Ok(tz) => at.with_timezone(&tz).format("%a %H:%M %Z").to_string(),
        Err(_) => at.format("%a %H:%M UTC").to_string(),
    }
}

pub fn market_status_line(status: &MarketStatus) -> String {
    if status.is_open {
        format!(
            "🟢 {} open, closes {} (in {})",
            status.exchange,
            local(status, status.next_close),
            countdown(status.as_of, status.next_close)
        )
    } else {
        format!(
            "🔴 {} closed, opens {} (in {})",
            status.exchange,
            local(status, status.next_open),
            countdown(status.as_of, status.next_open)
        )
    }
}

pub fn market_overview(statuses: &[MarketStatus]) -> String {
    let open = statuses.iter().filter(|s| s.is_open).count();
    let mut out = if open == 0 {
        "All tracked exchanges are closed.\n".to_string()
    } else {
        format!("{open} of {} exchanges open:\n", statuses.len())
    };
    // Open exchanges first, then by soonest transition
    let mut sorted: Vec<&MarketStatus> = statuses.iter().collect();
    sorted.sort_by_key(|s| (!s.is_open, s.next_transition));
    for s in sorted {
        let _ = write!(out, "\n{}", market_status_line(s));
    }
    out
}

fn summary(result: &SignalResult) -> String {
    let d = &result.detail;
    let c = &result.components;
    format!(
        "Last: {:.2} | High/Low: {:.2} / {:.2}\n\
         Change: {:+.2}% | RSI(14): {:.1} | Volume: {:.1}× avg\n\
         Reason: {}\n\
         Target: {:.2}",
        d.last_close,
        d.recent_high,
        d.recent_low,
        d.change_pct(),
        c.rsi,
        c.volume_factor,
        d.reason,
        d.projected_target
    )
}

pub fn signal_list(results: &[SignalResult]) -> String {
    if results.is_empty() {
        return NO_SETUPS.to_string();
    }
    let mut out = "📈 Top halal momentum setups:\n".to_string();
    for (i, r) in results.iter().enumerate() {
        let _ = write!(
            out,
            "\n{}. {} ({}) score {:.2}\n{}\n",
            i + 1,
            r.ticker.ticker,
            r.ticker.exchange,
            r.score,
            summary(r)
        );
    }
    let _ = write!(out, "\nUpdated {}", results[0].computed_at.format("%Y-%m-%d %H:%M UTC"));
    out
}

/// Detail for one ticker. `rank` is its place in the current top list, if any.
pub fn ticker_detail(result: &SignalResult, rank: Option<usize>) -> String {
    let t = &result.ticker;
    let headline = match rank {
        Some(rank) => format!("#{rank} {} ({})", t.ticker, t.exchange),
        None => format!(
            "{} ({}) is halal-screened but not triggering signals now.",
            t.ticker, t.exchange
        ),
    };
    let mut out = format!("{headline}\n{}", t.name);
    if !t.source.is_empty() {
        let _ = write!(out, " · screened by {}", t.source);
    }
    let _ = write!(out, "\nScore: {:.2}\n{}", result.score, summary(result));
    out
}

pub fn not_triggering(ticker: &str, exchange: &str) -> String {
    format!("{ticker} ({exchange}) is halal-screened but not triggering signals now.")
}

pub fn unknown_exchange(id: &str, known: &[ExchangeId]) -> String {
    let known: Vec<&str> = known.iter().map(ExchangeId::as_str).collect();
    format!("Unknown exchange {id}. Known exchanges: {}.", known.join(", "))
}

pub fn error_reply(error: &Error) -> String {
    match error {
        Error::NotYetComputed => {
            "⏳ Signals are still being computed. Try again in a minute.".to_string()
        }
        Error::NoDataAvailable => {
            "⚠️ Market data is unavailable right now. No signals to show.".to_string()
        }
        Error::UnknownExchange(id) => format!("Unknown exchange {id}. Try /open for the list."),
        Error::NotFound(_) => TICKER_NOT_FOUND.to_string(),
        _ => "Something went wrong. Please try again later.".to_string(),
    }
}
