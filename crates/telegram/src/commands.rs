use std::sync::Arc;

use chrono::{DateTime, Utc};
use teloxide::{
    dispatching::UpdateHandler,
    prelude::*,
    utils::command::BotCommands,
};
use tracing::{debug, info, warn};

use common::Error;
use engine::{SchedulerHandle, SignalService};

use crate::format;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Dependencies injected into every handler via `dptree`.
#[derive(Clone)]
pub struct BotDeps {
    pub service: Arc<SignalService>,
    /// How many signals `/signals` shows.
    pub top_n: usize,
    /// Empty means the bot answers everyone.
    pub allowed_user_ids: Arc<Vec<i64>>,
    pub scheduler: SchedulerHandle,
}

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "HalalBot commands:")]
pub enum Command {
    #[command(description = "Introduction")]
    Start,
    #[command(description = "Show this help")]
    Help,
    #[command(description = "List the halal-screened universe")]
    Halal,
    #[command(description = "Which exchanges are trading right now")]
    Open,
    #[command(description = "Status of one exchange, e.g. /market LSE")]
    Market(String),
    #[command(description = "Top halal momentum signals")]
    Signals,
    #[command(description = "Signal detail for one ticker, e.g. /info NVDA or /info SHEL:LSE")]
    Info(String),
    #[command(description = "Recompute signals now")]
    Refresh,
}

/// Start the Telegram bot in long-polling mode.
pub async fn start_bot(token: String, deps: BotDeps) {
    let bot = Bot::new(token);
    let deps = Arc::new(deps);

    info!("Telegram bot starting (long-polling)");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handle_start))
        .branch(case![Command::Help].endpoint(handle_help))
        .branch(case![Command::Halal].endpoint(handle_halal))
        .branch(case![Command::Open].endpoint(handle_open))
        .branch(case![Command::Market(exchange)].endpoint(handle_market))
        .branch(case![Command::Signals].endpoint(handle_signals))
        .branch(case![Command::Info(ticker)].endpoint(handle_info))
        .branch(case![Command::Refresh].endpoint(handle_refresh));

    Update::filter_message()
        .filter_map(|msg: Message| msg.from().map(|u| u.id))
        .filter_async(auth_filter)
        .branch(command_handler)
}

pub fn is_allowed(allowed: &[i64], user_id: i64) -> bool {
    allowed.is_empty() || allowed.contains(&user_id)
}

/// Silently drop messages from users outside a non-empty allowlist.
async fn auth_filter(user_id: UserId, deps: Arc<BotDeps>) -> bool {
    let uid = user_id.0 as i64;
    let allowed = is_allowed(&deps.allowed_user_ids, uid);
    if !allowed {
        warn!(user_id = uid, "Unauthorized Telegram access attempt");
    }
    allowed
}

async fn handle_start(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, format::greeting()).await?;
    Ok(())
}

async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
    Ok(())
}

async fn handle_halal(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    bot.send_message(msg.chat.id, format::universe_listing(deps.service.universe()))
        .await?;
    Ok(())
}

async fn handle_open(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let text = match deps.service.get_all_market_statuses() {
        Ok(statuses) => format::market_overview(&statuses),
        Err(e) => {
            warn!(error = %e, "Market overview failed");
            format::error_reply(&e)
        }
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_market(bot: Bot, msg: Message, exchange: String, deps: Arc<BotDeps>) -> HandlerResult {
    let exchange = exchange.trim();
    let text = if exchange.is_empty() {
        "Usage: /market EXCHANGE (e.g. /market LSE)".to_string()
    } else {
        market_reply(&deps.service, exchange, Utc::now())
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

fn market_reply(service: &SignalService, exchange: &str, now: DateTime<Utc>) -> String {
    match service.get_market_status_at(exchange, now) {
        Ok(status) => format::market_status_line(&status),
        Err(Error::UnknownExchange(id)) => format::unknown_exchange(&id, &service.exchanges()),
        Err(e) => format::error_reply(&e),
    }
}

async fn handle_signals(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let text = match deps.service.get_top_signals(deps.top_n) {
        Ok(results) => format::signal_list(&results),
        Err(e) => format::error_reply(&e),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_info(bot: Bot, msg: Message, ticker: String, deps: Arc<BotDeps>) -> HandlerResult {
    let text = info_reply(&deps.service, ticker.trim());
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_refresh(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    info!(chat_id = msg.chat.id.0, "Refresh requested from Telegram");
    bot.send_message(msg.chat.id, refresh_reply(&deps.scheduler).await).await?;
    Ok(())
}

async fn refresh_reply(scheduler: &SchedulerHandle) -> &'static str {
    if scheduler.refresh_now().await {
        "🔄 Refresh queued. Try /signals in a moment."
    } else {
        "⚠️ The refresh scheduler is not running."
    }
}

fn info_reply(service: &SignalService, ticker: &str) -> String {
    if ticker.is_empty() {
        return "Usage: /info TICKER (e.g. /info NVDA)".to_string();
    }
    let Some(record) = service.lookup(ticker) else {
        return format::TICKER_NOT_FOUND.to_string();
    };

    match service.get_ticker_detail(ticker) {
        Ok(result) => {
            let rank = service.snapshot().ok().and_then(|snapshot| {
                snapshot
                    .find(&result.ticker.ticker, &result.ticker.exchange)
                    .map(|(rank, _)| rank)
                    .filter(|&rank| rank <= snapshot.ranked_len)
            });
            format::ticker_detail(&result, rank)
        }
        Err(Error::NotFound(reason)) => {
            debug!(ticker = %record.ticker, %reason, "No current signal");
            format::not_triggering(&record.ticker, record.exchange.as_str())
        }
        Err(e) => format::error_reply(&e),
    }
}
