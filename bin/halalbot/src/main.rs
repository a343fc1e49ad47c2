use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use calendar::MarketCalendar;
use common::{Config, DataSourceKind, MarketDataProvider, UniverseProvider};
use engine::{expected_bars, load_universe, CsvBarStore, CsvUniverse, DefaultTickers, RefreshScheduler, SignalService, YahooClient};
use signals::{signal_cache, ScoringConfig, Scorer, SignalEngine};
use telegram_bot::{start_bot, BotDeps};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid configuration")?;
    info!(source = %cfg.data_source, top_n = cfg.top_n, "HalalBot starting");

    let scoring = match &cfg.scoring_config_path {
        Some(path) => ScoringConfig::load(path)?,
        None => ScoringConfig::default(),
    };
    let calendar = Arc::new(MarketCalendar::from_config(cfg.exchanges_config_path.as_deref())?);

    // ── Universe ──────────────────────────────────────────────────────────────
    let universe_provider: Box<dyn UniverseProvider> = match &cfg.universe_file_path {
        Some(path) => {
            info!(%path, "Loading halal universe from CSV");
            Box::new(CsvUniverse::new(path))
        }
        None => {
            info!(tickers = ?cfg.default_tickers, "No universe file set, using default tickers");
            Box::new(DefaultTickers::new(cfg.default_tickers.clone()))
        }
    };
    let universe = Arc::new(
        load_universe(universe_provider.as_ref())
            .await
            .context("halal universe could not be loaded")?,
    );
    for record in universe.records() {
        if calendar.schedule(&record.exchange).is_err() {
            warn!(ticker = %record.ticker, exchange = %record.exchange, "Exchange has no trading schedule");
        }
    }

    // ── Market data (injected based on DATA_SOURCE) ───────────────────────────
    let provider: Arc<dyn MarketDataProvider> = match cfg.data_source {
        DataSourceKind::Yahoo => {
            info!(range = %cfg.yahoo_range, interval = %cfg.yahoo_interval, "Using Yahoo Finance chart data");
            let required = scoring.required_bars();
            let exchanges: BTreeSet<_> = universe.records().iter().map(|r| &r.exchange).collect();
            for exchange in exchanges {
                let Ok(schedule) = calendar.schedule(exchange) else { continue };
                let minutes = schedule.shortest_day_minutes();
                match expected_bars(&cfg.yahoo_range, &cfg.yahoo_interval, minutes) {
                    Some(bars) if bars < required => warn!(
                        %exchange, bars, required,
                        "YAHOO_RANGE is too short to score this exchange"
                    ),
                    None => warn!(range = %cfg.yahoo_range, interval = %cfg.yahoo_interval, "Cannot estimate Yahoo bar count"),
                    _ => {}
                }
            }
            Arc::new(YahooClient::new(&cfg.yahoo_range, &cfg.yahoo_interval)?)
        }
        DataSourceKind::Csv => {
            info!(dir = %cfg.bars_dir, "Using CSV bar store");
            Arc::new(CsvBarStore::new(&cfg.bars_dir))
        }
    };

    // ── Signal engine and scheduler ───────────────────────────────────────────
    let engine = SignalEngine::new(provider, Scorer::new(scoring)?)
        .with_fetch_timeout(cfg.fetch_timeout)
        .with_concurrency(cfg.fetch_concurrency);
    let (publisher, reader) = signal_cache();
    let (scheduler, scheduler_handle) = RefreshScheduler::new(
        Arc::new(engine),
        universe.clone(),
        publisher,
        cfg.refresh_interval,
        cfg.top_n,
    );
    let service = Arc::new(SignalService::new(universe, reader, calendar));

    // ── Telegram ──────────────────────────────────────────────────────────────
    let bot_deps = BotDeps {
        service: service.clone(),
        top_n: cfg.top_n,
        allowed_user_ids: Arc::new(cfg.telegram_allowed_user_ids.clone()),
        scheduler: scheduler_handle.clone(),
    };
    if cfg.telegram_allowed_user_ids.is_empty() {
        warn!("TELEGRAM_ALLOWED_USER_IDS is empty, the bot answers everyone");
    }

    // ── Spawn all tasks ───────────────────────────────────────────────────────
    let scheduler_task = tokio::spawn(scheduler.run());
    tokio::spawn(start_bot(cfg.telegram_token.clone(), bot_deps));

    match cfg.dashboard_token.clone() {
        Some(dashboard_token) => {
            let api_state = api::AppState {
                service,
                dashboard_token,
                top_n: cfg.top_n,
            };
            let port = cfg.dashboard_port;
            tokio::spawn(async move {
                if let Err(e) = api::serve(api_state, port).await {
                    error!(error = %e, "Status API stopped");
                }
            });
        }
        None => info!("DASHBOARD_TOKEN not set, status API disabled"),
    }

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping scheduler.");
    scheduler_handle.shutdown().await;
    if let Err(e) = scheduler_task.await {
        error!(error = %e, "Scheduler task panicked");
    }
    Ok(())
}
