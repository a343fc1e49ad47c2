use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use common::Universe;
use signals::{SignalEngine, SignalPublisher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Run a cycle now instead of waiting for the next tick.
    RefreshNow,
    Shutdown,
}

/// Cloneable handle passed to other crates (Telegram, API, main).
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Returns false once the scheduler has stopped.
    pub async fn send(&self, cmd: SchedulerCommand) -> bool {
        self.command_tx.send(cmd).await.is_ok()
    }

    pub async fn refresh_now(&self) -> bool {
        self.send(SchedulerCommand::RefreshNow).await
    }

    pub async fn shutdown(&self) -> bool {
        self.send(SchedulerCommand::Shutdown).await
    }
}

/// Runs a refresh cycle at startup and then every `interval`, publishing each
/// finished snapshot to the signal cache.
///
/// Ticks that land while a cycle is still running are skipped, so at most one
/// cycle is ever in flight.
pub struct RefreshScheduler {
    engine: Arc<SignalEngine>,
    universe: Arc<Universe>,
    publisher: SignalPublisher,
    interval: Duration,
    top_n: usize,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl RefreshScheduler {
    pub fn new(
        engine: Arc<SignalEngine>,
        universe: Arc<Universe>,
        publisher: SignalPublisher,
        interval: Duration,
        top_n: usize,
    ) -> (Self, SchedulerHandle) {
        let (command_tx, command_rx) = mpsc::channel(8);
        let scheduler = Self {
            engine,
            universe,
            publisher,
            interval,
            top_n,
            command_rx,
        };
        (scheduler, SchedulerHandle { command_tx })
    }

    /// Drive the refresh loop until shut down. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.interval.as_secs(),
            tickers = self.universe.len(),
            top_n = self.top_n,
            "Refresh scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                cmd = self.command_rx.recv() => match cmd {
                    Some(SchedulerCommand::RefreshNow) => info!("Manual refresh requested"),
                    Some(SchedulerCommand::Shutdown) | None => {
                        info!("Refresh scheduler stopped");
                        return;
                    }
                },
            }

            if !self.run_cycle().await {
                return;
            }
        }
    }

    /// Returns false when shutdown arrived mid-cycle. The abandoned cycle
    /// publishes nothing.
    async fn run_cycle(&mut self) -> bool {
        let cycle = self
            .engine
            .refresh_and_publish(self.universe.records(), self.top_n, &self.publisher);
        tokio::pin!(cycle);

        loop {
            tokio::select! {
                result = &mut cycle => {
                    if let Err(e) = result {
                        error!(error = %e, "Refresh cycle failed");
                    }
                    return true;
                }
                cmd = self.command_rx.recv() => match cmd {
                    Some(SchedulerCommand::RefreshNow) => debug!("Refresh already in progress"),
                    Some(SchedulerCommand::Shutdown) | None => {
                        warn!("Shutdown during refresh; in-flight cycle abandoned");
                        return false;
                    }
                },
            }
        }
    }
}
