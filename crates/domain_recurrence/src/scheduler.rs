//! Scheduler driver
//!
//! Fires the engine's tick on a fixed period until cancelled. Each tick runs
//! in its own task so a failing or panicking tick is reported and the loop
//! keeps going. Cancellation is only observed between ticks.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::engine::{RecurrenceEngine, TickReport};
use crate::observer::{RecurrenceObserver, TickFailure};

/// Default time between ticks
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub period: Duration,
    /// Tick once immediately instead of waiting a full period
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD,
            run_on_start: false,
        }
    }
}

/// Periodic driver for `RecurrenceEngine::tick`
pub struct SchedulerDriver {
    engine: Arc<RecurrenceEngine>,
    observer: Arc<dyn RecurrenceObserver>,
    config: SchedulerConfig,
    shutdown: CancellationToken,
}

impl SchedulerDriver {
    /// Reports tick failures to the engine's own observer
    pub fn new(engine: Arc<RecurrenceEngine>, config: SchedulerConfig, shutdown: CancellationToken) -> Self {
        let observer = engine.observer();
        Self {
            engine,
            observer,
            config,
            shutdown,
        }
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Runs one tick now, isolated in its own task
    pub async fn tick_now(&self) -> Result<TickReport, TickFailure> {
        let engine = self.engine.clone();
        let failure = match tokio::spawn(async move { engine.tick().await }).await {
            Ok(Ok(report)) => return Ok(report),
            Ok(Err(e)) => TickFailure::Error(e),
            Err(join_error) if join_error.is_panic() => {
                let payload = join_error.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                TickFailure::Panicked(message)
            }
            Err(join_error) => TickFailure::Panicked(join_error.to_string()),
        };
        self.observer.tick_failed(&failure);
        Err(failure)
    }

    /// Ticks every period until the shutdown token fires
    ///
    /// Returns the number of ticks run. A tick in flight when shutdown is
    /// requested completes first.
    #[instrument(skip_all, fields(period_secs = self.config.period.as_secs()))]
    pub async fn run(self) -> u64 {
        let period = self.config.period.max(Duration::from_millis(1));
        let start = if self.config.run_on_start {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(run_on_start = self.config.run_on_start, "Scheduler started");
        let mut ticks = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    // failures already went to the observer
                    let _ = self.tick_now().await;
                    ticks += 1;
                }
            }
        }
        info!(ticks = ticks, "Scheduler stopped");
        ticks
    }

    pub fn spawn(self) -> JoinHandle<u64> {
        tokio::spawn(self.run())
    }
}

impl std::fmt::Debug for SchedulerDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerDriver")
            .field("config", &self.config)
            .field("cancelled", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}
