//! Scheduler driving the accrual job once per period

use crate::{job::AccrualJob, types::AccrualPeriod, Error, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Periodic accrual scheduler
///
/// Ticks on a fixed interval, derives the current period, and runs the job
/// the first time each period is seen. Because the job is idempotent per
/// period, a restarted scheduler re-running the current period is harmless.
pub struct AccrualScheduler {
    job: Arc<AccrualJob>,
    tick_interval: tokio::time::Duration,
    last_completed: Arc<RwLock<Option<AccrualPeriod>>>,
}

impl AccrualScheduler {
    /// Create a scheduler over the job
    pub fn new(job: Arc<AccrualJob>, tick_interval_secs: u64) -> Self {
        Self {
            job,
            tick_interval: tokio::time::Duration::from_secs(tick_interval_secs),
            last_completed: Arc::new(RwLock::new(None)),
        }
    }

    /// Run the scheduler loop
    pub async fn start(self: Arc<Self>) {
        info!(interval_secs = self.tick_interval.as_secs(), "Starting accrual scheduler");

        let mut interval = tokio::time::interval(self.tick_interval);

        loop {
            interval.tick().await;

            if let Err(e) = self.tick().await {
                warn!("Accrual tick failed: {}", e);
            }
        }
    }

    /// Run accrual for the current period if it has not completed yet
    pub async fn tick(&self) -> Result<()> {
        let period = AccrualPeriod::current();

        if *self.last_completed.read().await == Some(period) {
            debug!(period = %period, "Period already accrued, skipping tick");
            return Ok(());
        }

        match self.job.run_for_period(period).await {
            Ok(summary) if summary.failed == 0 => {
                *self.last_completed.write().await = Some(period);
                Ok(())
            }
            // Partial run: keep the period pending so the next tick retries
            // the unmarked accounts.
            Ok(summary) => {
                warn!(
                    period = %period,
                    failed = summary.failed,
                    "Accrual run incomplete, will retry"
                );
                Ok(())
            }
            Err(Error::AlreadyRunning) => {
                debug!(period = %period, "Accrual run in progress elsewhere, skipping tick");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Trigger a run for an explicit period (ops escape hatch)
    pub async fn trigger(&self, period: AccrualPeriod) -> Result<()> {
        info!(period = %period, "Manual accrual trigger");
        self.job.run_for_period(period).await?;
        Ok(())
    }
}

impl std::fmt::Debug for AccrualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccrualScheduler")
            .field("tick_interval", &self.tick_interval)
            .finish_non_exhaustive()
    }
}
