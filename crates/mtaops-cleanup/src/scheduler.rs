//! Cron-driven cleanup runs.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use mtaops_config::CleanupConfig;
use mtaops_protocols::error::CleanupError;

use crate::coordinator::{CleanupCoordinator, CleanupReport};

/// Fires the cleanup chain on a cron schedule until shut down.
pub struct CleanupScheduler {
    coordinator: Arc<CleanupCoordinator>,
    schedule: Schedule,
    retention: Duration,
}

impl CleanupScheduler {
    /// Scheduler firing on `cron_expr` (6 fields, seconds first) and
    /// reclaiming data older than `retention_days`.
    pub fn new(
        coordinator: Arc<CleanupCoordinator>,
        cron_expr: &str,
        retention_days: u32,
    ) -> Result<Self, CleanupError> {
        let schedule = Schedule::from_str(cron_expr)
            .map_err(|e| CleanupError::Custom(format!("Invalid cleanup schedule '{}': {}", cron_expr, e)))?;
        Ok(Self {
            coordinator,
            schedule,
            retention: Duration::days(i64::from(retention_days)),
        })
    }

    pub fn from_config(coordinator: Arc<CleanupCoordinator>, config: &CleanupConfig) -> Result<Self, CleanupError> {
        Self::new(coordinator, &config.schedule, config.retention_days)
    }

    /// Cutoff for a run at `now`.
    pub fn expiration_for(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.retention
    }

    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Run the chain once for a run at `now`.
    pub async fn run_cleanup(&self, now: DateTime<Utc>) -> CleanupReport {
        self.coordinator.execute(self.expiration_for(now)).await
    }

    /// Sleep until each fire time and run the chain. Returns once `shutdown`
    /// changes or the schedule has no further fire times.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("Cleanup scheduler started (retention {} days)", self.retention.num_days());
        let mut last_fire: Option<DateTime<Utc>> = None;

        loop {
            let now = Utc::now();
            let after = last_fire.map_or(now, |last| last.max(now));
            let Some(next) = self.next_fire_after(after) else {
                warn!("Cleanup schedule has no upcoming fire time, stopping");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            debug!("Next cleanup at {} (in {:?})", next, wait);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    last_fire = Some(next);
                    let report = self.run_cleanup(Utc::now()).await;
                    debug!("Cleanup run removed {} items", report.total_cleaned());
                }
                _ = shutdown.changed() => {
                    info!("Cleanup scheduler shutting down");
                    break;
                }
            }
        }
    }
}
