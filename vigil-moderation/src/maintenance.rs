use serde::Serialize;
use tracing::{error, info};

use vigil_core::ModerationConfig;
use vigil_core::time::{SECS_PER_DAY, SECS_PER_HOUR};
use vigil_database::Database;
use vigil_database::impls::violations::{deactivate_expired, purge_older_than};

use crate::tracker::SlidingWindowTracker;

pub const PRUNE_INTERVAL_SECS: i64 = SECS_PER_HOUR;
pub const DEACTIVATE_INTERVAL_SECS: i64 = SECS_PER_HOUR;
pub const PURGE_INTERVAL_SECS: i64 = SECS_PER_DAY;

/// What one maintenance pass did. Actions that were not due report zero;
/// failed actions land in `errors` and are retried on the next due tick.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MaintenanceReport {
    pub pruned_tracker_keys: usize,
    pub deactivated_violations: u64,
    pub purged_violations: u64,
    pub errors: Vec<String>,
}

impl MaintenanceReport {
    pub fn did_work(&self) -> bool {
        self.pruned_tracker_keys > 0
            || self.deactivated_violations > 0
            || self.purged_violations > 0
            || !self.errors.is_empty()
    }
}

/// Cadence state for the periodic sweeps: hourly tracker prune, hourly
/// expiry deactivation, daily retention purge. Holds no durable state; a
/// restart just makes every action due again.
///
/// Each action is isolated: a storage failure is logged and reported but
/// never blocks the remaining actions, and the failed action's cadence is
/// not advanced, so it retries on the next tick.
#[derive(Debug, Default)]
pub struct MaintenanceScheduler {
    last_prune: Option<i64>,
    last_deactivate: Option<i64>,
    last_purge: Option<i64>,
}

impl MaintenanceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the actions whose cadence has elapsed. On the first call all
    /// three are due.
    pub async fn run_due(
        &mut self,
        tracker: &SlidingWindowTracker,
        db: &Database,
        config: &ModerationConfig,
        now: i64,
    ) -> MaintenanceReport {
        self.run(tracker, db, config, now, false).await
    }

    /// Run all three actions regardless of cadence (external cron trigger).
    pub async fn run_all(
        &mut self,
        tracker: &SlidingWindowTracker,
        db: &Database,
        config: &ModerationConfig,
        now: i64,
    ) -> MaintenanceReport {
        self.run(tracker, db, config, now, true).await
    }

    async fn run(
        &mut self,
        tracker: &SlidingWindowTracker,
        db: &Database,
        config: &ModerationConfig,
        now: i64,
        force: bool,
    ) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        if force || due(self.last_prune, PRUNE_INTERVAL_SECS, now) {
            report.pruned_tracker_keys = tracker.prune_expired_keys(now);
            self.last_prune = Some(now);
        }

        if force || due(self.last_deactivate, DEACTIVATE_INTERVAL_SECS, now) {
            match deactivate_expired(db, now).await {
                Ok(affected) => {
                    report.deactivated_violations = affected;
                    self.last_deactivate = Some(now);
                }
                Err(source) => {
                    error!(?source, "failed to deactivate expired violations");
                    report.errors.push(format!("deactivate_expired: {source}"));
                }
            }
        }

        if force || due(self.last_purge, PURGE_INTERVAL_SECS, now) {
            let horizon = now - config.retention_seconds();
            match purge_older_than(db, horizon).await {
                Ok(removed) => {
                    report.purged_violations = removed;
                    self.last_purge = Some(now);
                }
                Err(source) => {
                    error!(?source, horizon, "failed to purge old violations");
                    report.errors.push(format!("purge_older_than: {source}"));
                }
            }
        }

        if report.did_work() {
            info!(
                pruned_tracker_keys = report.pruned_tracker_keys,
                deactivated_violations = report.deactivated_violations,
                purged_violations = report.purged_violations,
                failures = report.errors.len(),
                "maintenance pass complete"
            );
        }

        report
    }
}

fn due(last: Option<i64>, interval: i64, now: i64) -> bool {
    last.is_none_or(|at| now - at >= interval)
}
