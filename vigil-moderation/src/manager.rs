use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use vigil_core::time::now_unix_secs;
use vigil_core::{Error, ModerationConfig, Result};
use vigil_database::Database;
use vigil_database::impls::violations::{
    count_violations_since, deactivate_latest_active, insert_violation, latest_active_violation,
    store_stats,
};
use vigil_database::model::violation::{NewViolation, Violation, ViolationType};

use crate::escalation;
use crate::exemption::ExemptionPolicy;
use crate::maintenance::{MaintenanceReport, MaintenanceScheduler};
use crate::tracker::SlidingWindowTracker;

/// What the adapter layer should do about one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Action {
    /// Nothing to enforce.
    None,
    /// Mute the user for `duration_minutes`. `violation_id` is absent when
    /// the store refused the record and the decision is in-memory-only.
    AutoMute {
        duration_minutes: i64,
        violation_id: Option<i64>,
    },
}

/// Moderation state for one (user, chat) pair.
///
/// `degraded` marks a report assembled while the store was unreachable: the
/// store-derived fields are zeroed/absent and should not be treated as truth.
#[derive(Clone, Debug, Serialize)]
pub struct StatusReport {
    pub user_id: i64,
    pub chat_id: i64,
    pub active_violation: Option<Violation>,
    pub violations_in_lookback: i64,
    pub current_window_count: usize,
    pub is_exempt: bool,
    pub degraded: bool,
}

/// Aggregate counters across the store and the tracker.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct StatsReport {
    pub total_violations: i64,
    pub active_violations: i64,
    pub unique_users: i64,
    pub unique_chats: i64,
    /// Timestamps currently buffered by the sliding-window tracker.
    pub tracker_memory_size: usize,
    pub degraded: bool,
}

/// The auto-moderation core. Owns the sliding-window tracker, the exemption
/// gate, the escalation policy, and the maintenance cadence; the adapter
/// layer feeds it message events and enforces whatever it decides.
#[derive(Debug)]
pub struct ModerationManager {
    config: ModerationConfig,
    db: Database,
    tracker: SlidingWindowTracker,
    exemptions: ExemptionPolicy,
    maintenance: Mutex<MaintenanceScheduler>,
}

impl ModerationManager {
    pub fn new(config: ModerationConfig, db: Database) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            tracker: SlidingWindowTracker::new(&config),
            exemptions: ExemptionPolicy::new(&config),
            maintenance: Mutex::new(MaintenanceScheduler::new()),
            config,
            db,
        })
    }

    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    /// Evaluate one incoming message event.
    ///
    /// Exempt users are never counted. When the pair crosses the limit, the
    /// escalation decision is made, the window is reset so it rearms cleanly,
    /// and the caller receives the mute to enforce.
    pub async fn evaluate_message(
        &self,
        user_id: i64,
        chat_id: i64,
        timestamp: i64,
    ) -> Result<Action> {
        validate_pair(user_id, chat_id)?;

        if self.exemptions.is_exempt(user_id, chat_id) {
            return Ok(Action::None);
        }

        let outcome = self.tracker.record(user_id, chat_id, timestamp);
        if !outcome.over_limit {
            return Ok(Action::None);
        }

        let decision = escalation::decide(&self.db, &self.config, user_id, chat_id, timestamp).await;
        self.tracker.reset(user_id, chat_id);

        info!(
            user_id,
            chat_id,
            messages_in_window = outcome.count,
            duration_minutes = decision.duration_minutes,
            "rate limit exceeded; auto-mute decided"
        );

        Ok(Action::AutoMute {
            duration_minutes: decision.duration_minutes,
            violation_id: decision.violation.map(|violation| violation.id),
        })
    }

    /// Record an admin-initiated mute.
    pub async fn manual_mute(
        &self,
        user_id: i64,
        chat_id: i64,
        duration_minutes: i64,
    ) -> Result<Violation> {
        validate_pair(user_id, chat_id)?;
        if duration_minutes <= 0 {
            return Err(Error::Validation(
                "mute duration must be positive minutes".into(),
            ));
        }

        let violation = insert_violation(
            &self.db,
            NewViolation {
                user_id,
                chat_id,
                violation_type: ViolationType::Manual,
                timestamp: now_unix_secs(),
                mute_duration_minutes: duration_minutes,
            },
        )
        .await?;

        info!(user_id, chat_id, duration_minutes, "manual mute recorded");
        Ok(violation)
    }

    /// Lift a mute: deactivates the pair's most recent active violation.
    /// Returns `false` (and changes nothing) if none is active.
    pub async fn manual_unmute(&self, user_id: i64, chat_id: i64) -> Result<bool> {
        validate_pair(user_id, chat_id)?;
        let lifted = deactivate_latest_active(&self.db, user_id, chat_id).await?;
        if lifted {
            info!(user_id, chat_id, "manual unmute recorded");
        }
        Ok(lifted)
    }

    /// Moderation status for one pair. A storage failure degrades the report
    /// instead of failing it; only invalid input is an error.
    pub async fn get_status(&self, user_id: i64, chat_id: i64) -> Result<StatusReport> {
        validate_pair(user_id, chat_id)?;
        let now = now_unix_secs();
        let since = now - self.config.lookback_seconds();

        let mut degraded = false;
        let active_violation = match latest_active_violation(&self.db, user_id, chat_id, now).await
        {
            Ok(active) => active,
            Err(source) => {
                warn!(?source, user_id, chat_id, "status read degraded");
                degraded = true;
                None
            }
        };
        let violations_in_lookback =
            match count_violations_since(&self.db, user_id, chat_id, since).await {
                Ok(count) => count,
                Err(source) => {
                    warn!(?source, user_id, chat_id, "status count degraded");
                    degraded = true;
                    0
                }
            };

        Ok(StatusReport {
            user_id,
            chat_id,
            active_violation,
            violations_in_lookback,
            current_window_count: self.tracker.count(user_id, chat_id, now),
            is_exempt: self.exemptions.is_exempt(user_id, chat_id),
            degraded,
        })
    }

    /// Aggregate counters. Degrades like `get_status` when the store is
    /// unreachable; tracker counters are always live.
    pub async fn get_stats(&self) -> StatsReport {
        let tracker_stats = self.tracker.stats();

        match store_stats(&self.db).await {
            Ok(stats) => StatsReport {
                total_violations: stats.total_violations,
                active_violations: stats.active_violations,
                unique_users: stats.unique_users,
                unique_chats: stats.unique_chats,
                tracker_memory_size: tracker_stats.buffered_timestamps,
                degraded: false,
            },
            Err(source) => {
                warn!(?source, "stats read degraded");
                StatsReport {
                    tracker_memory_size: tracker_stats.buffered_timestamps,
                    degraded: true,
                    ..StatsReport::default()
                }
            }
        }
    }

    /// Force all maintenance sweeps (external cron trigger).
    pub async fn run_maintenance_once(&self, now: i64) -> MaintenanceReport {
        let mut scheduler = self.maintenance.lock().await;
        scheduler
            .run_all(&self.tracker, &self.db, &self.config, now)
            .await
    }

    /// Run whichever maintenance sweeps are due at `now` (daemon tick).
    pub async fn run_due_maintenance(&self, now: i64) -> MaintenanceReport {
        let mut scheduler = self.maintenance.lock().await;
        scheduler
            .run_due(&self.tracker, &self.db, &self.config, now)
            .await
    }
}

fn validate_pair(user_id: i64, chat_id: i64) -> Result<()> {
    if user_id <= 0 {
        return Err(Error::Validation(format!(
            "user_id must be positive, got {user_id}"
        )));
    }
    if chat_id == 0 {
        return Err(Error::Validation("chat_id must be non-zero".into()));
    }
    Ok(())
}
