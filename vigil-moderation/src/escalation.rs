use tracing::error;

use vigil_core::ModerationConfig;
use vigil_database::Database;
use vigil_database::impls::violations::{count_violations_since, insert_violation};
use vigil_database::model::violation::{NewViolation, Violation, ViolationType};

/// Outcome of an escalation decision. The caller enforces the mute
/// externally; `violation` is `None` only when the store refused the record
/// and the decision proceeds in-memory-only.
#[derive(Clone, Debug)]
pub struct MuteDecision {
    pub duration_minutes: i64,
    pub violation: Option<Violation>,
}

/// Mute duration for the nth qualifying violation (1-based).
///
/// The last table entry is reused for every count past the end, and a
/// non-positive count falls back to the first entry. The table is validated
/// non-empty and non-decreasing at configuration load.
pub fn mute_duration_minutes(durations: &[i64], violation_count: i64) -> i64 {
    if violation_count <= 0 {
        return durations[0];
    }
    let index = usize::min(violation_count as usize, durations.len()) - 1;
    durations[index]
}

/// Decide the mute for a rate-limit trigger and record the violation.
///
/// The history count and the insert run under the handle's write guard so two
/// near-simultaneous triggers for the same pair serialize: the second always
/// observes the first's row and lands one escalation level higher.
///
/// Fails closed: if the history lookup errors, the decision still goes out at
/// the minimum configured duration, and the insert is still attempted.
pub async fn decide(
    db: &Database,
    config: &ModerationConfig,
    user_id: i64,
    chat_id: i64,
    trigger_time: i64,
) -> MuteDecision {
    let _guard = db.write_guard().await;

    let since = trigger_time - config.lookback_seconds();
    let violation_count = match count_violations_since(db, user_id, chat_id, since).await {
        // +1 accounts for the violation about to be recorded.
        Ok(prior) => prior + 1,
        Err(source) => {
            error!(
                ?source,
                user_id,
                chat_id,
                "violation history lookup failed; falling back to minimum mute duration"
            );
            0
        }
    };

    let duration_minutes = mute_duration_minutes(&config.escalation_durations, violation_count);

    let violation = match insert_violation(
        db,
        NewViolation {
            user_id,
            chat_id,
            violation_type: ViolationType::RateLimit,
            timestamp: trigger_time,
            mute_duration_minutes: duration_minutes,
        },
    )
    .await
    {
        Ok(violation) => Some(violation),
        Err(source) => {
            error!(
                ?source,
                user_id,
                chat_id,
                duration_minutes,
                "failed to record violation; proceeding with in-memory decision"
            );
            None
        }
    };

    MuteDecision {
        duration_minutes,
        violation,
    }
}
