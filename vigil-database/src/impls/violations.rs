use vigil_core::Result;

use crate::database::Database;
use crate::model::violation::{NewViolation, StoreStats, Violation, ViolationType};

#[derive(sqlx::FromRow)]
struct ViolationRow {
    id: i64,
    user_id: i64,
    chat_id: i64,
    violation_type: String,
    timestamp: i64,
    mute_duration_minutes: i64,
    is_active: bool,
}

impl From<ViolationRow> for Violation {
    fn from(row: ViolationRow) -> Self {
        Violation {
            id: row.id,
            user_id: row.user_id,
            chat_id: row.chat_id,
            violation_type: ViolationType::parse(&row.violation_type),
            timestamp: row.timestamp,
            mute_duration_minutes: row.mute_duration_minutes,
            is_active: row.is_active,
        }
    }
}

/// Record a violation and return the stored row.
pub async fn insert_violation(db: &Database, new: NewViolation) -> Result<Violation> {
    let row: ViolationRow = sqlx::query_as(
        "INSERT INTO user_violations
         (user_id, chat_id, violation_type, timestamp, mute_duration_minutes, is_active)
         VALUES (?, ?, ?, ?, ?, 1)
         RETURNING id, user_id, chat_id, violation_type, timestamp, mute_duration_minutes, is_active",
    )
    .bind(new.user_id)
    .bind(new.chat_id)
    .bind(new.violation_type.as_str())
    .bind(new.timestamp)
    .bind(new.mute_duration_minutes)
    .fetch_one(db.pool())
    .await?;

    Ok(row.into())
}

/// Count violations for a pair with `timestamp >= since`, active or not.
/// Escalation looks at occurrence count within the lookback window, not just
/// currently-active mutes.
pub async fn count_violations_since(
    db: &Database,
    user_id: i64,
    chat_id: i64,
    since: i64,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM user_violations
         WHERE user_id = ? AND chat_id = ? AND timestamp >= ?",
    )
    .bind(user_id)
    .bind(chat_id)
    .bind(since)
    .fetch_one(db.pool())
    .await?;

    Ok(count)
}

/// Clear the active flag on every violation whose mute window has elapsed.
/// Returns the number of rows affected.
pub async fn deactivate_expired(db: &Database, now: i64) -> Result<u64> {
    let affected = sqlx::query(
        "UPDATE user_violations SET is_active = 0
         WHERE is_active = 1 AND timestamp + mute_duration_minutes * 60 <= ?",
    )
    .bind(now)
    .execute(db.pool())
    .await?
    .rows_affected();

    Ok(affected)
}

/// Deactivate the most recent active violation for a pair (manual unmute).
/// Returns `false` if the pair has no active violation; the store is left
/// untouched in that case.
pub async fn deactivate_latest_active(db: &Database, user_id: i64, chat_id: i64) -> Result<bool> {
    let affected = sqlx::query(
        "UPDATE user_violations SET is_active = 0
         WHERE id = (
             SELECT id FROM user_violations
             WHERE user_id = ? AND chat_id = ? AND is_active = 1
             ORDER BY timestamp DESC, id DESC
             LIMIT 1
         )",
    )
    .bind(user_id)
    .bind(chat_id)
    .execute(db.pool())
    .await?
    .rows_affected();

    Ok(affected > 0)
}

/// The most recent violation for a pair whose flag is still set and whose
/// mute window covers `now`. The flag alone is not enough: it is reconciled
/// lazily by the hourly sweep, so a raw flag read could report an
/// already-expired mute.
pub async fn latest_active_violation(
    db: &Database,
    user_id: i64,
    chat_id: i64,
    now: i64,
) -> Result<Option<Violation>> {
    let row: Option<ViolationRow> = sqlx::query_as(
        "SELECT id, user_id, chat_id, violation_type, timestamp, mute_duration_minutes, is_active
         FROM user_violations
         WHERE user_id = ? AND chat_id = ? AND is_active = 1
           AND timestamp + mute_duration_minutes * 60 > ?
         ORDER BY timestamp DESC, id DESC
         LIMIT 1",
    )
    .bind(user_id)
    .bind(chat_id)
    .bind(now)
    .fetch_optional(db.pool())
    .await?;

    Ok(row.map(Violation::from))
}

/// Irreversibly delete rows with `timestamp < horizon`, active or not.
/// Returns the number of rows removed.
pub async fn purge_older_than(db: &Database, horizon: i64) -> Result<u64> {
    let removed = sqlx::query("DELETE FROM user_violations WHERE timestamp < ?")
        .bind(horizon)
        .execute(db.pool())
        .await?
        .rows_affected();

    Ok(removed)
}

/// Aggregate counters over the whole table.
pub async fn store_stats(db: &Database) -> Result<StoreStats> {
    let (total, active, users, chats): (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT
             COUNT(*),
             COALESCE(SUM(is_active), 0),
             COUNT(DISTINCT user_id),
             COUNT(DISTINCT chat_id)
         FROM user_violations",
    )
    .fetch_one(db.pool())
    .await?;

    Ok(StoreStats {
        total_violations: total,
        active_violations: active,
        unique_users: users,
        unique_chats: chats,
    })
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::database::MIGRATOR;

    const DAY: i64 = 86_400;

    async fn test_db() -> Database {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        MIGRATOR.run(&pool).await.expect("migrations");
        Database::new(pool)
    }

    fn rate_limit_violation(timestamp: i64, minutes: i64) -> NewViolation {
        NewViolation {
            user_id: 123,
            chat_id: -456,
            violation_type: ViolationType::RateLimit,
            timestamp,
            mute_duration_minutes: minutes,
        }
    }

    #[tokio::test]
    async fn insert_returns_stored_row() {
        let db = test_db().await;
        let violation = insert_violation(&db, rate_limit_violation(1_000, 60))
            .await
            .unwrap();

        assert!(violation.id > 0);
        assert_eq!(violation.user_id, 123);
        assert_eq!(violation.chat_id, -456);
        assert_eq!(violation.violation_type, ViolationType::RateLimit);
        assert_eq!(violation.timestamp, 1_000);
        assert_eq!(violation.mute_duration_minutes, 60);
        assert!(violation.is_active);
        assert_eq!(violation.expires_at(), 1_000 + 3_600);
    }

    #[tokio::test]
    async fn count_uses_inclusive_since() {
        let db = test_db().await;
        insert_violation(&db, rate_limit_violation(100, 60))
            .await
            .unwrap();

        assert_eq!(count_violations_since(&db, 123, -456, 100).await.unwrap(), 1);
        assert_eq!(count_violations_since(&db, 123, -456, 101).await.unwrap(), 0);
        // Other pairs never bleed in.
        assert_eq!(count_violations_since(&db, 124, -456, 0).await.unwrap(), 0);
        assert_eq!(count_violations_since(&db, 123, -457, 0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn count_ignores_active_flag() {
        let db = test_db().await;
        insert_violation(&db, rate_limit_violation(100, 60))
            .await
            .unwrap();
        insert_violation(&db, rate_limit_violation(200, 60))
            .await
            .unwrap();
        deactivate_expired(&db, 200 + 3_600).await.unwrap();

        assert_eq!(count_violations_since(&db, 123, -456, 0).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn deactivate_expired_boundary() {
        let db = test_db().await;
        // Expires at t = 3_600 exactly.
        insert_violation(&db, rate_limit_violation(0, 60))
            .await
            .unwrap();

        assert_eq!(deactivate_expired(&db, 3_599).await.unwrap(), 0);
        assert_eq!(deactivate_expired(&db, 3_600).await.unwrap(), 1);
        // Already cleared; nothing left to flip.
        assert_eq!(deactivate_expired(&db, 3_600).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn manual_unmute_without_active_violation_is_a_noop() {
        let db = test_db().await;
        assert!(!deactivate_latest_active(&db, 123, -456).await.unwrap());
        assert_eq!(store_stats(&db).await.unwrap().total_violations, 0);
    }

    #[tokio::test]
    async fn manual_unmute_clears_most_recent_active() {
        let db = test_db().await;
        insert_violation(&db, rate_limit_violation(100, 60))
            .await
            .unwrap();
        let later = insert_violation(&db, rate_limit_violation(200, 360))
            .await
            .unwrap();

        assert!(deactivate_latest_active(&db, 123, -456).await.unwrap());
        let remaining = latest_active_violation(&db, 123, -456, 200).await.unwrap();
        // The earlier violation is still flagged and unexpired at t=200.
        let remaining = remaining.expect("earlier violation still active");
        assert_ne!(remaining.id, later.id);
        assert_eq!(remaining.timestamp, 100);
    }

    #[tokio::test]
    async fn latest_active_requires_unexpired_window() {
        let db = test_db().await;
        insert_violation(&db, rate_limit_violation(0, 60))
            .await
            .unwrap();

        assert!(
            latest_active_violation(&db, 123, -456, 3_599)
                .await
                .unwrap()
                .is_some()
        );
        // Flag still set, but the mute window has elapsed.
        assert!(
            latest_active_violation(&db, 123, -456, 3_600)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn purge_respects_retention_horizon() {
        let db = test_db().await;
        let now = 100 * DAY;
        insert_violation(&db, rate_limit_violation(now - 91 * DAY, 60))
            .await
            .unwrap();
        insert_violation(&db, rate_limit_violation(now - 89 * DAY, 60))
            .await
            .unwrap();

        let removed = purge_older_than(&db, now - 90 * DAY).await.unwrap();
        assert_eq!(removed, 1);

        let stats = store_stats(&db).await.unwrap();
        assert_eq!(stats.total_violations, 1);
        assert_eq!(
            count_violations_since(&db, 123, -456, 0).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn stats_count_distinct_pairs() {
        let db = test_db().await;
        insert_violation(&db, rate_limit_violation(0, 60))
            .await
            .unwrap();
        insert_violation(
            &db,
            NewViolation {
                user_id: 124,
                chat_id: -456,
                violation_type: ViolationType::Manual,
                timestamp: 10,
                mute_duration_minutes: 30,
            },
        )
        .await
        .unwrap();
        insert_violation(
            &db,
            NewViolation {
                user_id: 123,
                chat_id: -999,
                violation_type: ViolationType::RateLimit,
                timestamp: 20,
                mute_duration_minutes: 60,
            },
        )
        .await
        .unwrap();
        deactivate_latest_active(&db, 124, -456).await.unwrap();

        let stats = store_stats(&db).await.unwrap();
        assert_eq!(stats.total_violations, 3);
        assert_eq!(stats.active_violations, 2);
        assert_eq!(stats.unique_users, 2);
        assert_eq!(stats.unique_chats, 2);
    }
}
