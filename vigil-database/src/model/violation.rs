use serde::Serialize;

/// How a violation came to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// Triggered automatically by the sliding-window rate limiter.
    RateLimit,
    /// Recorded by an admin-initiated mute.
    Manual,
}

impl ViolationType {
    pub fn as_str(self) -> &'static str {
        match self {
            ViolationType::RateLimit => "rate_limit",
            ViolationType::Manual => "manual",
        }
    }

    /// Rows written by any version of this schema carry one of the two known
    /// tags; anything else decodes as `RateLimit`, the column default.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "manual" => ViolationType::Manual,
            _ => ViolationType::RateLimit,
        }
    }
}

/// A durable violation record, the single source of truth for escalation.
#[derive(Clone, Debug, Serialize)]
pub struct Violation {
    pub id: i64,
    pub user_id: i64,
    pub chat_id: i64,
    pub violation_type: ViolationType,
    /// Unix seconds at which the violation was recorded.
    pub timestamp: i64,
    pub mute_duration_minutes: i64,
    pub is_active: bool,
}

impl Violation {
    /// Unix second at which the mute stops covering the user.
    pub fn expires_at(&self) -> i64 {
        self.timestamp + self.mute_duration_minutes * 60
    }
}

/// Input for recording a new violation.
#[derive(Clone, Copy, Debug)]
pub struct NewViolation {
    pub user_id: i64,
    pub chat_id: i64,
    pub violation_type: ViolationType,
    pub timestamp: i64,
    pub mute_duration_minutes: i64,
}

/// Aggregate counters over the violation table.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct StoreStats {
    pub total_violations: i64,
    pub active_violations: i64,
    pub unique_users: i64,
    pub unique_chats: i64,
}
