use std::time::{SystemTime, UNIX_EPOCH};

/// Return the current unix timestamp in seconds.
///
/// Signed because violation timestamps are subtracted against lookback
/// horizons that can precede the epoch in synthetic-time tests.
pub fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_secs() as i64)
}

pub const SECS_PER_MINUTE: i64 = 60;
pub const SECS_PER_HOUR: i64 = 3_600;
pub const SECS_PER_DAY: i64 = 86_400;
