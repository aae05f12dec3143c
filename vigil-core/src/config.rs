use std::collections::HashSet;
use std::env;

use crate::error::{Error, Result};

pub const DEFAULT_MAX_MESSAGES: u32 = 5;
pub const DEFAULT_WINDOW_SECONDS: i64 = 10;
pub const DEFAULT_VIOLATION_LOOKBACK_DAYS: i64 = 30;
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Default escalation ladder in minutes: 1h, 6h, 24h, 7d.
pub const DEFAULT_ESCALATION_DURATIONS: &[i64] = &[60, 360, 1_440, 10_080];

/// Immutable moderation settings, constructed once at startup and passed
/// explicitly into every component constructor.
#[derive(Clone, Debug)]
pub struct ModerationConfig {
    /// Messages allowed inside one sliding window before a mute triggers.
    pub max_messages: u32,
    /// Width of the rate-limit sliding window in seconds.
    pub window_seconds: i64,
    /// Mute durations in minutes, indexed by violation count within the
    /// lookback window; the last entry is reused for all higher counts.
    pub escalation_durations: Vec<i64>,
    /// User ids exempt from rate evaluation as admins.
    pub admin_ids: HashSet<i64>,
    /// User ids exempt from rate evaluation via the whitelist.
    pub whitelisted_ids: HashSet<i64>,
    /// How far back violations count toward the escalation level, in days.
    pub violation_lookback_days: i64,
    /// Age past which violation rows are purged outright, in days.
    pub retention_days: i64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            window_seconds: DEFAULT_WINDOW_SECONDS,
            escalation_durations: DEFAULT_ESCALATION_DURATIONS.to_vec(),
            admin_ids: HashSet::new(),
            whitelisted_ids: HashSet::new(),
            violation_lookback_days: DEFAULT_VIOLATION_LOOKBACK_DAYS,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl ModerationConfig {
    /// Load settings from the environment, falling back to defaults for
    /// anything unset. Invalid values are a hard `Config` error: the process
    /// must not start with a silently-wrong configuration.
    pub fn from_env() -> Result<Self> {
        let config = Self {
            max_messages: env_parsed("ANTIFLOOD_MAX_MESSAGES", DEFAULT_MAX_MESSAGES)?,
            window_seconds: env_parsed("ANTIFLOOD_WINDOW_SECONDS", DEFAULT_WINDOW_SECONDS)?,
            escalation_durations: match env::var("ESCALATION_DURATIONS") {
                Ok(raw) => parse_duration_list(&raw)?,
                Err(_) => DEFAULT_ESCALATION_DURATIONS.to_vec(),
            },
            admin_ids: parse_id_set("ADMIN_IDS", &env_or_empty("ADMIN_IDS"))?,
            whitelisted_ids: parse_id_set("WHITELISTED_USERS", &env_or_empty("WHITELISTED_USERS"))?,
            violation_lookback_days: env_parsed(
                "VIOLATION_LOOKBACK_DAYS",
                DEFAULT_VIOLATION_LOOKBACK_DAYS,
            )?,
            retention_days: env_parsed("RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the engine misbehave rather than
    /// letting them surface as runtime surprises.
    pub fn validate(&self) -> Result<()> {
        if self.max_messages == 0 {
            return Err(Error::Config("max_messages must be at least 1".into()));
        }
        if self.window_seconds < 1 {
            return Err(Error::Config("window_seconds must be at least 1".into()));
        }
        if self.escalation_durations.is_empty() {
            return Err(Error::Config(
                "escalation_durations must not be empty".into(),
            ));
        }
        if self.escalation_durations.iter().any(|minutes| *minutes <= 0) {
            return Err(Error::Config(
                "escalation durations must be positive minutes".into(),
            ));
        }
        // Non-decreasing by construction keeps escalation monotonic: a later
        // trigger can never produce a shorter mute than an earlier one.
        if self.escalation_durations.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(Error::Config(
                "escalation durations must be non-decreasing".into(),
            ));
        }
        if self.violation_lookback_days < 1 {
            return Err(Error::Config(
                "violation_lookback_days must be at least 1".into(),
            ));
        }
        if self.retention_days < 1 {
            return Err(Error::Config("retention_days must be at least 1".into()));
        }
        Ok(())
    }

    /// Lookback horizon in seconds for the escalation count.
    pub fn lookback_seconds(&self) -> i64 {
        self.violation_lookback_days * crate::time::SECS_PER_DAY
    }

    /// Retention horizon in seconds for the purge sweep.
    pub fn retention_seconds(&self) -> i64 {
        self.retention_days * crate::time::SECS_PER_DAY
    }
}

fn env_or_empty(key: &str) -> String {
    env::var(key).unwrap_or_default()
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{key} is not a valid number: `{raw}`"))),
        Err(_) => Ok(default),
    }
}

/// Parse a comma-separated list of user ids, e.g. `ADMIN_IDS=123,456`.
pub fn parse_id_set(key: &str, raw: &str) -> Result<HashSet<i64>> {
    let mut ids = HashSet::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id = part
            .parse::<i64>()
            .map_err(|_| Error::Config(format!("{key} contains a non-integer id: `{part}`")))?;
        ids.insert(id);
    }
    Ok(ids)
}

/// Parse a comma-separated escalation ladder in minutes, e.g. `60,360,1440`.
pub fn parse_duration_list(raw: &str) -> Result<Vec<i64>> {
    let mut durations = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let minutes = part.parse::<i64>().map_err(|_| {
            Error::Config(format!(
                "ESCALATION_DURATIONS contains a non-integer entry: `{part}`"
            ))
        })?;
        durations.push(minutes);
    }
    if durations.is_empty() {
        return Err(Error::Config("ESCALATION_DURATIONS is empty".into()));
    }
    Ok(durations)
}

#[cfg(test)]
mod tests {
    use super::{ModerationConfig, parse_duration_list, parse_id_set};

    #[test]
    fn parses_id_lists_with_whitespace_and_gaps() {
        let ids = parse_id_set("ADMIN_IDS", " 123, 456 ,,789 ").unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&123));
        assert!(ids.contains(&789));

        assert!(parse_id_set("ADMIN_IDS", "").unwrap().is_empty());
        assert!(parse_id_set("ADMIN_IDS", "12,abc").is_err());
    }

    #[test]
    fn parses_duration_lists() {
        assert_eq!(
            parse_duration_list("60, 360,1440").unwrap(),
            vec![60, 360, 1440]
        );
        assert!(parse_duration_list("").is_err());
        assert!(parse_duration_list("60,six").is_err());
    }

    #[test]
    fn default_config_validates() {
        ModerationConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_degenerate_settings() {
        let mut config = ModerationConfig::default();
        config.max_messages = 0;
        assert!(config.validate().is_err());

        let mut config = ModerationConfig::default();
        config.escalation_durations = vec![];
        assert!(config.validate().is_err());

        let mut config = ModerationConfig::default();
        config.escalation_durations = vec![60, 30];
        assert!(config.validate().is_err());

        let mut config = ModerationConfig::default();
        config.escalation_durations = vec![60, -5];
        assert!(config.validate().is_err());

        let mut config = ModerationConfig::default();
        config.retention_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn horizon_helpers_use_days() {
        let config = ModerationConfig::default();
        assert_eq!(config.lookback_seconds(), 30 * 86_400);
        assert_eq!(config.retention_seconds(), 90 * 86_400);
    }
}
