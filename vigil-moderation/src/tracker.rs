use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use vigil_core::ModerationConfig;

/// Result of recording one message against the sliding window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Messages inside the window after this one was counted.
    pub count: usize,
    /// True once `count` reaches the configured maximum.
    pub over_limit: bool,
}

/// Memory currently held by the tracker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackerStats {
    pub tracked_keys: usize,
    pub buffered_timestamps: usize,
}

/// Per-(user, chat) sliding window over recent message timestamps.
///
/// All state lives behind one coarse mutex; operations are synchronous and
/// O(window size), and the lock is never held across an await point. Entries
/// are pruned lazily on access plus by the periodic `prune_expired_keys`
/// sweep, never by per-entry timers.
///
/// Timestamps are unix seconds supplied by the caller. A `now` older than the
/// key's newest recorded timestamp is clamped up to it (a stale clock read is
/// treated as a same-instant resync), so each sequence stays non-decreasing
/// and pruning remains a prefix trim.
#[derive(Debug)]
pub struct SlidingWindowTracker {
    window_seconds: i64,
    max_messages: usize,
    entries: Mutex<HashMap<(i64, i64), VecDeque<i64>>>,
}

impl SlidingWindowTracker {
    pub fn new(config: &ModerationConfig) -> Self {
        Self {
            window_seconds: config.window_seconds,
            max_messages: config.max_messages as usize,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Count a message at `now` and report whether the pair is over the
    /// limit. Timestamps older than `now - window_seconds` are trimmed first;
    /// the window boundary is inclusive, so a timestamp exactly one window
    /// old still counts.
    pub fn record(&self, user_id: i64, chat_id: i64, now: i64) -> RecordOutcome {
        let mut entries = self.lock();
        let sequence = entries.entry((user_id, chat_id)).or_default();

        let now = clamp_to_newest(sequence, now);
        trim_expired(sequence, now - self.window_seconds);
        sequence.push_back(now);

        let count = sequence.len();
        RecordOutcome {
            count,
            over_limit: count >= self.max_messages,
        }
    }

    /// Messages currently inside the window for a pair, without recording.
    pub fn count(&self, user_id: i64, chat_id: i64, now: i64) -> usize {
        let mut entries = self.lock();
        let Some(sequence) = entries.get_mut(&(user_id, chat_id)) else {
            return 0;
        };

        let now = clamp_to_newest(sequence, now);
        trim_expired(sequence, now - self.window_seconds);

        if sequence.is_empty() {
            entries.remove(&(user_id, chat_id));
            return 0;
        }
        sequence.len()
    }

    /// Drop a pair's history entirely. Called after a mute decision so the
    /// window rearms cleanly instead of re-triggering on the next message.
    pub fn reset(&self, user_id: i64, chat_id: i64) {
        self.lock().remove(&(user_id, chat_id));
    }

    /// Remove exactly the keys whose newest timestamp has left the window.
    /// Returns the number of keys removed; this is what bounds memory.
    pub fn prune_expired_keys(&self, now: i64) -> usize {
        let cutoff = now - self.window_seconds;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, sequence| sequence.back().is_some_and(|newest| *newest >= cutoff));
        before - entries.len()
    }

    pub fn stats(&self) -> TrackerStats {
        let entries = self.lock();
        TrackerStats {
            tracked_keys: entries.len(),
            buffered_timestamps: entries.values().map(VecDeque::len).sum(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(i64, i64), VecDeque<i64>>> {
        // Panics while holding the lock only happen on logic bugs in this
        // module; recover the map rather than poisoning every future caller.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn clamp_to_newest(sequence: &VecDeque<i64>, now: i64) -> i64 {
    match sequence.back() {
        Some(newest) if *newest > now => *newest,
        _ => now,
    }
}

fn trim_expired(sequence: &mut VecDeque<i64>, cutoff: i64) {
    while sequence.front().is_some_and(|oldest| *oldest < cutoff) {
        sequence.pop_front();
    }
}
