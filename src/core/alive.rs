//! # Liveness timestamp.
//!
//! [`Heartbeat`] stores the time of the last completed iteration of a loop as an
//! offset from a fixed monotonic origin inside one `AtomicU64`, so writers (the
//! execution context, tasks calling `keep_alive`) and readers (watchdogs calling
//! `is_timed_out`) never take a lock and never observe a torn value.
//!
//! ## Rules
//! - The value never decreases (`fetch_max`).
//! - A fresh heartbeat counts as a beat at construction time.
//! - Time is read from tokio's clock ([`now`]), so a paused test runtime
//!   (`tokio::time::pause`) controls liveness too. Outside a paused runtime it is
//!   the same as [`Instant::now`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Current time on tokio's clock, as a std [`Instant`].
pub(crate) fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Monotonic, lock-free liveness timestamp.
#[derive(Debug)]
pub struct Heartbeat {
    origin: Instant,
    offset_nanos: AtomicU64,
}

impl Heartbeat {
    /// Creates a heartbeat whose last beat is now.
    pub fn new() -> Self {
        Self {
            origin: now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    /// Records a beat at the current time.
    pub fn beat(&self) {
        self.beat_at(now());
    }

    /// Records a beat at `at`; earlier than the last beat is a no-op.
    pub fn beat_at(&self, at: Instant) {
        let offset = at.saturating_duration_since(self.origin);
        let nanos = u64::try_from(offset.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_max(nanos, Ordering::AcqRel);
    }

    /// Time of the last beat.
    pub fn last(&self) -> Instant {
        self.origin + Duration::from_nanos(self.offset_nanos.load(Ordering::Acquire))
    }

    /// Time elapsed between the last beat and `now` (zero if `now` is earlier).
    pub fn stalled_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last())
    }
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_moves_backwards() {
        let hb = Heartbeat::new();
        let later = Instant::now() + Duration::from_secs(5);
        hb.beat_at(later);
        hb.beat_at(later - Duration::from_secs(3));
        assert_eq!(hb.last(), later);
    }

    #[test]
    fn stalled_for_saturates() {
        let hb = Heartbeat::new();
        let last = hb.last();
        assert_eq!(hb.stalled_for(last), Duration::ZERO);
        if let Some(earlier) = last.checked_sub(Duration::from_millis(1)) {
            assert_eq!(hb.stalled_for(earlier), Duration::ZERO);
        }
        assert_eq!(hb.stalled_for(last + Duration::from_secs(2)), Duration::from_secs(2));
    }
}
