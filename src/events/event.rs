//! # Runtime events emitted by the supervisor, loops and watchdogs.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Loop lifecycle**: start, failed start, stop request, stopped
//! - **Faults and liveness**: iteration panics, watchdog timeout detections
//! - **Shutdown**: supervisor-wide teardown
//! - **Subscriber health**: overflow and panics inside subscriber workers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, loop name,
//! reasons and durations.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use loopvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TimeoutDetected)
//!     .with_loop("poller")
//!     .with_timeout(Duration::from_secs(5))
//!     .with_stalled_for(Duration::from_secs(7));
//!
//! assert_eq!(ev.kind, EventKind::TimeoutDetected);
//! assert_eq!(ev.name.as_deref(), Some("poller"));
//! assert_eq!(ev.timeout_ms, Some(5_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `name`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `name`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Shutdown events ===
    /// Supervisor-wide shutdown requested (OS signal or explicit call).
    ShutdownRequested,

    /// All loops stopped within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some loops did not stop in time.
    ///
    /// Sets:
    /// - `reason`: names of the stuck loops
    GraceExceeded,

    // === Loop lifecycle events ===
    /// Loop passed `on_start` and spawned its execution context.
    ///
    /// Sets:
    /// - `name`: loop name
    /// - `interval_ms`: configured interval
    /// - `timeout_ms`: configured liveness timeout
    LoopStarted,

    /// Loop failed to start (`on_start` error or duplicate name).
    ///
    /// Sets:
    /// - `name`: loop name
    /// - `reason`: error label
    LoopStartFailed,

    /// `stop` was called on a running loop; `on_stop` has returned.
    ///
    /// Sets:
    /// - `name`: loop name
    StopRequested,

    /// Execution context has exited and the loop left the registry.
    ///
    /// Sets:
    /// - `name`: loop name
    /// - `iteration`: number of iterations started in this run
    /// - `reason`: set when the context had faulted
    LoopStopped,

    // === Faults and liveness ===
    /// An iteration panicked; the diagnostic report has been written.
    ///
    /// Sets:
    /// - `name`: loop name
    /// - `iteration`: 1-based iteration number in the current run
    /// - `reason`: panic message
    IterationFaulted,

    /// The watchdog found a loop whose last iteration is older than its timeout.
    ///
    /// Sets:
    /// - `name`: loop name
    /// - `timeout_ms`: configured liveness timeout
    /// - `stalled_ms`: time since the last recorded iteration
    TimeoutDetected,

    /// A watchdog reaction panicked (the remaining reactions still ran).
    ///
    /// Sets:
    /// - `name`: loop name
    /// - `reason`: panic message
    ReactionPanicked,

    /// A timed-out loop was not handed to the reaction because the watchdog's
    /// reaction queue was full.
    ///
    /// Sets:
    /// - `name`: loop name
    /// - `reason`: "full" or "closed"
    ReactionDropped,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the loop (or subscriber), if applicable.
    pub name: Option<Arc<str>>,
    /// Human-readable reason (errors, panic messages, overflow details).
    pub reason: Option<Arc<str>>,
    /// Iteration counter (starting from 1).
    pub iteration: Option<u64>,
    /// Configured interval in milliseconds (compact).
    pub interval_ms: Option<u32>,
    /// Liveness timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Time since the last iteration in milliseconds (compact).
    pub stalled_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            name: None,
            reason: None,
            iteration: None,
            interval_ms: None,
            timeout_ms: None,
            stalled_ms: None,
        }
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a loop name.
    #[inline]
    pub fn with_loop(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches an iteration count.
    #[inline]
    pub fn with_iteration(mut self, n: u64) -> Self {
        self.iteration = Some(n);
        self
    }

    /// Attaches an interval (stored as milliseconds).
    #[inline]
    pub fn with_interval(mut self, d: Duration) -> Self {
        self.interval_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches the time since the last iteration (stored as milliseconds).
    #[inline]
    pub fn with_stalled_for(mut self, d: Duration) -> Self {
        self.stalled_ms = Some(compact_ms(d));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_loop(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_loop(subscriber)
            .with_reason(info)
    }

    /// True for [`EventKind::SubscriberOverflow`]; the subscriber set never re-reports these.
    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    /// True for [`EventKind::SubscriberPanicked`]; never fed back to the panicking subscriber.
    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::LoopStarted);
        let b = Event::new(EventKind::LoopStopped);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn durations_saturate() {
        let ev = Event::new(EventKind::LoopStarted).with_timeout(Duration::from_secs(u64::MAX));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
