//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the supervisor runtime.
//!
//! Config is used in two ways:
//! 1. **Supervisor creation**: `Supervisor::builder(config)`
//! 2. **Loop defaults**: [`LoopBuilder`](crate::LoopBuilder) inherits interval, timeout
//!    and fault policy from the supervisor's config unless overridden per loop.
//!
//! ## Sentinel values
//! - `timeout = 0s` → falls back to [`DEFAULT_TIMEOUT`] (a loop always has a timeout)
//! - `interval = 0s` → iterations run back to back (clamped to 1ms)

use std::time::Duration;

/// Timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Smallest interval accepted by a loop.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// What happens after an iteration panicked and its diagnostic was written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Re-raise the panic inside the loop's execution context only.
    ///
    /// The context ends, the loop is marked faulted and removed from the registry;
    /// the next `stop()` reaps it and returns [`LoopError::IterationFault`](crate::LoopError::IterationFault).
    #[default]
    Isolate,
    /// Abort the whole process once the diagnostic was written.
    Abort,
}

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
/// - `interval`: Default time between iteration starts
/// - `timeout`: Default liveness timeout (`0s` = [`DEFAULT_TIMEOUT`])
/// - `grace`: Maximum wait for all loops to stop in [`Supervisor::shutdown`](crate::Supervisor::shutdown)
/// - `fault`: Default reaction to a panicking iteration
/// - `reaction_queue`: Pending timeout reactions per watchdog (min 1)
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// Default interval between iteration starts.
    pub interval: Duration,

    /// Default maximum gap since the last iteration before a loop counts as stuck.
    pub timeout: Duration,

    /// Maximum time [`Supervisor::shutdown`](crate::Supervisor::shutdown) waits for loops to stop.
    pub grace: Duration,

    /// Default fault policy for loops.
    pub fault: FaultPolicy,

    /// Capacity of each watchdog's reaction queue.
    ///
    /// Timed-out loops that do not fit are dropped for that sweep and reported
    /// as `ReactionDropped`. Minimum value is 1.
    pub reaction_queue: usize,
}

impl Config {
    /// Returns the default timeout with the `0s` sentinel resolved.
    #[inline]
    pub fn default_timeout(&self) -> Duration {
        resolve_timeout(self.timeout)
    }

    /// Returns the default interval clamped to [`MIN_INTERVAL`].
    #[inline]
    pub fn default_interval(&self) -> Duration {
        clamp_interval(self.interval)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a reaction queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn reaction_queue_clamped(&self) -> usize {
        self.reaction_queue.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `interval = 1s`
    /// - `timeout = 1h`
    /// - `grace = 60s`
    /// - `fault = FaultPolicy::Isolate`
    /// - `reaction_queue = 64`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            interval: Duration::from_secs(1),
            timeout: DEFAULT_TIMEOUT,
            grace: Duration::from_secs(60),
            fault: FaultPolicy::default(),
            reaction_queue: 64,
        }
    }
}

pub(crate) fn resolve_timeout(timeout: Duration) -> Duration {
    if timeout == Duration::ZERO {
        DEFAULT_TIMEOUT
    } else {
        timeout
    }
}

pub(crate) fn clamp_interval(interval: Duration) -> Duration {
    interval.max(MIN_INTERVAL)
}
