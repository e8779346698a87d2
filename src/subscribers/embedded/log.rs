//! # LogWriter: event logger
//!
//! A subscriber that renders incoming [`Event`]s as `tracing` records.
//! Install any `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see them.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  loopvisor: loop started loop_name="poller" interval_ms=1000 timeout_ms=3600000
//! ERROR loopvisor: iteration faulted loop_name="poller" iteration=3 reason="index out of bounds"
//! WARN  loopvisor: loop timed out loop_name="poller" timeout_ms=5000 stalled_ms=7012
//! INFO  loopvisor: loop stopped loop_name="poller" iterations=12
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let name = e.name.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::LoopStarted => tracing::info!(
                target: "loopvisor",
                loop_name = name,
                interval_ms = e.interval_ms,
                timeout_ms = e.timeout_ms,
                "loop started"
            ),
            EventKind::LoopStartFailed => {
                tracing::warn!(target: "loopvisor", loop_name = name, reason, "loop failed to start")
            }
            EventKind::StopRequested => {
                tracing::debug!(target: "loopvisor", loop_name = name, "stop requested")
            }
            EventKind::LoopStopped => tracing::info!(
                target: "loopvisor",
                loop_name = name,
                iterations = e.iteration,
                reason,
                "loop stopped"
            ),
            EventKind::IterationFaulted => tracing::error!(
                target: "loopvisor",
                loop_name = name,
                iteration = e.iteration,
                reason,
                "iteration faulted"
            ),
            EventKind::TimeoutDetected => tracing::warn!(
                target: "loopvisor",
                loop_name = name,
                timeout_ms = e.timeout_ms,
                stalled_ms = e.stalled_ms,
                "loop timed out"
            ),
            EventKind::ReactionPanicked => {
                tracing::error!(target: "loopvisor", loop_name = name, reason, "timeout reaction panicked")
            }
            EventKind::ReactionDropped => {
                tracing::warn!(target: "loopvisor", loop_name = name, reason, "timeout reaction dropped")
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: "loopvisor", "shutdown requested")
            }
            EventKind::AllStoppedWithin => {
                tracing::info!(target: "loopvisor", "all loops stopped within grace")
            }
            EventKind::GraceExceeded => {
                tracing::warn!(target: "loopvisor", stuck = reason, "grace exceeded")
            }
            EventKind::SubscriberOverflow => tracing::warn!(
                target: "loopvisor",
                subscriber = name,
                reason,
                "subscriber overflow"
            ),
            EventKind::SubscriberPanicked => tracing::warn!(
                target: "loopvisor",
                subscriber = name,
                reason,
                "subscriber panicked"
            ),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
