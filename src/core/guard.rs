//! # Failure isolation around iterations.
//!
//! Two pieces cooperate to keep a panicking task from leaving stale state behind:
//!
//! - [`isolate`] wraps one iteration in `catch_unwind`. On a panic it captures a
//!   [`FaultReport`], writes it to the loop's diagnostic sink, publishes
//!   `IterationFaulted` and then applies the [`FaultPolicy`]: re-raise inside the
//!   execution context, or abort the process.
//! - [`ExitGuard`] lives for the whole execution context. Unless disarmed by a
//!   normal exit, its `Drop` marks the loop faulted and removes it from the
//!   registry, so a crashed loop never looks "stuck" to a watchdog.
//!
//! ```text
//! run() ── ExitGuard::arm ──► loop { tick ─► isolate(work) ─► keep_alive }
//!             │                               │ panic
//!             │                               ├─► FaultReport ─► sink
//!             │                               ├─► publish IterationFaulted
//!             │                               └─► resume_unwind / abort
//!             └── Drop (armed) ─► state = Faulted, registry.remove_if(self)
//! ```

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::config::FaultPolicy;
use crate::core::supervised::SupervisedLoop;
use crate::diagnostics::DiagnosticSink;
use crate::events::{Bus, Event, EventKind};

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Diagnostic snapshot of a panicking iteration.
///
/// The backtrace is taken where the panic was intercepted, i.e. in the loop's
/// execution context; set `RUST_BACKTRACE=1` together with the default panic
/// hook to also get the frames of the panic site.
#[derive(Debug)]
pub struct FaultReport {
    /// Loop name.
    pub name: String,
    /// 1-based iteration number within the run.
    pub iteration: u64,
    /// Panic message.
    pub message: String,
    /// Captured backtrace.
    pub backtrace: Backtrace,
}

impl FaultReport {
    fn capture(name: &str, iteration: u64, payload: &(dyn Any + Send)) -> Self {
        Self {
            name: name.to_string(),
            iteration,
            message: panic_message(payload),
            backtrace: Backtrace::force_capture(),
        }
    }
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "caught panic in supervised loop {{panic={}, name={}, iteration={}}}:\n{}",
            self.message, self.name, self.iteration, self.backtrace
        )
    }
}

/// Where a fault is reported and what happens afterwards.
pub(crate) struct FaultScope<'a> {
    pub name: &'a str,
    pub iteration: u64,
    pub policy: FaultPolicy,
    pub sink: Option<&'a dyn DiagnosticSink>,
    pub bus: &'a Bus,
}

/// Runs one iteration; on panic reports it and applies the fault policy.
///
/// Never swallows a panic: it either resumes unwinding or aborts.
pub(crate) async fn isolate<F>(scope: FaultScope<'_>, iteration: F)
where
    F: Future<Output = ()>,
{
    let Err(payload) = AssertUnwindSafe(iteration).catch_unwind().await else {
        return;
    };

    let report = FaultReport::capture(scope.name, scope.iteration, payload.as_ref());
    if let Some(sink) = scope.sink {
        sink.write_report(&report.to_string());
    }
    scope.bus.publish(
        Event::new(EventKind::IterationFaulted)
            .with_loop(scope.name)
            .with_iteration(scope.iteration)
            .with_reason(report.message.as_str()),
    );

    match scope.policy {
        FaultPolicy::Isolate => std::panic::resume_unwind(payload),
        FaultPolicy::Abort => {
            tracing::error!(
                loop_name = scope.name,
                panic = %report.message,
                "aborting process after iteration fault"
            );
            std::process::abort()
        }
    }
}

/// Scope-exit cleanup of an execution context.
pub(crate) struct ExitGuard<'a> {
    owner: &'a SupervisedLoop,
    armed: bool,
}

impl<'a> ExitGuard<'a> {
    pub(crate) fn arm(owner: &'a SupervisedLoop) -> Self {
        Self { owner, armed: true }
    }

    /// Marks a normal exit; `stop` does the cleanup.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.owner.mark_faulted();
        }
    }
}
