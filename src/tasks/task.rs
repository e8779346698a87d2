//! # Task abstraction.
//!
//! This module defines the [`Task`] trait (async, cooperative) that a
//! [`SupervisedLoop`](crate::SupervisedLoop) runs on every tick, and the
//! [`LoopContext`] handed to each iteration.
//! The common handle type is [`TaskRef`], an `Arc<dyn Task>` suitable for sharing across the runtime.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::Heartbeat;
use crate::error::TaskError;

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;

/// # Repeatable unit of work.
///
/// A loop calls [`on_start`](Task::on_start) once before spawning its execution
/// context, [`work`](Task::work) once per tick, and [`on_stop`](Task::on_stop)
/// once when `stop` is requested (before the context is signalled).
///
/// `work` has no error channel: a panic is treated as a fault (see
/// [`FaultPolicy`](crate::FaultPolicy)); anything else is the task's own business,
/// including retries.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use loopvisor::{LoopContext, Task, TaskError};
///
/// struct Flush;
///
/// #[async_trait]
/// impl Task for Flush {
///     async fn on_start(&self) -> Result<(), TaskError> {
///         // open connections...
///         Ok(())
///     }
///
///     async fn work(&self, ctx: LoopContext) {
///         for _batch in 0..3 {
///             if ctx.is_cancelled() {
///                 return;
///             }
///             // flush one batch...
///             ctx.keep_alive();
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Runs once before the first iteration; an error aborts `start`.
    async fn on_start(&self) -> Result<(), TaskError> {
        Ok(())
    }

    /// Runs one iteration.
    async fn work(&self, ctx: LoopContext);

    /// Runs once when the loop is being stopped, before the execution context exits.
    async fn on_stop(&self) {}
}

/// Per-iteration view of the owning loop.
///
/// Cheap to clone. The token is cancelled as soon as `stop` signals the
/// execution context; tasks that do long work should watch it.
#[derive(Clone)]
pub struct LoopContext {
    name: Arc<str>,
    iteration: u64,
    token: CancellationToken,
    heartbeat: Arc<Heartbeat>,
}

impl LoopContext {
    pub(crate) fn new(
        name: Arc<str>,
        iteration: u64,
        token: CancellationToken,
        heartbeat: Arc<Heartbeat>,
    ) -> Self {
        Self {
            name,
            iteration,
            token,
            heartbeat,
        }
    }

    /// Name of the owning loop.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 1-based iteration number within the current run.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Stop signal of the current run.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// True once `stop` has signalled this run.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reports liveness mid-iteration (same as [`SupervisedLoop::keep_alive`](crate::SupervisedLoop::keep_alive)).
    pub fn keep_alive(&self) {
        self.heartbeat.beat();
    }

    /// Time of the last recorded liveness report.
    pub fn last_iteration_at(&self) -> Instant {
        self.heartbeat.last()
    }
}
