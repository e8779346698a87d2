//! # Function-backed tasks
//!
//! [`TaskFn`] wraps a closure `F: Fn(LoopContext) -> Fut`, producing a fresh
//! future per iteration. If state must survive between iterations, capture an
//! `Arc<...>` explicitly inside the closure.
//!
//! [`NoopTask`] idles through each iteration; useful as a placeholder.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use loopvisor::{LoopContext, TaskFn, TaskRef};
//!
//! let hits = Arc::new(AtomicU64::new(0));
//! let counter = hits.clone();
//! let t: TaskRef = TaskFn::arc(move |_ctx: LoopContext| {
//!     let counter = counter.clone();
//!     async move {
//!         counter.fetch_add(1, Ordering::Relaxed);
//!     }
//! });
//! # let _ = t;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::tasks::task::{LoopContext, Task};

/// Function-backed task implementation.
///
/// Wraps a closure that *creates* a new future per iteration.
#[derive(Debug)]
pub struct TaskFn<F> {
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`](crate::TaskRef).
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Task for TaskFn<F>
where
    F: Fn(LoopContext) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn work(&self, ctx: LoopContext) {
        (self.f)(ctx).await
    }
}

/// Task that does nothing but wait.
///
/// Each iteration idles for [`NoopTask::IDLE`] or until the loop is stopped,
/// whichever comes first.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTask;

impl NoopTask {
    /// Idle time per iteration; well below the default liveness timeout.
    pub const IDLE: Duration = Duration::from_secs(30 * 60);
}

#[async_trait]
impl Task for NoopTask {
    async fn work(&self, ctx: LoopContext) {
        tokio::select! {
            _ = tokio::time::sleep(Self::IDLE) => {}
            _ = ctx.token().cancelled() => {}
        }
    }
}
