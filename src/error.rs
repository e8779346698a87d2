//! Error types used by the loopvisor runtime and tasks.
//!
//! This module defines three error enums:
//!
//! - [`LoopError`]: errors surfaced synchronously by [`SupervisedLoop::start`](crate::SupervisedLoop::start)
//!   and [`SupervisedLoop::stop`](crate::SupervisedLoop::stop).
//! - [`TaskError`]: errors raised by a task's startup hook.
//! - [`RuntimeError`]: errors raised by the [`Supervisor`](crate::Supervisor) itself.
//!
//! All types provide helper methods (`as_label`, `as_message`) for logging/metrics.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by a supervised loop's lifecycle operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LoopError {
    /// The task's `on_start` hook failed; the loop was not started and is not registered.
    #[error("loop '{name}' failed to start: {source}")]
    StartupFailure {
        /// Loop name.
        name: String,
        /// Error returned by the task.
        #[source]
        source: TaskError,
    },

    /// `start` was called on a loop that is already running.
    #[error("loop '{name}' is already running")]
    AlreadyRunning {
        /// Loop name.
        name: String,
    },

    /// Another running loop is registered under the same name.
    #[error("loop name '{name}' is already registered")]
    DuplicateName {
        /// Loop name.
        name: String,
    },

    /// The execution context terminated because an iteration panicked.
    ///
    /// Returned by `stop` once the faulted context has been reaped.
    #[error("loop '{name}' faulted: {message}")]
    IterationFault {
        /// Loop name.
        name: String,
        /// Panic message extracted from the payload.
        message: String,
    },
}

impl LoopError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use loopvisor::LoopError;
    ///
    /// let err = LoopError::AlreadyRunning { name: "poller".into() };
    /// assert_eq!(err.as_label(), "loop_already_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LoopError::StartupFailure { .. } => "loop_startup_failure",
            LoopError::AlreadyRunning { .. } => "loop_already_running",
            LoopError::DuplicateName { .. } => "loop_duplicate_name",
            LoopError::IterationFault { .. } => "loop_iteration_fault",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            LoopError::StartupFailure { name, source } => {
                format!("startup failed: loop={name} {}", source.as_message())
            }
            LoopError::AlreadyRunning { name } => format!("already running: loop={name}"),
            LoopError::DuplicateName { name } => format!("duplicate name: loop={name}"),
            LoopError::IterationFault { name, message } => {
                format!("iteration fault: loop={name} panic={message}")
            }
        }
    }

    /// Name of the loop the error belongs to.
    pub fn loop_name(&self) -> &str {
        match self {
            LoopError::StartupFailure { name, .. }
            | LoopError::AlreadyRunning { name }
            | LoopError::DuplicateName { name }
            | LoopError::IterationFault { name, .. } => name,
        }
    }
}

/// # Errors produced by task hooks.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The hook failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
        }
    }
}

/// # Errors produced by the loopvisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some loops did not stop in time.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the loops that did not stop in time.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use loopvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck loops={stuck:?}")
            }
        }
    }
}
