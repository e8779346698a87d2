//! # Task abstractions.
//!
//! This module provides the task-related types:
//! - [`Task`] - trait for the unit of work a loop repeats
//! - [`LoopContext`] - per-iteration view of the owning loop
//! - [`TaskFn`] - function-backed task implementation
//! - [`NoopTask`] - idle placeholder task
//! - [`TaskRef`] - shared reference to a task (`Arc<dyn Task>`)

mod task;
mod task_fn;

pub use task::{LoopContext, Task, TaskRef};
pub use task_fn::{NoopTask, TaskFn};
