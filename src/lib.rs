//! # loopvisor
//!
//! **Loopvisor** supervises periodic async tasks.
//!
//! A [`SupervisedLoop`] runs one [`Task`] on a fixed interval in its own
//! execution context. Every finished iteration refreshes a liveness timestamp, so
//! a loop that blocks or silently dies can be detected with
//! [`SupervisedLoop::is_timed_out`] or a periodic [`Watchdog`]. A panic inside an
//! iteration is caught, written to a [`DiagnosticSink`] and then contained to
//! that loop (or escalated, see [`FaultPolicy`]).
//!
//! ## Architecture
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor (process-wide state)                                  │
//! │  - Registry (running loops by name)                               │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────┬──────────────────┬─────────────────────────────┬───────────┘
//!        │ loop_builder()   │ loop_builder()              │ watchdog()
//!        ▼                  ▼                             ▼
//!   ┌──────────────┐   ┌──────────────┐           ┌───────────────┐
//!   │SupervisedLoop│   │SupervisedLoop│ ◄─ sweep ─│   Watchdog    │
//!   │  (context)   │   │  (context)   │           │ (every tick)  │
//!   └──────┬───────┘   └──────┬───────┘           └──────┬────────┘
//!          │ Publishes:       │                          │ Publishes:
//!          │ - LoopStarted    │                          │ - TimeoutDetected
//!          │ - IterationFaulted                          │ - ReactionPanicked
//!          │ - LoopStopped    │                          │
//!          ▼                  ▼                          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       subscriber_listener ──► SubscriberSet ──► Subscribe::on_event
//! ```
//!
//! ### Lifecycle
//! ```text
//! start():
//!   ├─► AlreadyRunning? ─► error
//!   ├─► seed liveness timestamp
//!   ├─► registry.put(name)          ─► DuplicateName? error
//!   ├─► task.on_start()             ─► Err? roll back registration, StartupFailure
//!   └─► spawn context
//!
//! context:
//! loop {
//!   ├─► stop signalled? ─► exit
//!   ├─► task.work(ctx) inside the fault guard
//!   │       └─ panic ─► FaultReport ─► DiagnosticSink ─► IterationFaulted
//!   │                   ├─ FaultPolicy::Isolate ─► context ends, loop Faulted, deregistered
//!   │                   └─ FaultPolicy::Abort   ─► process::abort()
//!   ├─► keep_alive()
//!   └─► wait for next tick (or stop signal)
//! }
//!
//! stop():
//!   task.on_stop() ─► cancel token ─► join context ─► deregister ─► LoopStopped
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Loops**         | Run a task on an interval, start/stop synchronously.           | [`SupervisedLoop`], [`LoopBuilder`]         |
//! | **Tasks**         | Define work as a trait impl or a closure.                      | [`Task`], [`TaskFn`], [`LoopContext`]       |
//! | **Liveness**      | Timestamp per loop, timeout predicate, periodic sweeps.        | [`Watchdog`], [`TimeoutReaction`]           |
//! | **Faults**        | Panic interception with diagnostic reports.                    | [`FaultPolicy`], [`DiagnosticSink`]         |
//! | **Subscriber API**| Hook into loop lifecycle events (logging, metrics, custom).    | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for start, stop and shutdown.                     | [`LoopError`], [`TaskError`], [`RuntimeError`] |
//! | **Configuration** | Centralize runtime defaults.                                   | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] subscriber that renders events via `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use loopvisor::{Config, LoopContext, Supervisor, TaskFn, WriterSink};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn loopvisor::Subscribe>> = vec![Arc::new(loopvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn loopvisor::Subscribe>> = Vec::new();
//!
//!     let sup = Supervisor::builder(Config::default())
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let poller = TaskFn::arc(|ctx: LoopContext| async move {
//!         println!("poll #{}", ctx.iteration());
//!     });
//!     let lp = sup
//!         .loop_builder("poller", poller)
//!         .interval(Duration::from_millis(20))
//!         .timeout(Duration::from_millis(100))
//!         .diagnostics(Arc::new(WriterSink::new(std::io::stderr())))
//!         .build();
//!
//!     lp.start().await?;
//!     tokio::time::sleep(Duration::from_millis(50)).await;
//!     assert!(!lp.is_timed_out(std::time::Instant::now()));
//!     lp.stop().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod diagnostics;
mod error;
mod events;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use config::{Config, DEFAULT_TIMEOUT, FaultPolicy, MIN_INTERVAL};
pub use crate::core::{
    FaultReport, Heartbeat, LoopBuilder, LoopState, Registry, SupervisedLoop, Supervisor,
    SupervisorBuilder, TimeoutReaction, Watchdog,
};
pub use diagnostics::{DiagnosticSink, NoopSink, WriterSink};
pub use error::{LoopError, RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{LoopContext, NoopTask, Task, TaskFn, TaskRef};

// Optional: expose a simple built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
