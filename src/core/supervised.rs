//! # SupervisedLoop: one task, repeated on an interval.
//!
//! A [`SupervisedLoop`] owns a [`Task`](crate::Task) and runs it on its own
//! tokio task (the *execution context*) until stopped. After every iteration the
//! loop records a liveness timestamp that watchdogs read through
//! [`SupervisedLoop::is_timed_out`].
//!
//! ## Lifecycle
//! ```text
//!            start()                         stop()
//!  Idle ───────────────► Running ─────────────────────────► Stopped ──► start() ...
//!   │  seed heartbeat       │   on_stop → cancel → join → deregister
//!   │  reserve name         │
//!   │  on_start             │ iteration panicked (FaultPolicy::Isolate)
//!   │  spawn context        ▼
//!   │                    Faulted ── stop() ──► Stopped (returns IterationFault)
//!   └─ on_start error / duplicate name: stays Idle, not registered
//! ```
//!
//! ## Iteration cycle
//! ```text
//! loop {
//!   ├─► select! (biased) { token.cancelled() => exit, interval.tick() => {} }
//!   ├─► isolate(task.work(ctx))      (first tick fires immediately)
//!   └─► keep_alive()
//! }
//! ```
//!
//! ## Rules
//! - At most one execution context per loop (start/stop are serialized by one async mutex)
//! - `stop` returns only after the context has exited; no iteration runs after that
//! - An iteration in progress is never cancelled forcibly; it sees the token
//! - `keep_alive` / `is_timed_out` are lock-free and may be called from anywhere
//! - A loop must not `stop` itself from inside `work` (the join would wait on itself)

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{FaultPolicy, clamp_interval, resolve_timeout};
use crate::core::alive::Heartbeat;
use crate::core::guard::{ExitGuard, FaultScope, isolate, panic_message};
use crate::core::registry::Registry;
use crate::diagnostics::DiagnosticSink;
use crate::error::LoopError;
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{LoopContext, TaskRef};

/// Observable state of a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Never started.
    Idle,
    /// Execution context is alive.
    Running,
    /// Stopped by `stop`; may be started again.
    Stopped,
    /// Execution context died on a panicking iteration; waiting for `stop`.
    Faulted,
}

impl LoopState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => LoopState::Running,
            2 => LoopState::Stopped,
            3 => LoopState::Faulted,
            _ => LoopState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LoopState::Idle => 0,
            LoopState::Running => 1,
            LoopState::Stopped => 2,
            LoopState::Faulted => 3,
        }
    }
}

/// Handles of the current run.
struct Run {
    token: CancellationToken,
    join: JoinHandle<u64>,
    /// Set once `stop` got past the hooks; a resumed `stop` only joins.
    stopping: bool,
}

/// A task supervised on a fixed interval.
///
/// Built with [`Supervisor::loop_builder`](crate::Supervisor::loop_builder); shared as `Arc`.
pub struct SupervisedLoop {
    name: Arc<str>,
    task: TaskRef,
    interval: Duration,
    timeout: Duration,
    fault: FaultPolicy,
    sink: Option<Arc<dyn DiagnosticSink>>,

    heartbeat: Arc<Heartbeat>,
    state: AtomicU8,
    run: Mutex<Option<Run>>,

    registry: Arc<Registry>,
    bus: Bus,
}

impl SupervisedLoop {
    /// Loop name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time between iteration starts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Maximum tolerated gap since the last iteration.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fault policy applied to panicking iterations.
    pub fn fault_policy(&self) -> FaultPolicy {
        self.fault
    }

    /// Current state.
    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True between a successful `start` and the matching `stop`
    /// (including a faulted context that was not reaped yet).
    pub fn is_running(&self) -> bool {
        matches!(self.state(), LoopState::Running | LoopState::Faulted)
    }

    /// Starts the loop.
    ///
    /// Seeds the liveness timestamp, reserves the name in the registry, runs
    /// `on_start` and spawns the execution context. Returns without waiting for
    /// any iteration.
    ///
    /// ### Errors
    /// - [`LoopError::AlreadyRunning`]: called again without `stop`
    /// - [`LoopError::DuplicateName`]: another loop holds the name
    /// - [`LoopError::StartupFailure`]: `on_start` failed
    ///
    /// On error the loop is neither running nor registered.
    pub async fn start(self: &Arc<Self>) -> Result<(), LoopError> {
        let mut run = self.run.lock().await;
        if run.is_some() {
            return Err(LoopError::AlreadyRunning {
                name: self.name.to_string(),
            });
        }

        self.keep_alive();
        let reservation = match self.registry.reserve(&self.name, self) {
            Ok(r) => r,
            Err(e) => return Err(self.start_failed(e)),
        };
        if let Err(source) = self.task.on_start().await {
            drop(reservation);
            return Err(self.start_failed(LoopError::StartupFailure {
                name: self.name.to_string(),
                source,
            }));
        }
        reservation.commit();

        let token = CancellationToken::new();
        self.set_state(LoopState::Running);
        let join = tokio::spawn(Arc::clone(self).run_iterations(token.clone()));
        *run = Some(Run {
            token,
            join,
            stopping: false,
        });

        self.bus.publish(
            Event::new(EventKind::LoopStarted)
                .with_loop(Arc::clone(&self.name))
                .with_interval(self.interval)
                .with_timeout(self.timeout),
        );
        Ok(())
    }

    /// Stops the loop and waits until its execution context has exited.
    ///
    /// Calls `on_stop`, signals the context, joins it, then removes the loop from
    /// the registry. A no-op returning `Ok(())` if the loop is not running.
    ///
    /// Cancel-safe: if the returned future is dropped before the context has
    /// exited (e.g. by `tokio::time::timeout`), the stop signal stays raised and
    /// the next call only waits for the join; `on_stop` is not called again.
    ///
    /// ### Errors
    /// [`LoopError::IterationFault`] if the context had died on a panicking
    /// iteration. The loop is fully stopped and deregistered in that case too.
    pub async fn stop(&self) -> Result<(), LoopError> {
        let mut run = self.run.lock().await;
        let Some(current) = run.as_mut() else {
            return Ok(());
        };

        if !current.stopping {
            current.stopping = true;
            self.task.on_stop().await;
            self.bus
                .publish(Event::new(EventKind::StopRequested).with_loop(Arc::clone(&self.name)));
        }

        current.token.cancel();
        let joined = (&mut current.join).await;
        *run = None;

        self.set_state(LoopState::Stopped);
        self.registry.remove_if(&self.name, self);

        match joined {
            Ok(iterations) => {
                self.bus.publish(
                    Event::new(EventKind::LoopStopped)
                        .with_loop(Arc::clone(&self.name))
                        .with_iteration(iterations),
                );
                Ok(())
            }
            Err(join_err) if join_err.is_panic() => {
                let message = panic_message(join_err.into_panic().as_ref());
                self.bus.publish(
                    Event::new(EventKind::LoopStopped)
                        .with_loop(Arc::clone(&self.name))
                        .with_reason(message.as_str()),
                );
                Err(LoopError::IterationFault {
                    name: self.name.to_string(),
                    message,
                })
            }
            // Runtime shutting down; the context is gone either way.
            Err(_cancelled) => {
                self.bus
                    .publish(Event::new(EventKind::LoopStopped).with_loop(Arc::clone(&self.name)));
                Ok(())
            }
        }
    }

    /// Records liveness now.
    pub fn keep_alive(&self) {
        self.heartbeat.beat();
    }

    /// Time of the last recorded liveness.
    pub fn last_iteration_at(&self) -> Instant {
        self.heartbeat.last()
    }

    /// True iff more than `timeout` has passed between the last liveness record and `now`.
    pub fn is_timed_out(&self, now: Instant) -> bool {
        self.heartbeat.stalled_for(now) > self.timeout
    }

    /// Time elapsed between the last liveness record and `now`.
    pub fn stalled_for(&self, now: Instant) -> Duration {
        self.heartbeat.stalled_for(now)
    }

    /// Body of the execution context. Returns the number of iterations started.
    async fn run_iterations(self: Arc<Self>, token: CancellationToken) -> u64 {
        let guard = ExitGuard::arm(&self);

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut iteration: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            iteration += 1;
            let ctx = LoopContext::new(
                Arc::clone(&self.name),
                iteration,
                token.clone(),
                Arc::clone(&self.heartbeat),
            );
            let scope = FaultScope {
                name: &self.name,
                iteration,
                policy: self.fault,
                sink: self.sink.as_deref(),
                bus: &self.bus,
            };
            isolate(scope, self.task.work(ctx)).await;
            self.keep_alive();
        }

        guard.disarm();
        iteration
    }

    /// Exit-guard hook: the context is unwinding out of a faulted iteration.
    pub(crate) fn mark_faulted(&self) {
        self.set_state(LoopState::Faulted);
        self.registry.remove_if(&self.name, self);
    }

    fn set_state(&self, state: LoopState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn start_failed(&self, err: LoopError) -> LoopError {
        self.bus.publish(
            Event::new(EventKind::LoopStartFailed)
                .with_loop(Arc::clone(&self.name))
                .with_reason(err.as_label()),
        );
        err
    }
}

impl std::fmt::Debug for SupervisedLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisedLoop")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Builder for [`SupervisedLoop`].
///
/// Obtained from [`Supervisor::loop_builder`](crate::Supervisor::loop_builder), which
/// pre-fills interval, timeout and fault policy from the supervisor's [`Config`](crate::Config).
pub struct LoopBuilder {
    name: Arc<str>,
    task: TaskRef,
    interval: Duration,
    timeout: Duration,
    fault: FaultPolicy,
    sink: Option<Arc<dyn DiagnosticSink>>,
    registry: Arc<Registry>,
    bus: Bus,
}

impl LoopBuilder {
    pub(crate) fn new(
        name: impl Into<Arc<str>>,
        task: TaskRef,
        registry: Arc<Registry>,
        bus: Bus,
        cfg: &crate::config::Config,
    ) -> Self {
        Self {
            name: name.into(),
            task,
            interval: cfg.default_interval(),
            timeout: cfg.default_timeout(),
            fault: cfg.fault,
            sink: None,
            registry,
            bus,
        }
    }

    /// Sets the time between iteration starts (clamped to 1ms).
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = clamp_interval(interval);
        self
    }

    /// Sets the liveness timeout (`0s` = one hour).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = resolve_timeout(timeout);
        self
    }

    /// Sets the fault policy.
    pub fn fault_policy(mut self, fault: FaultPolicy) -> Self {
        self.fault = fault;
        self
    }

    /// Sets the sink receiving fault reports.
    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builds the loop (not started). The liveness timestamp is seeded here.
    pub fn build(self) -> Arc<SupervisedLoop> {
        Arc::new(SupervisedLoop {
            name: self.name,
            task: self.task,
            interval: self.interval,
            timeout: self.timeout,
            fault: self.fault,
            sink: self.sink,
            heartbeat: Arc::new(Heartbeat::new()),
            state: AtomicU8::new(LoopState::Idle.as_u8()),
            run: Mutex::new(None),
            registry: self.registry,
            bus: self.bus,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicU64;

    use async_trait::async_trait;

    use super::*;
    use crate::error::TaskError;
    use crate::tasks::{Task, TaskFn};
    use crate::{Config, Supervisor};

    fn counting() -> (Arc<AtomicU64>, TaskRef) {
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        let task: TaskRef = TaskFn::arc(move |_ctx: LoopContext| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (hits, task)
    }

    async fn explode(msg: &'static str) {
        panic!("{msg}")
    }

    struct FailingStart;

    #[async_trait]
    impl Task for FailingStart {
        async fn on_start(&self) -> Result<(), TaskError> {
            Err(TaskError::fail("no backend"))
        }

        async fn work(&self, _ctx: LoopContext) {}
    }

    #[derive(Default)]
    struct Hooks {
        calls: StdMutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl Task for Hooks {
        async fn on_start(&self) -> Result<(), TaskError> {
            self.calls.lock().unwrap().push("start");
            Ok(())
        }

        async fn work(&self, _ctx: LoopContext) {}

        async fn on_stop(&self) {
            self.calls.lock().unwrap().push("stop");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn start_then_stop_clears_registry() {
        let sup = Supervisor::builder(Config::default()).build();
        let (hits, task) = counting();
        let lp = sup
            .loop_builder("ticker", task)
            .interval(Duration::from_millis(10))
            .build();

        lp.start().await.unwrap();
        assert!(lp.is_running());
        assert!(sup.registry().contains("ticker"));

        lp.stop().await.unwrap();
        assert_eq!(lp.state(), LoopState::Stopped);
        assert!(!sup.registry().contains("ticker"));

        let after_stop = hits.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(hits.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn duplicate_name_leaves_first_loop_alone() {
        let sup = Supervisor::builder(Config::default()).build();
        let (first_hits, first_task) = counting();
        let (_, second_task) = counting();
        let first = sup
            .loop_builder("dup", first_task)
            .interval(Duration::from_millis(10))
            .build();
        let second = sup.loop_builder("dup", second_task).build();

        first.start().await.unwrap();
        let err = second.start().await.unwrap_err();
        assert!(matches!(err, LoopError::DuplicateName { .. }));
        assert!(!second.is_running());
        assert_eq!(second.state(), LoopState::Idle);

        assert!(first.is_running());
        let entry = sup.registry().get("dup").unwrap();
        assert!(Arc::ptr_eq(&entry, &first));

        let before = first_hits.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(40)).await;
        assert!(first_hits.load(Ordering::SeqCst) > before);

        // Stopping the loser must not evict the winner.
        second.stop().await.unwrap();
        assert!(sup.registry().contains("dup"));
        first.stop().await.unwrap();
        assert!(sup.registry().is_empty());
    }

    #[tokio::test]
    async fn second_start_is_rejected_without_second_context() {
        let sup = Supervisor::builder(Config::default()).build();
        let (hits, task) = counting();
        let lp = sup
            .loop_builder("once", task)
            .interval(Duration::from_secs(3600))
            .build();

        lp.start().await.unwrap();
        let err = lp.start().await.unwrap_err();
        assert!(matches!(err, LoopError::AlreadyRunning { .. }));

        time::sleep(Duration::from_millis(50)).await;
        lp.stop().await.unwrap();
        // Only the immediate first iteration of the single context ran.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_iteration_does_not_wait_for_interval() {
        let sup = Supervisor::builder(Config::default()).build();
        let (hits, task) = counting();
        let lp = sup
            .loop_builder("eager", task)
            .interval(Duration::from_secs(1))
            .build();

        lp.start().await.unwrap();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        lp.stop().await.unwrap();
    }

    #[tokio::test]
    async fn fresh_loop_is_not_timed_out() {
        let sup = Supervisor::builder(Config::default()).build();
        let task = TaskFn::arc(|ctx: LoopContext| async move {
            ctx.token().cancelled().await;
        });
        let lp = sup
            .loop_builder("slow", task)
            .timeout(Duration::from_millis(20))
            .build();

        time::sleep(Duration::from_millis(60)).await;
        lp.start().await.unwrap();
        assert!(!lp.is_timed_out(Instant::now()));
        assert!(lp.is_timed_out(Instant::now() + Duration::from_millis(100)));
        lp.stop().await.unwrap();
    }

    #[tokio::test]
    async fn startup_failure_leaves_loop_unregistered() {
        let sup = Supervisor::builder(Config::default()).build();
        let lp = sup.loop_builder("broken", Arc::new(FailingStart)).build();

        let err = lp.start().await.unwrap_err();
        assert!(matches!(err, LoopError::StartupFailure { .. }));
        assert!(!lp.is_running());
        assert!(!sup.registry().contains("broken"));
        // Stop on a loop that never started is a no-op.
        lp.stop().await.unwrap();
    }

    #[tokio::test]
    async fn hooks_run_once_per_run_and_restart_works() {
        let sup = Supervisor::builder(Config::default()).build();
        let hooks = Arc::new(Hooks::default());
        let lp = sup
            .loop_builder("hooks", hooks.clone())
            .interval(Duration::from_millis(5))
            .build();

        lp.start().await.unwrap();
        lp.stop().await.unwrap();
        lp.stop().await.unwrap();
        lp.start().await.unwrap();
        assert!(sup.registry().contains("hooks"));
        lp.stop().await.unwrap();

        let calls = hooks.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["start", "stop", "start", "stop"]);
    }

    #[tokio::test]
    async fn stop_waits_for_in_flight_iteration() {
        let sup = Supervisor::builder(Config::default()).build();
        let finished = Arc::new(AtomicU64::new(0));
        let done = Arc::clone(&finished);
        let task = TaskFn::arc(move |_ctx: LoopContext| {
            let done = Arc::clone(&done);
            async move {
                time::sleep(Duration::from_millis(80)).await;
                done.fetch_add(1, Ordering::SeqCst);
            }
        });
        let lp = sup.loop_builder("busy", task).build();

        lp.start().await.unwrap();
        time::sleep(Duration::from_millis(10)).await;
        lp.stop().await.unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn keep_alive_from_task_moves_timestamp() {
        let sup = Supervisor::builder(Config::default()).build();
        let task = TaskFn::arc(|ctx: LoopContext| async move {
            loop {
                ctx.keep_alive();
                tokio::select! {
                    _ = time::sleep(Duration::from_millis(5)) => {}
                    _ = ctx.token().cancelled() => return,
                }
            }
        });
        let lp = sup.loop_builder("long", task).build();

        lp.start().await.unwrap();
        let seeded = lp.last_iteration_at();
        time::sleep(Duration::from_millis(40)).await;
        assert!(lp.last_iteration_at() > seeded);
        lp.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn counts_iterations_over_interval() {
        let sup = Supervisor::builder(Config::default()).build();
        let (hits, task) = counting();
        let lp = sup
            .loop_builder("scenario", task)
            .interval(Duration::from_millis(100))
            .timeout(Duration::from_millis(250))
            .build();

        lp.start().await.unwrap();
        time::sleep(Duration::from_millis(550)).await;
        lp.stop().await.unwrap();

        let count = hits.load(Ordering::SeqCst);
        assert!((4..=6).contains(&count), "iterations: {count}");
        assert!(sup.registry().is_empty());

        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(hits.load(Ordering::SeqCst), count);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fault_is_reported_once_and_surfaces_on_stop() {
        let sup = Supervisor::builder(Config::default()).build();
        let reports = Arc::new(StdMutex::new(Vec::<String>::new()));
        let store = Arc::clone(&reports);
        let sink: Arc<dyn DiagnosticSink> =
            Arc::new(move |r: &str| store.lock().unwrap().push(r.to_owned()));

        let task = TaskFn::arc(|ctx: LoopContext| async move {
            if ctx.iteration() == 2 {
                panic!("bad iteration");
            }
        });
        let lp = sup
            .loop_builder("crashy", task)
            .interval(Duration::from_millis(10))
            .diagnostics(sink)
            .build();

        lp.start().await.unwrap();
        time::sleep(Duration::from_millis(100)).await;

        assert_eq!(lp.state(), LoopState::Faulted);
        assert!(lp.is_running());
        assert!(!sup.registry().contains("crashy"));
        assert!(matches!(lp.start().await, Err(LoopError::AlreadyRunning { .. })));

        let err = lp.stop().await.unwrap_err();
        match err {
            LoopError::IterationFault { name, message } => {
                assert_eq!(name, "crashy");
                assert_eq!(message, "bad iteration");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(lp.state(), LoopState::Stopped);

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("name=crashy"));
    }

    #[tokio::test]
    async fn fault_without_sink_still_propagates() {
        let sup = Supervisor::builder(Config::default()).build();
        let task = TaskFn::arc(|_ctx: LoopContext| explode("unobserved"));
        let lp = sup
            .loop_builder("silent", task)
            .diagnostics(Arc::new(crate::diagnostics::NoopSink))
            .build();

        lp.start().await.unwrap();
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(lp.state(), LoopState::Faulted);

        let err = lp.stop().await.unwrap_err();
        assert_eq!(err.as_label(), "loop_iteration_fault");
    }

    #[tokio::test]
    async fn stop_resumed_after_timeout_runs_on_stop_once() {
        let sup = Supervisor::builder(Config::default()).build();
        let stops = Arc::new(AtomicU64::new(0));
        let entered = Arc::new(tokio::sync::Notify::new());

        struct Deaf {
            stops: Arc<AtomicU64>,
            entered: Arc<tokio::sync::Notify>,
        }

        #[async_trait]
        impl Task for Deaf {
            async fn work(&self, _ctx: LoopContext) {
                self.entered.notify_one();
                // Ignores the stop signal.
                time::sleep(Duration::from_millis(200)).await;
            }

            async fn on_stop(&self) {
                self.stops.fetch_add(1, Ordering::SeqCst);
            }
        }

        let lp = sup
            .loop_builder(
                "deaf",
                Arc::new(Deaf {
                    stops: Arc::clone(&stops),
                    entered: Arc::clone(&entered),
                }),
            )
            .build();
        lp.start().await.unwrap();
        entered.notified().await;

        let first = time::timeout(Duration::from_millis(20), lp.stop()).await;
        assert!(first.is_err(), "iteration outlives the first wait");
        assert!(lp.is_running());
        assert!(sup.registry().contains("deaf"));

        lp.stop().await.unwrap();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(lp.state(), LoopState::Stopped);
        assert!(!sup.registry().contains("deaf"));

        // A fresh run gets its own stop hook call.
        lp.start().await.unwrap();
        entered.notified().await;
        lp.stop().await.unwrap();
        assert_eq!(stops.load(Ordering::SeqCst), 2);
    }
}
