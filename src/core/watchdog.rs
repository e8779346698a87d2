//! # Watchdog: periodic timeout sweeps over the registry.
//!
//! A [`Watchdog`] wakes up every `interval`, checks every registered loop with
//! [`SupervisedLoop::is_timed_out`] and hands the stuck ones to a caller-supplied
//! [`TimeoutReaction`]. It takes no corrective action itself.
//!
//! ## Sweep
//! ```text
//! tick ─► now = tokio clock
//!       ├─► registry.for_each(snapshot) ─► collect loops with is_timed_out(now)
//!       ├─► publish TimeoutDetected per stuck loop
//!       └─► per stuck loop:
//!             reaction still pending? ─► skip
//!             queue.try_send(loop) ── full/closed ─► publish ReactionDropped
//!
//! dispatcher (one task per watchdog):
//!   queue.recv() ─► reaction(name, loop, now)
//!                     (panics caught → ReactionPanicked, next reaction runs)
//! ```
//!
//! ## Rules
//! - All timeout checks of a sweep finish before any reaction runs
//! - Reactions never delay the sweep: one dispatcher task runs them in order
//! - A loop that stays timed out is reported on every sweep; its reaction is
//!   queued again once the previous one has returned
//! - At most one reaction per loop is queued or running at any time, and the
//!   queue is bounded by [`Config::reaction_queue`](crate::Config::reaction_queue)
//! - The watchdog only ends when its token is cancelled; the dispatcher ends
//!   after the last queued reaction once the watchdog is dropped

use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::clamp_interval;
use crate::core::alive;
use crate::core::guard::panic_message;
use crate::core::registry::Registry;
use crate::core::supervised::SupervisedLoop;
use crate::events::{Bus, Event, EventKind};

/// Reaction invoked for a loop found timed out.
///
/// Implemented for closures `Fn(String, Arc<SupervisedLoop>, Instant) -> impl Future<Output = ()>`.
///
/// Reactions run one at a time, so a reaction that never returns holds up the
/// ones queued behind it. Bound anything that may block, such as stopping a loop
/// whose task ignores its token.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use std::time::{Duration, Instant};
/// use loopvisor::{SupervisedLoop, TimeoutReaction};
///
/// fn restart_on_stall() -> Arc<dyn TimeoutReaction> {
///     Arc::new(|name: String, lp: Arc<SupervisedLoop>, _now: Instant| async move {
///         eprintln!("{name} is stuck, restarting");
///         match tokio::time::timeout(Duration::from_secs(5), lp.stop()).await {
///             Ok(_) => {
///                 let _ = lp.start().await;
///             }
///             Err(_) => eprintln!("{name} ignores its stop signal"),
///         }
///     })
/// }
/// # let _ = restart_on_stall();
/// ```
#[async_trait]
pub trait TimeoutReaction: Send + Sync + 'static {
    /// Called for a timed-out loop; again on later sweeps once this call returned.
    async fn on_timeout(&self, name: &str, lp: Arc<SupervisedLoop>, now: Instant);
}

#[async_trait]
impl<F, Fut> TimeoutReaction for F
where
    F: Fn(String, Arc<SupervisedLoop>, Instant) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn on_timeout(&self, name: &str, lp: Arc<SupervisedLoop>, now: Instant) {
        self(name.to_string(), lp, now).await
    }
}

/// A timed-out loop waiting for its reaction.
struct Due {
    lp: Arc<SupervisedLoop>,
    now: Instant,
}

/// Names of loops with a reaction queued or running.
#[derive(Default)]
struct InFlight {
    names: Mutex<HashSet<String>>,
}

impl InFlight {
    /// Returns false if `name` already has a reaction pending.
    fn insert(&self, name: &str) -> bool {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string())
    }

    fn remove(&self, name: &str) {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }
}

/// Periodic scanner of a [`Registry`].
///
/// Built with [`Supervisor::watchdog`](crate::Supervisor::watchdog).
pub struct Watchdog {
    registry: Arc<Registry>,
    bus: Bus,
    interval: Duration,
    queue: mpsc::Sender<Due>,
    in_flight: Arc<InFlight>,
}

impl Watchdog {
    /// Spawns the reaction dispatcher; must be called from within a tokio runtime.
    pub(crate) fn new(
        registry: Arc<Registry>,
        bus: Bus,
        interval: Duration,
        reaction: Arc<dyn TimeoutReaction>,
        queue_capacity: usize,
    ) -> Self {
        let (queue, rx) = mpsc::channel(queue_capacity.max(1));
        let in_flight = Arc::new(InFlight::default());
        tokio::spawn(dispatch(reaction, bus.clone(), rx, Arc::clone(&in_flight)));

        Self {
            registry,
            bus,
            interval: clamp_interval(interval),
            queue,
            in_flight,
        }
    }

    /// Sweep interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sweeps every `interval` (the first sweep after one interval) until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        let mut ticker = time::interval_at(time::Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep();
                }
            }
        }
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(token))
    }

    /// Runs one sweep now. Returns the names of the timed-out loops.
    ///
    /// Reactions are queued for the dispatcher and may still be pending when
    /// this returns.
    pub fn sweep(&self) -> Vec<String> {
        let now = alive::now();
        let mut stuck: Vec<Arc<SupervisedLoop>> = Vec::new();
        self.registry.for_each(|_, lp| {
            if lp.is_timed_out(now) {
                stuck.push(Arc::clone(lp));
            }
        });

        for lp in &stuck {
            self.bus.publish(
                Event::new(EventKind::TimeoutDetected)
                    .with_loop(lp.name())
                    .with_timeout(lp.timeout())
                    .with_stalled_for(lp.stalled_for(now)),
            );
        }

        for lp in &stuck {
            self.enqueue(lp, now);
        }
        stuck.iter().map(|lp| lp.name().to_string()).collect()
    }

    fn enqueue(&self, lp: &Arc<SupervisedLoop>, now: Instant) {
        if !self.in_flight.insert(lp.name()) {
            tracing::debug!(loop_name = lp.name(), "previous timeout reaction still pending");
            return;
        }

        let due = Due {
            lp: Arc::clone(lp),
            now,
        };
        let reason = match self.queue.try_send(due) {
            Ok(()) => return,
            Err(mpsc::error::TrySendError::Full(_)) => "full",
            Err(mpsc::error::TrySendError::Closed(_)) => "closed",
        };
        self.in_flight.remove(lp.name());
        tracing::warn!(loop_name = lp.name(), reason, "timeout reaction dropped");
        self.bus.publish(
            Event::new(EventKind::ReactionDropped)
                .with_loop(lp.name())
                .with_reason(reason),
        );
    }
}

/// Runs queued reactions one after another; a panicking reaction does not stop the rest.
async fn dispatch(
    reaction: Arc<dyn TimeoutReaction>,
    bus: Bus,
    mut rx: mpsc::Receiver<Due>,
    in_flight: Arc<InFlight>,
) {
    while let Some(Due { lp, now }) = rx.recv().await {
        let fut = reaction.on_timeout(lp.name(), Arc::clone(&lp), now);
        if let Err(panic_err) = AssertUnwindSafe(fut).catch_unwind().await {
            let info = panic_message(panic_err.as_ref());
            tracing::warn!(loop_name = lp.name(), %info, "timeout reaction panicked");
            bus.publish(
                Event::new(EventKind::ReactionPanicked)
                    .with_loop(lp.name())
                    .with_reason(info),
            );
        }
        in_flight.remove(lp.name());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use tokio::sync::broadcast;

    use super::*;
    use crate::tasks::{LoopContext, TaskFn, TaskRef};
    use crate::{Config, Supervisor};

    fn blocking_task() -> TaskRef {
        TaskFn::arc(|ctx: LoopContext| async move {
            // Never returns on its own; only the stop signal releases it.
            ctx.token().cancelled().await;
        })
    }

    fn counting_reaction(hits: &Arc<AtomicU64>) -> Arc<dyn TimeoutReaction> {
        let counter = Arc::clone(hits);
        Arc::new(move |_: String, _: Arc<SupervisedLoop>, _: Instant| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    /// Reaction that records its start and then never returns.
    fn hanging_reaction(started: &Arc<AtomicU64>) -> Arc<dyn TimeoutReaction> {
        let counter = Arc::clone(started);
        Arc::new(move |_: String, _: Arc<SupervisedLoop>, _: Instant| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::pending::<()>().await;
            }
        })
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn reacts_exactly_once_per_sweep_while_stuck() {
        let sup = Supervisor::builder(Config::default()).build();
        let lp = sup
            .loop_builder("stuck", blocking_task())
            .timeout(Duration::from_millis(120))
            .build();

        let hits = Arc::new(AtomicU64::new(0));
        let token = CancellationToken::new();
        let handle = sup
            .watchdog(Duration::from_millis(50), counting_reaction(&hits))
            .spawn(token.clone());
        lp.start().await.unwrap();

        // Sweeps at 50ms and 100ms: within the timeout.
        time::sleep(Duration::from_millis(125)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // From the 150ms sweep on: one reaction per sweep.
        for sweeps in 1..=4 {
            time::sleep(Duration::from_millis(50)).await;
            assert_eq!(hits.load(Ordering::SeqCst), sweeps);
        }

        token.cancel();
        handle.await.unwrap();
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 4, "no sweeps after cancel");

        lp.stop().await.unwrap();
        assert!(sup.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_reaction_is_not_stacked() {
        let sup = Supervisor::builder(Config::default()).build();
        let mut rx = sup.bus().subscribe();
        let lp = sup
            .loop_builder("stuck", blocking_task())
            .timeout(Duration::from_millis(1))
            .build();

        let started = Arc::new(AtomicU64::new(0));
        let token = CancellationToken::new();
        let handle = sup
            .watchdog(Duration::from_millis(10), hanging_reaction(&started))
            .spawn(token.clone());
        lp.start().await.unwrap();

        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);

        let events = drain(&mut rx);
        let detected = events
            .iter()
            .filter(|ev| ev.kind == EventKind::TimeoutDetected)
            .count();
        assert!(detected >= 25, "sweeps kept running: {detected}");
        assert!(!events.iter().any(|ev| ev.kind == EventKind::ReactionDropped));

        token.cancel();
        handle.await.unwrap();
        lp.stop().await.unwrap();
    }

    #[tokio::test]
    async fn full_queue_drops_and_reports() {
        let cfg = Config {
            reaction_queue: 1,
            ..Config::default()
        };
        let sup = Supervisor::builder(cfg).build();
        let mut rx = sup.bus().subscribe();
        let mut loops = Vec::new();
        for name in ["a", "b"] {
            let lp = sup
                .loop_builder(name, blocking_task())
                .timeout(Duration::from_millis(1))
                .build();
            lp.start().await.unwrap();
            loops.push(lp);
        }
        time::sleep(Duration::from_millis(20)).await;

        let started = Arc::new(AtomicU64::new(0));
        let wd = sup.watchdog(Duration::from_millis(10), hanging_reaction(&started));

        // "a" takes the only slot, "b" does not fit.
        assert_eq!(wd.sweep(), vec!["a".to_string(), "b".to_string()]);
        let dropped: Vec<Event> = drain(&mut rx)
            .into_iter()
            .filter(|ev| ev.kind == EventKind::ReactionDropped)
            .collect();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].name.as_deref(), Some("b"));
        assert_eq!(dropped[0].reason.as_deref(), Some("full"));

        // The dispatcher picks up "a" and hangs in it; "b" can be queued now,
        // "a" is skipped while its reaction is still running.
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        wd.sweep();
        assert!(
            !drain(&mut rx)
                .iter()
                .any(|ev| ev.kind == EventKind::ReactionDropped)
        );

        for lp in loops {
            lp.stop().await.unwrap();
        }
    }

    #[tokio::test]
    async fn healthy_loops_are_not_reported() {
        let sup = Supervisor::builder(Config::default()).build();
        let task = TaskFn::arc(|_ctx: LoopContext| async {});
        let lp = sup
            .loop_builder("healthy", task)
            .interval(Duration::from_millis(10))
            .timeout(Duration::from_secs(5))
            .build();
        lp.start().await.unwrap();

        let hits = Arc::new(AtomicU64::new(0));
        let wd = sup.watchdog(Duration::from_millis(10), counting_reaction(&hits));
        assert!(wd.sweep().is_empty());
        time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        lp.stop().await.unwrap();
    }

    #[tokio::test]
    async fn panicking_reaction_does_not_block_others() {
        let sup = Supervisor::builder(Config::default()).build();
        let mut rx = sup.bus().subscribe();
        let mut loops = Vec::new();
        for name in ["a", "b"] {
            let lp = sup
                .loop_builder(name, blocking_task())
                .timeout(Duration::from_millis(1))
                .build();
            lp.start().await.unwrap();
            loops.push(lp);
        }
        time::sleep(Duration::from_millis(20)).await;

        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let store = Arc::clone(&seen);
        let wd = sup.watchdog(
            Duration::from_millis(10),
            Arc::new(move |name: String, _: Arc<SupervisedLoop>, _: Instant| {
                let store = Arc::clone(&store);
                async move {
                    store.lock().unwrap().push(name.clone());
                    if name == "a" {
                        panic!("reaction for a failed");
                    }
                }
            }),
        );

        assert_eq!(wd.sweep(), vec!["a".to_string(), "b".to_string()]);
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);

        let kinds: Vec<EventKind> = drain(&mut rx).into_iter().map(|ev| ev.kind).collect();
        assert_eq!(
            kinds
                .iter()
                .filter(|k| **k == EventKind::TimeoutDetected)
                .count(),
            2
        );
        assert!(kinds.contains(&EventKind::ReactionPanicked));

        // The panicked reaction released its slot: "a" is dispatched again.
        wd.sweep();
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.lock().unwrap().len(), 4);

        for lp in loops {
            lp.stop().await.unwrap();
        }
    }
}
