//! # Supervisor: process-wide state for supervised loops.
//!
//! The [`Supervisor`] owns the liveness [`Registry`], the event [`Bus`] and the
//! [`SubscriberSet`]. It hands out [`LoopBuilder`]s and [`Watchdog`]s wired to
//! that state and performs process-level teardown.
//!
//! ## High-level architecture
//! ```text
//! Supervisor::builder(cfg).with_subscribers(subs).build()
//!   ├─► Bus::new(cfg.bus_capacity)
//!   ├─► SubscriberSet::new(subs)                     (one worker per subscriber)
//!   ├─► Registry::new()                              (shared by all loops)
//!   └─► subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(&Event)
//!
//! sup.loop_builder(name, task) ─► LoopBuilder ─► SupervisedLoop { registry, bus }
//! sup.watchdog(interval, reaction) ─► Watchdog { registry, bus }
//!
//! Event flow:
//!   SupervisedLoop / ExitGuard / Watchdog ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                                   ┌─────────┬─────────┐
//!                                                                   ▼         ▼         ▼
//!                                                              [queue S1] [queue S2] [queue SN]
//!
//! Shutdown path:
//!   wait_for_shutdown(): shutdown::wait_for_shutdown_signal() ─► shutdown()
//!   shutdown():
//!     ├─► Bus.publish(ShutdownRequested)
//!     ├─► runtime_token.cancel()                     (watchdogs spawned with sup.token())
//!     └─► stop every registered loop concurrently, bounded by cfg.grace:
//!     │      ├─ all stopped   → Bus.publish(AllStoppedWithin)
//!     │      └─ grace expired → Bus.publish(GraceExceeded) + RuntimeError::GraceExceeded
//!     └─► listener forwards what is left on the bus, then SubscriberSet::shutdown()
//!         drains every subscriber queue
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::{Duration, Instant};
//! use loopvisor::{Config, LoopContext, SupervisedLoop, Supervisor, TaskFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.grace = Duration::from_secs(5);
//!     let sup = Supervisor::builder(cfg).build();
//!
//!     let task = TaskFn::arc(|ctx: LoopContext| async move {
//!         println!("{} iteration {}", ctx.name(), ctx.iteration());
//!     });
//!     let lp = sup
//!         .loop_builder("ticker", task)
//!         .interval(Duration::from_millis(10))
//!         .build();
//!     lp.start().await?;
//!
//!     let watchdog = sup.watchdog(
//!         Duration::from_millis(50),
//!         Arc::new(|name: String, _lp: Arc<SupervisedLoop>, _now: Instant| async move {
//!             eprintln!("{name} is stuck");
//!         }),
//!     );
//!     let handle = watchdog.spawn(sup.token());
//!
//!     tokio::time::sleep(Duration::from_millis(30)).await;
//!     sup.shutdown().await?;
//!     handle.await?;
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::builder::SupervisorBuilder;
use crate::core::registry::Registry;
use crate::core::shutdown;
use crate::core::supervised::LoopBuilder;
use crate::core::watchdog::{TimeoutReaction, Watchdog};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::SubscriberSet;
use crate::tasks::TaskRef;

/// Owns the registry, event delivery and teardown of supervised loops.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    registry: Arc<Registry>,
    runtime_token: CancellationToken,
    listener_stop: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    /// Returns a builder for a supervisor with the given configuration.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        registry: Arc<Registry>,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            registry,
            runtime_token,
            listener_stop: CancellationToken::new(),
            listener: Mutex::new(None),
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Registry of running loops.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Event bus shared by all loops and watchdogs.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Number of event subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subs.len()
    }

    /// Child of the runtime token; cancelled by [`shutdown`](Self::shutdown).
    ///
    /// Pass it to [`Watchdog::spawn`] so watchdogs end with the supervisor.
    pub fn token(&self) -> CancellationToken {
        self.runtime_token.child_token()
    }

    /// Starts building a loop bound to this supervisor's registry and bus.
    ///
    /// Interval, timeout and fault policy default to the values in [`Config`].
    pub fn loop_builder(&self, name: impl Into<Arc<str>>, task: TaskRef) -> LoopBuilder {
        LoopBuilder::new(
            name,
            task,
            Arc::clone(&self.registry),
            self.bus.clone(),
            &self.cfg,
        )
    }

    /// Creates a watchdog sweeping this supervisor's registry every `interval`.
    pub fn watchdog(&self, interval: Duration, reaction: Arc<dyn TimeoutReaction>) -> Watchdog {
        Watchdog::new(
            Arc::clone(&self.registry),
            self.bus.clone(),
            interval,
            reaction,
            self.cfg.reaction_queue_clamped(),
        )
    }

    /// Waits for a termination signal, then runs [`shutdown`](Self::shutdown).
    ///
    /// If signal registration fails the shutdown runs immediately.
    pub async fn wait_for_shutdown(&self) -> Result<(), RuntimeError> {
        if let Err(err) = shutdown::wait_for_shutdown_signal().await {
            tracing::warn!(%err, "failed to listen for shutdown signals");
        }
        self.shutdown().await
    }

    /// Stops every registered loop, bounded by [`Config::grace`].
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] on timeout and returns
    /// [`RuntimeError::GraceExceeded`] with the names of the loops still registered.
    ///
    /// Subscribers receive every event published up to and including that
    /// final one before this returns; they are closed afterwards.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();

        let grace = self.cfg.grace;
        let loops = self.registry.snapshot();
        let stops = join_all(loops.iter().map(|lp| async move {
            if let Err(err) = lp.stop().await {
                tracing::warn!(loop_name = lp.name(), err = %err.as_message(), "loop stopped with error");
            }
        }));

        let res = match tokio::time::timeout(grace, stops).await {
            Ok(_) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck = self.registry.names();
                self.bus
                    .publish(Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")));
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        };
        self.drain_subscribers().await;
        res
    }

    /// Stops the listener once it has forwarded everything on the bus, then
    /// waits for every subscriber queue to empty.
    async fn drain_subscribers(&self) {
        self.listener_stop.cancel();
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = listener {
            let _ = handle.await;
        }
        self.subs.shutdown().await;
    }

    /// Subscribes to the bus and forwards events to the subscriber set (fire-and-forget).
    pub(crate) fn subscriber_listener(&self) {
        if self.subs.is_empty() {
            return;
        }
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        let stop = self.listener_stop.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    res = rx.recv() => match res {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = stop.cancelled() => {
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => set.emit(&ev),
                                Err(TryRecvError::Lagged(skipped)) => {
                                    tracing::warn!(skipped, "subscriber listener lagged behind the bus");
                                }
                                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                            }
                        }
                        break;
                    }
                }
            }
        });
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }
}
