//! # Example: watchdog
//!
//! One healthy loop and one loop that hangs on its third iteration. A watchdog
//! sweeps the registry and restarts whatever it finds stuck; Ctrl-C shuts down.
//!
//! Shows how to:
//! - Write a [`TimeoutReaction`] as a closure.
//! - Observe [`Event`]s with a custom [`Subscribe`] implementation.
//! - Tie a watchdog to the supervisor lifetime with [`Supervisor::token`].
//!
//! ## Flow
//! ```text
//! healthy ─► work() every 200ms ─► keep_alive
//! flaky   ─► work() ... iteration 3 blocks until stop
//! watchdog (every 500ms):
//!     flaky timed out (> 1s) ─► reaction: stop() ─► start()
//! Ctrl-C ─► Supervisor::wait_for_shutdown ─► stop all within grace
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example watchdog
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use loopvisor::{
    Config, Event, EventKind, LoopContext, SupervisedLoop, Subscribe, Supervisor, TaskFn,
    TimeoutReaction,
};

/// Prints the events worth seeing in this demo.
struct Console;

#[async_trait::async_trait]
impl Subscribe for Console {
    async fn on_event(&self, ev: &Event) {
        let name = ev.name.as_deref().unwrap_or("<none>");
        match ev.kind {
            EventKind::LoopStarted => println!("[sub] started:  loop={name}"),
            EventKind::LoopStopped => println!(
                "[sub] stopped:  loop={name} iterations={}",
                ev.iteration.unwrap_or(0)
            ),
            EventKind::TimeoutDetected => println!(
                "[sub] stuck:    loop={name} stalled={}ms timeout={}ms",
                ev.stalled_ms.unwrap_or(0),
                ev.timeout_ms.unwrap_or(0)
            ),
            EventKind::GraceExceeded => println!("[sub] grace exceeded"),
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config {
        timeout: Duration::from_secs(1),
        grace: Duration::from_secs(3),
        ..Config::default()
    };
    let sup = Supervisor::builder(cfg)
        .with_subscribers(vec![Arc::new(Console)])
        .build();

    let healthy = sup
        .loop_builder(
            "healthy",
            TaskFn::arc(|ctx: LoopContext| async move {
                println!("healthy: tick {}", ctx.iteration());
            }),
        )
        .interval(Duration::from_millis(200))
        .build();

    let flaky = sup
        .loop_builder(
            "flaky",
            TaskFn::arc(|ctx: LoopContext| async move {
                if ctx.iteration() == 3 {
                    println!("flaky: hanging");
                    ctx.token().cancelled().await;
                }
            }),
        )
        .interval(Duration::from_millis(200))
        .build();

    healthy.start().await?;
    flaky.start().await?;

    let restart: Arc<dyn TimeoutReaction> =
        Arc::new(|name: String, lp: Arc<SupervisedLoop>, _now: Instant| async move {
            println!("watchdog: restarting {name}");
            match tokio::time::timeout(Duration::from_secs(5), lp.stop()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => eprintln!("watchdog: stop failed: {}", err.as_message()),
                Err(_) => {
                    eprintln!("watchdog: {name} did not stop in time");
                    return;
                }
            }
            if let Err(err) = lp.start().await {
                eprintln!("watchdog: restart failed: {}", err.as_message());
            }
        });
    let watchdog = sup
        .watchdog(Duration::from_millis(500), restart)
        .spawn(sup.token());

    println!("press Ctrl-C to stop");
    sup.wait_for_shutdown().await?;
    watchdog.await?;
    Ok(())
}
