//! # Example: periodic
//!
//! A task printing once per second, started and stopped around a fixed pause.
//!
//! Shows how to:
//! - Implement [`Task`] with startup and stop hooks.
//! - Build a loop with [`Supervisor::loop_builder`].
//! - Render lifecycle events through the built-in [`LogWriter`].
//!
//! ## Flow
//! ```text
//! start() ─► on_start() ─► work() now, then every 1s ─► stop() ─► on_stop() ─► join
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example periodic --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loopvisor::{Config, LogWriter, LoopContext, Supervisor, Task, TaskError, WriterSink};
use tracing_subscriber::EnvFilter;

struct Demo;

#[async_trait]
impl Task for Demo {
    async fn on_start(&self) -> Result<(), TaskError> {
        println!("demo starting");
        Ok(())
    }

    async fn work(&self, ctx: LoopContext) {
        println!("in work: iteration {}", ctx.iteration());
    }

    async fn on_stop(&self) {
        println!("demo stopping");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let sup = Supervisor::builder(Config::default())
        .with_subscribers(vec![Arc::new(LogWriter::new())])
        .build();

    let demo = sup
        .loop_builder("demo", Arc::new(Demo))
        .interval(Duration::from_secs(1))
        .diagnostics(Arc::new(WriterSink::new(std::io::stderr())))
        .build();

    if let Err(err) = demo.start().await {
        eprintln!("start failed: {}", err.as_message());
        std::process::exit(1);
    }

    tokio::time::sleep(Duration::from_secs(10)).await;

    demo.stop().await?;
    Ok(())
}
