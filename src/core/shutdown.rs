//! # Termination signals.
//!
//! [`wait_for_shutdown_signal`] resolves once the process is asked to terminate.
//! [`Supervisor::wait_for_shutdown`](crate::Supervisor::wait_for_shutdown) awaits it
//! before stopping every registered loop.
//!
//! | Platform | Signals                                   |
//! |----------|-------------------------------------------|
//! | Unix     | `SIGINT`, `SIGTERM`, `SIGQUIT`, Ctrl-C    |
//! | Other    | Ctrl-C via [`tokio::signal::ctrl_c`]      |

/// Resolves on the first termination signal.
///
/// Listeners are registered per call. Fails only if registration fails.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = interrupt.recv() => {},
        _ = terminate.recv() => {},
        _ = quit.recv() => {},
    }
    Ok(())
}

/// Resolves on Ctrl-C.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
