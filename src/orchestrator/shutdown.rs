//! # OS shutdown signals.
//!
//! **Unix:** `SIGINT`, `SIGTERM` (systemd/Kubernetes), `SIGQUIT`.
//! **Elsewhere:** Ctrl-C via [`tokio::signal::ctrl_c`].

use tokio_util::sync::CancellationToken;

/// Completes on the first termination signal, or when `token` is cancelled.
///
/// Returns `Err` only if the signal listeners cannot be installed.
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown(token: &CancellationToken) -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = token.cancelled() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

/// Completes on Ctrl-C, or when `token` is cancelled.
///
/// Returns `Err` only if the Ctrl-C listener cannot be installed.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown(token: &CancellationToken) -> std::io::Result<()> {
    tokio::select! {
        _ = token.cancelled() => Ok(()),
        res = tokio::signal::ctrl_c() => res,
    }
}
