// OS signal handling for graceful shutdown.

use tokio::sync::watch;
use tracing::{info, warn};

/// Flips `shutdown` to true on SIGINT/SIGTERM (Ctrl+C elsewhere).
pub fn spawn_signal_listener(shutdown: watch::Sender<bool>) {
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.send_replace(true);
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "failed to install signal handlers; falling back to ctrl_c");
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received - initiating graceful shutdown");
            }
            return;
        }
    };

    tokio::select! {
        _ = sigint.recv() => info!("SIGINT received - initiating graceful shutdown"),
        _ = sigterm.recv() => info!("SIGTERM received - initiating graceful shutdown"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("ctrl-c received - initiating graceful shutdown"),
        Err(e) => {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}

/// Resolves once the shutdown flag is set (or its sender is gone).
pub async fn wait_for_shutdown(mut shutdown_rx: watch::Receiver<bool>) {
    // An error means the sender dropped, which also ends the process.
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}
