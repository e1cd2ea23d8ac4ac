// src/engine/signals.rs

//! Termination handler.
//!
//! External termination (Ctrl-C, SIGTERM, ...) goes through the same
//! shutdown path as a failed pipeline, minus the error.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::registry::WatcherRegistry;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Listen for OS termination signals and shut `registry` down on the first one.
///
/// Only the first call per process installs a listener; later calls return
/// `false` and do nothing.
pub fn install_termination_handler(registry: Arc<WatcherRegistry>) -> bool {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        warn!("termination handler already installed; ignoring");
        return false;
    }

    spawn_termination_listener(registry, wait_for_shutdown_signal());
    true
}

/// Shut `registry` down (without an error) once `signal` completes.
///
/// If `signal` fails, no shutdown is triggered.
pub fn spawn_termination_listener<F>(registry: Arc<WatcherRegistry>, signal: F) -> JoinHandle<()>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = signal.await {
            warn!(error = %e, "failed to listen for termination signals");
            return;
        }

        info!("termination requested");
        // Without an error attached, shutdown cannot fail.
        let _ = registry.shutdown(None).await;
    })
}

/// Completes when the process receives SIGINT, SIGTERM, SIGQUIT or SIGHUP.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
        _ = sighup.recv() => {},
    }
    Ok(())
}

/// Completes on Ctrl-C.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
