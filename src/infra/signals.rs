//! Process signal handling for the serve command.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::reload::Reloader;

/// Resolve once ctrl-c or SIGTERM arrives.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "vellum::signals", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(target = "vellum::signals", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    info!(target = "vellum::signals", "shutdown signal received, stopping servers");
}

/// Run a reload each time the process receives SIGHUP.
#[cfg(unix)]
pub fn spawn_reload_on_hangup(reloader: Arc<Reloader>) -> JoinHandle<()> {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut hangups = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(err) => {
                warn!(target = "vellum::signals", error = %err, "SIGHUP reload disabled");
                return;
            }
        };

        while hangups.recv().await.is_some() {
            info!(target = "vellum::signals", "SIGHUP received, reloading");
            if let Err(err) = reloader.reload().await {
                error!(target = "vellum::signals", error = %err, "reload aborted");
            }
        }
    })
}

#[cfg(not(unix))]
pub fn spawn_reload_on_hangup(_reloader: Arc<Reloader>) -> JoinHandle<()> {
    tokio::spawn(async {})
}
