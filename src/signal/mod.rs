// Shutdown signal handling
//
// - SIGTERM: graceful shutdown
// - SIGINT:  graceful shutdown (Ctrl+C)
//
// The server stops accepting connections and drains in-flight requests for
// at most the configured grace period, then `main` sweeps the artifact root.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

/// Handle to the process-wide shutdown request
#[derive(Clone)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Install the OS signal listeners. Call once, inside the runtime.
    pub fn register() -> Self {
        let signal = Self::detached();
        let trigger = signal.clone();

        tokio::spawn(async move {
            let name = wait_for_os_signal().await;
            info!("{} received, initiating graceful shutdown", name);
            trigger.trigger();
        });

        info!("Signal handlers registered (pid {})", std::process::id());
        signal
    }

    /// A handle with no OS listener attached; only `trigger` fires it
    fn detached() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Wakes every pending and future `recv`
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Resolves once shutdown was requested
    pub async fn recv(mut self) {
        // the sender lives in `self`, so the channel cannot close here
        let _ = self.rx.wait_for(|requested| *requested).await;
    }
}

/// Run `serve` to completion, but give up `grace` after shutdown was
/// requested. Returns `None` when the deadline cut the drain short.
pub async fn with_drain_deadline<F>(
    serve: F,
    signal: ShutdownSignal,
    grace: Duration,
) -> Option<F::Output>
where
    F: Future,
{
    let deadline = async move {
        signal.recv().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        output = serve => Some(output),
        _ = deadline => None,
    }
}

#[cfg(unix)]
async fn wait_for_os_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            None
        }
    };

    let terminate = async {
        match sigterm.as_mut() {
            Some(s) => {
                s.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = terminate => "SIGTERM",
        _ = ctrl_c() => "SIGINT",
    }
}

#[cfg(not(unix))]
async fn wait_for_os_signal() -> &'static str {
    ctrl_c().await;
    "Ctrl+C"
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await
    }
}
