use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Turns SIGINT / SIGTERM into the load's stop flag, so in-flight calls are
/// drained before the process exits.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    stop: CancellationToken,
    interrupted: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new(stop: CancellationToken) -> Self {
        Self {
            stop,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn register_handlers(&self) {
        let stop = self.stop.clone();
        let interrupted = Arc::clone(&self.interrupted);

        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(err) = signal::ctrl_c().await {
                    warn!(%err, "Failed to listen for SIGINT");
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(err) => {
                        warn!(%err, "Failed to listen for SIGTERM");
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT (Ctrl+C), stopping load"),
                _ = terminate => info!("Received SIGTERM, stopping load"),
                _ = stop.cancelled() => return,
            }

            interrupted.store(true, Ordering::SeqCst);
            stop.cancel();
            info!("Waiting for in-flight calls to drain");
        });
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }
}

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    Failure = 1,
    Interrupted = 130, // Standard exit code for SIGINT
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}
