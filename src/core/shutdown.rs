//! Signal-driven shutdown coordination
//!
//! The binary wraps a scan in a [`ShutdownCoordinator`]. The first
//! interrupt/terminate signal cancels the scan-scoped token (workers unwind
//! at their next suspension point); a second signal exits immediately.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Exit status used when a second signal forces termination
pub const FORCED_EXIT_CODE: i32 = 130;

/// Coordinates graceful shutdown across the application
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    signal_count: Arc<AtomicUsize>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            signal_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Token cancelled when shutdown is requested
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn trigger_shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Number of shutdown signals seen so far
    pub fn signals_received(&self) -> usize {
        self.signal_count.load(Ordering::Acquire)
    }

    /// Record one signal; returns true when it is the second (forcing) one
    fn record_signal(&self) -> bool {
        let previous = self.signal_count.fetch_add(1, Ordering::AcqRel);
        self.token.cancel();
        previous >= 1
    }

    /// Run a future with signal handlers installed
    ///
    /// The closure receives the cancellation token to hand to the scan.
    pub async fn guard<F, Fut, R>(future_fn: F) -> R
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: std::future::Future<Output = R>,
    {
        let coordinator = Self::new();
        coordinator.install_signal_handlers();
        future_fn(coordinator.token()).await
    }

    /// Spawn listeners for the process signals that request shutdown
    pub fn install_signal_handlers(&self) {
        #[cfg(unix)]
        {
            unsafe {
                libc::signal(libc::SIGPIPE, libc::SIG_DFL);
            }

            use tokio::signal::unix::{signal, SignalKind};
            let signals = [
                SignalKind::interrupt(),
                SignalKind::terminate(),
                SignalKind::hangup(),
                SignalKind::quit(),
            ];

            for kind in signals {
                let coordinator = self.clone();
                tokio::spawn(async move {
                    let Ok(mut sig) = signal(kind) else {
                        return;
                    };
                    while sig.recv().await.is_some() {
                        if coordinator.record_signal() {
                            log::warn!("Second shutdown signal received; exiting");
                            std::process::exit(FORCED_EXIT_CODE);
                        }
                        log::info!("Shutdown requested; cancelling in-flight probes");
                    }
                });
            }
        }

        #[cfg(not(unix))]
        {
            let coordinator = self.clone();
            tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if coordinator.record_signal() {
                        std::process::exit(FORCED_EXIT_CODE);
                    }
                }
            });
        }
    }
}
