//! Graceful shutdown.
//!
//! SIGTERM/SIGINT cancel a shared [`CancellationToken`]. Every HTTP request
//! holds a [`RequestGuard`] while it runs; after the server stops accepting
//! connections `main` calls [`ShutdownCoordinator::drain`], which resolves
//! as soon as the last guard drops or `shutdown.timeout_seconds` elapses.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Shared shutdown state: the cancellation token plus the in-flight request count.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    requests: Arc<InFlight>,
    grace: Duration,
}

impl ShutdownCoordinator {
    /// `grace_seconds` bounds how long [`drain`](Self::drain) waits.
    pub fn new(grace_seconds: u64) -> Self {
        Self {
            token: CancellationToken::new(),
            requests: Arc::new(InFlight::default()),
            grace: Duration::from_secs(grace_seconds),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Mark one request as running until the returned guard drops.
    pub fn track_request(&self) -> RequestGuard {
        self.requests.count.fetch_add(1, Ordering::SeqCst);
        RequestGuard {
            requests: Arc::clone(&self.requests),
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.requests.count.load(Ordering::SeqCst)
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    /// Wait until no request is in flight.
    ///
    /// Returns `false` when the grace period ran out first.
    pub async fn drain(&self) -> bool {
        let idle = async {
            loop {
                // Registered before the check so a concurrent last drop is not missed.
                let notified = self.requests.idle.notified();
                if self.in_flight_count() == 0 {
                    return;
                }
                notified.await;
            }
        };

        match tokio::time::timeout(self.grace, idle).await {
            Ok(()) => {
                info!("In-flight requests drained");
                true
            }
            Err(_) => {
                warn!(
                    remaining_requests = self.in_flight_count(),
                    grace_seconds = self.grace.as_secs(),
                    "Grace period expired with requests still in flight"
                );
                false
            }
        }
    }
}

/// Counts a request as in flight while alive.
pub struct RequestGuard {
    requests: Arc<InFlight>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        if self.requests.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.requests.idle.notify_waiters();
        }
    }
}

/// Resolves on SIGTERM, SIGINT (Ctrl-C elsewhere) or token cancellation,
/// and cancels the token on the way out.
pub async fn shutdown_signal(coordinator: ShutdownCoordinator) {
    let token = coordinator.token();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let handlers = signal(SignalKind::terminate())
            .and_then(|term| signal(SignalKind::interrupt()).map(|int| (term, int)));
        match handlers {
            Ok((mut term, mut int)) => {
                let source = tokio::select! {
                    _ = term.recv() => "SIGTERM",
                    _ = int.recv() => "SIGINT",
                    _ = token.cancelled() => "token",
                };
                info!(source, "Shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Signal handlers unavailable; shutdown only via token");
                token.cancelled().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let source = tokio::select! {
            _ = tokio::signal::ctrl_c() => "ctrl_c",
            _ = token.cancelled() => "token",
        };
        info!(source, "Shutting down");
    }

    coordinator.trigger();
}
