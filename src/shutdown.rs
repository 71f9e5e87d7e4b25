//! Deferred teardown after a successful provisioning.
//!
//! The success page travels over the hotspot that is about to disappear, so
//! the sequence waits until the HTTP layer reports the response body as
//! delivered (bounded by a timeout), lingers briefly, stops the hotspot and
//! finally cancels the process-wide terminate token that `main` waits on.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::hotspot::{HotspotController, HotspotSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownTimings {
    /// Upper bound on waiting for the response-delivered signal.
    pub response_timeout: Duration,
    /// Pause between delivery and hotspot teardown.
    pub linger: Duration,
    /// Pause between hotspot teardown and termination.
    pub exit_delay: Duration,
}

impl Default for ShutdownTimings {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(5),
            linger: Duration::from_secs(1),
            exit_delay: Duration::from_secs(1),
        }
    }
}

/// A scheduled shutdown.
pub struct ShutdownHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ShutdownHandle {
    /// Abort the sequence. Has no effect once the hotspot teardown started.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the sequence to finish or be cancelled.
    pub async fn finished(self) {
        if let Err(e) = self.task.await {
            error!("Shutdown task failed: {e}");
        }
    }
}

pub struct ShutdownSequencer {
    hotspot: Arc<HotspotController>,
    session: Mutex<Option<HotspotSession>>,
    timings: ShutdownTimings,
    terminate: CancellationToken,
}

impl ShutdownSequencer {
    pub fn new(
        hotspot: Arc<HotspotController>,
        session: HotspotSession,
        timings: ShutdownTimings,
        terminate: CancellationToken,
    ) -> Self {
        Self {
            hotspot,
            session: Mutex::new(Some(session)),
            timings,
            terminate,
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<HotspotSession>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a shutdown is pending or already ran.
    pub fn is_armed(&self) -> bool {
        self.lock_session().is_none()
    }

    /// Arm the shutdown sequence. `delivered` resolves when the triggering
    /// response has been handed to the transport.
    ///
    /// Returns `None` when a shutdown is already armed.
    pub fn schedule(self: &Arc<Self>, delivered: oneshot::Receiver<()>) -> Option<ShutdownHandle> {
        let Some(session) = self.lock_session().take() else {
            debug!("Shutdown already scheduled");
            return None;
        };

        info!("Shutdown scheduled");
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Arc::clone(self).run(session, delivered, cancel.clone()));
        Some(ShutdownHandle { cancel, task })
    }

    async fn run(
        self: Arc<Self>,
        session: HotspotSession,
        delivered: oneshot::Receiver<()>,
        cancel: CancellationToken,
    ) {
        let timings = self.timings;
        let settle = async {
            match tokio::time::timeout(timings.response_timeout, delivered).await {
                Ok(_) => debug!("Provisioning response delivered"),
                Err(_) => warn!(
                    "Response delivery not confirmed within {:?}, tearing down anyway",
                    timings.response_timeout
                ),
            }
            tokio::time::sleep(timings.linger).await;
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Scheduled shutdown cancelled");
                *self.lock_session() = Some(session);
                return;
            }
            _ = settle => {}
        }

        info!("Shutting down setup portal after successful provisioning");
        let hotspot = Arc::clone(&self.hotspot);
        if let Err(e) = tokio::task::spawn_blocking(move || hotspot.stop(session)).await {
            error!("Hotspot teardown task failed: {e}");
        }

        tokio::time::sleep(timings.exit_delay).await;
        self.terminate.cancel();
    }
}
