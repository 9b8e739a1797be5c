// Reconciler - periodically reclaims returned ports
//
// Runs `PortPool::reconcile` on a dedicated thread every interval until
// stopped. The stop signal is the sender half of a channel: dropping it
// wakes the thread immediately, so `stop` never waits a full interval.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use super::pool::PortPool;
use crate::errors::Result;

pub struct Reconciler {
    stop_tx: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Reconciler {
    pub fn spawn(pool: Arc<PortPool>, interval: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name(format!("porter-reconcile-{}", pool.first_port()))
            .spawn(move || {
                debug!(first_port = pool.first_port(), ?interval, "Reconciler started");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            pool.reconcile();
                        }
                        // Explicit stop or sender dropped
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!(first_port = pool.first_port(), "Reconciler stopped");
            })?;

        Ok(Self {
            stop_tx: Mutex::new(Some(stop_tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn is_running(&self) -> bool {
        self.stop_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Signal the loop to exit and wait for it
    ///
    /// Returns false if the reconciler was already stopped.
    pub fn stop(&self) -> bool {
        let Some(stop_tx) = self
            .stop_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return false;
        };
        drop(stop_tx);

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Reconciler thread panicked");
            }
        }
        true
    }
}

impl Drop for Reconciler {
    fn drop(&mut self) {
        self.stop();
    }
}
