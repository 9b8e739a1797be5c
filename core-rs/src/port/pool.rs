//! Free/pending port registry for one allocated block
//!
//! `free` holds ports confirmed available and is consumed as a queue by
//! `take`. `pending` holds ports handed back by callers that may still be
//! lingering in TIME_WAIT; `reconcile` moves them back to `free` once a
//! fresh probe succeeds. Both sequences only ever contain ports strictly
//! inside `(first_port, first_port + block_size)`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

use super::probe::PortProbe;
use crate::errors::{PorterError, Result};

#[derive(Debug, Default)]
struct PoolState {
    free: VecDeque<u16>,
    pending: Vec<u16>,
}

fn in_block(first_port: u16, block_size: u32, port: u16) -> bool {
    let first = first_port as u64;
    let port = port as u64;
    port > first && port < first + block_size as u64
}

pub struct PortPool {
    first_port: u16,
    block_size: u32,
    probe: Arc<dyn PortProbe>,
    state: Mutex<PoolState>,
}

impl PortPool {
    /// Create a pool seeded with the ports found free by the block scan
    ///
    /// Ports outside the block (or the anchor itself) are ignored.
    pub fn new(
        first_port: u16,
        block_size: u32,
        free_ports: impl IntoIterator<Item = u16>,
        probe: Arc<dyn PortProbe>,
    ) -> Self {
        let free: VecDeque<u16> = free_ports
            .into_iter()
            .filter(|&port| in_block(first_port, block_size, port))
            .collect();

        Self {
            first_port,
            block_size,
            probe,
            state: Mutex::new(PoolState {
                free,
                pending: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // State stays consistent across a panicking probe, so keep going
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn first_port(&self) -> u16 {
        self.first_port
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// true if `port` lies strictly inside `(first_port, first_port + block_size)`
    pub fn owns(&self, port: u16) -> bool {
        in_block(self.first_port, self.block_size, port)
    }

    /// Take `n` ports from the front of the free set
    ///
    /// Each port is re-probed before it is handed out; ports claimed by
    /// another process since the last probe are dropped from the pool.
    ///
    /// # Errors
    /// `InsufficientPorts` if `n` exceeds the free set, or if stale ports
    /// drain it mid-call. Ports already confirmed in that call are put back
    /// at the front of the free set in their original order.
    pub fn take(&self, n: usize) -> Result<Vec<u16>> {
        let mut state = self.lock();

        if n > state.free.len() {
            return Err(PorterError::InsufficientPorts {
                requested: n,
                available: state.free.len(),
            });
        }

        let mut ports = Vec::with_capacity(n);
        while ports.len() < n {
            let Some(port) = state.free.pop_front() else {
                for port in ports.into_iter().rev() {
                    state.free.push_front(port);
                }
                return Err(PorterError::InsufficientPorts {
                    requested: n,
                    available: state.free.len(),
                });
            };

            if self.probe.is_in_use(port) {
                warn!(port, "Free port was claimed by another process, discarding");
                continue;
            }
            ports.push(port);
        }

        debug!(?ports, remaining = state.free.len(), "Took ports");
        Ok(ports)
    }

    /// Hand ports back to the pool
    ///
    /// Ports are parked in the pending set until `reconcile` confirms them
    /// free. Ports this pool never owned, and ports it already tracks, are
    /// dropped.
    pub fn return_ports(&self, ports: &[u16]) {
        if ports.is_empty() {
            return;
        }

        let mut state = self.lock();
        for &port in ports {
            if !self.owns(port) {
                trace!(port, first_port = self.first_port, "Ignoring port outside block");
                continue;
            }
            if state.pending.contains(&port) || state.free.contains(&port) {
                trace!(port, "Port already tracked");
                continue;
            }
            state.pending.push(port);
        }
        debug!(pending = state.pending.len(), "Ports returned");
    }

    /// Move pending ports that probe free into the free set
    ///
    /// Ports still in use stay pending in their original order.
    /// Returns the number of ports reclaimed.
    pub fn reconcile(&self) -> usize {
        let mut state = self.lock();
        if state.pending.is_empty() {
            return 0;
        }

        let pending = std::mem::take(&mut state.pending);
        let mut reclaimed = 0;
        for port in pending {
            if self.probe.is_in_use(port) {
                state.pending.push(port);
            } else {
                state.free.push_back(port);
                reclaimed += 1;
            }
        }

        if reclaimed > 0 {
            debug!(
                reclaimed,
                still_pending = state.pending.len(),
                "Reclaimed returned ports"
            );
        }
        reclaimed
    }

    pub fn free_count(&self) -> usize {
        self.lock().free.len()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Snapshot of the free set, in take order
    pub fn free_ports(&self) -> Vec<u16> {
        self.lock().free.iter().copied().collect()
    }

    /// Snapshot of the pending set
    pub fn pending_ports(&self) -> Vec<u16> {
        self.lock().pending.clone()
    }
}

impl std::fmt::Debug for PortPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("PortPool")
            .field("first_port", &self.first_port)
            .field("block_size", &self.block_size)
            .field("free", &state.free.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}
