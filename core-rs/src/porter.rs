//! Porter - a reserved port block with a self-replenishing pool
//!
//! Construction queries the ephemeral range, plans the usable blocks,
//! reserves a random block's anchor port, scans the rest of the block and
//! starts the reconciler. Anything acquired before a failing step is
//! released when the partial state is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

use crate::config::Config;
use crate::ephemeral::{EphemeralRange, EphemeralRangeProvider, SysctlRangeProvider};
use crate::errors::Result;
use crate::port::{plan, BlockAllocator, PortPool, PortProbe, Reconciler, Reservation, TcpProbe};

/// Builder for `Porter` with injectable collaborators
pub struct PorterBuilder {
    config: Config,
    provider: Box<dyn EphemeralRangeProvider>,
    probe: Arc<dyn PortProbe>,
    seed: Option<u64>,
}

impl PorterBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            provider: Box::new(SysctlRangeProvider::new()),
            probe: Arc::new(TcpProbe),
            seed: None,
        }
    }

    /// Source of the host ephemeral range (default: sysctl)
    pub fn range_provider(mut self, provider: impl EphemeralRangeProvider + 'static) -> Self {
        self.provider = Box::new(provider);
        self
    }

    /// Port availability check (default: loopback bind)
    pub fn probe(mut self, probe: Arc<dyn PortProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Fix the block selection seed (default: OS entropy)
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<Porter> {
        let config = self.config;
        config.validate()?;

        let ephemeral = self.provider.ephemeral_range(config.os_name())?;
        let effective_max_blocks = plan(&config, ephemeral)?;

        let mut allocator = match self.seed {
            Some(seed) => BlockAllocator::with_seed(seed),
            None => BlockAllocator::new(),
        };
        let allocation = allocator.allocate(&config, effective_max_blocks, self.probe.as_ref())?;

        let pool = Arc::new(PortPool::new(
            allocation.first_port,
            config.block_size,
            allocation.free_ports,
            self.probe,
        ));
        // On failure the reservation drops with `allocation` and is released
        let reconciler = Reconciler::spawn(pool.clone(), config.reconcile_interval())?;

        Ok(Porter {
            effective_max_blocks,
            ephemeral,
            block: allocation.block,
            first_port: allocation.first_port,
            pool,
            reservation: Mutex::new(allocation.reservation),
            reconciler,
            closed: AtomicBool::new(false),
            config,
        })
    }
}

/// A live port block allocation
///
/// `Porter` is `Send + Sync`; share it behind an `Arc` to take and return
/// ports from several threads.
///
/// # Example
/// ```no_run
/// use porter_core::{Config, Porter};
///
/// let porter = Porter::new(Config::default()).unwrap();
/// let ports = porter.take(3).unwrap();
/// // ... start services on `ports` ...
/// porter.return_ports(&ports);
/// porter.close();
/// ```
pub struct Porter {
    config: Config,
    ephemeral: EphemeralRange,
    effective_max_blocks: u32,
    block: u32,
    first_port: u16,
    pool: Arc<PortPool>,
    reservation: Mutex<Reservation>,
    reconciler: Reconciler,
    closed: AtomicBool,
}

impl Porter {
    /// Allocate a port block using the host ephemeral range
    pub fn new(config: Config) -> Result<Self> {
        PorterBuilder::new(config).build()
    }

    pub fn builder(config: Config) -> PorterBuilder {
        PorterBuilder::new(config)
    }

    /// Take `n` confirmed-free ports
    pub fn take(&self, n: usize) -> Result<Vec<u16>> {
        self.pool.take(n)
    }

    /// Take `n` ports, panicking on failure
    ///
    /// Meant for test setup code where there is no sensible recovery.
    pub fn must_take(&self, n: usize) -> Vec<u16> {
        self.take(n)
            .unwrap_or_else(|e| panic!("porter: failed to take {} ports: {}", n, e))
    }

    /// Give ports back; they become available again once reconciled
    pub fn return_ports(&self, ports: &[u16]) {
        self.pool.return_ports(ports);
    }

    /// Release the anchor port and stop the reconciler
    ///
    /// Safe to call more than once. `take`/`return_ports` keep working
    /// afterwards, but returned ports are no longer reclaimed.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.reconciler.stop();
        self.reservation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release();

        info!(
            first_port = self.first_port,
            free = self.pool.free_count(),
            pending = self.pool.pending_count(),
            "Porter closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ephemeral range the block plan was computed against
    pub fn ephemeral_range(&self) -> EphemeralRange {
        self.ephemeral
    }

    pub fn effective_max_blocks(&self) -> u32 {
        self.effective_max_blocks
    }

    /// Index of the allocated block
    pub fn block(&self) -> u32 {
        self.block
    }

    /// Anchor port held by the reservation
    pub fn first_port(&self) -> u16 {
        self.first_port
    }

    pub fn block_size(&self) -> u32 {
        self.config.block_size
    }

    pub fn free_count(&self) -> usize {
        self.pool.free_count()
    }

    pub fn pending_count(&self) -> usize {
        self.pool.pending_count()
    }

    pub fn pool(&self) -> &PortPool {
        &self.pool
    }
}

impl Drop for Porter {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Porter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Porter")
            .field("block", &self.block)
            .field("first_port", &self.first_port)
            .field("effective_max_blocks", &self.effective_max_blocks)
            .field("pool", &self.pool)
            .field("closed", &self.is_closed())
            .finish()
    }
}
