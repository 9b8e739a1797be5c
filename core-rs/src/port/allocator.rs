/**
 * allocator.rs
 * Random block selection and anchor reservation
 *
 * Block layout (lower bound L, block size S, chosen block b):
 * - Anchor port: L + b*S, held by a listener for the allocator's lifetime
 * - Pool ports:  L + b*S + 1 ..= L + b*S + S - 1, scanned for availability
 *
 * The anchor only deters other allocators on the same host from picking
 * the same block. It does not reserve the rest of the block.
 */

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::net::TcpListener;
use tracing::{debug, info, warn};

use super::probe::{loopback, PortProbe};
use crate::config::Config;
use crate::errors::{PorterError, Result};

/// Listener holding a block's anchor port
///
/// The port is released by `release` or when the value is dropped.
#[derive(Debug)]
pub struct Reservation {
    port: u16,
    listener: Option<TcpListener>,
}

impl Reservation {
    /// Bind `127.0.0.1:port` and keep the listener open
    pub fn acquire(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(loopback(port))
            .map_err(|source| PorterError::ReservationFailed { port, source })?;

        debug!(port, "Reserved anchor port");
        Ok(Self {
            port,
            listener: Some(listener),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_held(&self) -> bool {
        self.listener.is_some()
    }

    /// Close the listener. Returns false if it was already released.
    pub fn release(&mut self) -> bool {
        match self.listener.take() {
            Some(listener) => {
                drop(listener);
                debug!(port = self.port, "Released anchor port");
                true
            }
            None => false,
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.release();
    }
}

/// Result of a successful block allocation
#[derive(Debug)]
pub struct BlockAllocation {
    pub block: u32,
    pub first_port: u16,
    pub reservation: Reservation,
    /// Free ports after the anchor, ascending
    pub free_ports: Vec<u16>,
}

/// Picks a random usable block and reserves its anchor port
#[derive(Debug)]
pub struct BlockAllocator {
    rng: StdRng,
}

impl BlockAllocator {
    /// Allocator seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Allocator with a fixed seed, for reproducible block choice
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform block index in `[0, effective_max_blocks)`
    pub fn choose_block(&mut self, effective_max_blocks: u32) -> u32 {
        self.rng.gen_range(0..effective_max_blocks)
    }

    /// Reserve a random block and scan it for free ports
    ///
    /// # Arguments
    /// * `config` - Block parameters
    /// * `effective_max_blocks` - Usable block count from the planner
    /// * `probe` - Availability check applied to every non-anchor port
    ///
    /// # Errors
    /// - `InvalidConfig` for a zero block size or block count
    /// - `ReservationFailed` if the anchor port cannot be bound. There is
    ///   no retry with another block.
    pub fn allocate(
        &mut self,
        config: &Config,
        effective_max_blocks: u32,
        probe: &dyn PortProbe,
    ) -> Result<BlockAllocation> {
        config.validate_blocks()?;
        if effective_max_blocks == 0 {
            return Err(PorterError::InvalidConfig(
                "No usable blocks to allocate from".to_string(),
            ));
        }

        let block = self.choose_block(effective_max_blocks);
        let first = config.lower_bound as u64 + block as u64 * config.block_size as u64;
        let end = first + config.block_size as u64;

        if end - 1 > u16::MAX as u64 {
            return Err(PorterError::BlockTooLarge {
                lower_bound: config.lower_bound,
                blocks: effective_max_blocks,
                block_size: config.block_size,
            });
        }
        let first_port = first as u16;

        let reservation = Reservation::acquire(first_port).inspect_err(|e| {
            warn!(block, port = first_port, error = %e, "Could not reserve port block");
        })?;

        let free_ports: Vec<u16> = (first + 1..end)
            .map(|port| port as u16)
            .filter(|&port| !probe.is_in_use(port))
            .collect();

        info!(
            block,
            first_port,
            block_size = config.block_size,
            free = free_ports.len(),
            "Allocated port block"
        );

        Ok(BlockAllocation {
            block,
            first_port,
            reservation,
            free_ports,
        })
    }
}

impl Default for BlockAllocator {
    fn default() -> Self {
        Self::new()
    }
}
