//! Block planning against the host ephemeral range

use tracing::debug;

use crate::config::Config;
use crate::ephemeral::EphemeralRange;
use crate::errors::{PorterError, Result};

/// Highest port number a block may reach
pub const MAX_PORT: u64 = 65535;

/// Inclusive port span of block `index`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub index: u32,
    pub min: u64,
    pub max: u64,
}

impl Block {
    pub fn new(config: &Config, index: u32) -> Self {
        let min = config.lower_bound as u64 + index as u64 * config.block_size as u64;
        Self {
            index,
            min,
            max: min + config.block_size as u64 - 1,
        }
    }

    /// First port of the block, used as the reservation anchor
    pub fn first_port(&self) -> u64 {
        self.min
    }
}

/// Overlap predicate for two inclusive `[min, max]` pairs
///
/// Inverted pairs (`min > max`) never overlap anything.
pub fn range_overlap(min1: u64, max1: u64, min2: u64, max2: u64) -> bool {
    if min1 > max1 || min2 > max2 {
        return false;
    }
    min1 <= max2 && min2 <= max1
}

/// Number of blocks usable below the first block overlapping `ephemeral`
///
/// # Errors
/// - `RangeExhausted` when block 0 already overlaps
/// - `BlockTooLarge` when the usable blocks run past port 65535
pub fn plan(config: &Config, ephemeral: EphemeralRange) -> Result<u32> {
    config.validate_blocks()?;

    let mut effective = config.max_blocks;

    for index in 0..config.max_blocks {
        let block = Block::new(config, index);
        if block.min > MAX_PORT {
            // Nothing past the port space can overlap; the size check below rejects it
            break;
        }
        if range_overlap(block.min, block.max, ephemeral.min as u64, ephemeral.max as u64) {
            debug!(
                block = index,
                block_min = block.min,
                block_max = block.max,
                %ephemeral,
                "Block overlaps ephemeral range, truncating"
            );
            effective = index;
            break;
        }
    }

    if effective == 0 {
        return Err(PorterError::RangeExhausted {
            min: ephemeral.min,
            max: ephemeral.max,
        });
    }

    let end = config.lower_bound as u64 + effective as u64 * config.block_size as u64;
    if end > MAX_PORT {
        return Err(PorterError::BlockTooLarge {
            lower_bound: config.lower_bound,
            blocks: effective,
            block_size: config.block_size,
        });
    }

    debug!(effective_max_blocks = effective, "Planned port blocks");
    Ok(effective)
}
