/**
 * config.rs
 * Porter block configuration (YAML format)
 *
 * Format:
 * ```yaml
 * blockSize: 100
 * maxBlocks: 10
 * lowerBound: 10000
 * os: linux                 # optional, defaults to the host OS
 * reconcileIntervalMs: 500
 * ```
 *
 * Every key is optional; missing keys take the defaults below.
 */

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::errors::{PorterError, Result};

pub const DEFAULT_BLOCK_SIZE: u32 = 100;
pub const DEFAULT_MAX_BLOCKS: u32 = 10;
pub const DEFAULT_LOWER_BOUND: u16 = 10000;
pub const DEFAULT_RECONCILE_INTERVAL_MS: u64 = 500;

/// Port block parameters. Generally the defaults are sufficient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Number of ports in a block, anchor port included
    pub block_size: u32,
    /// Upper limit on candidate blocks; trimmed against the ephemeral range
    pub max_blocks: u32,
    /// Lowest port Porter will hand out
    pub lower_bound: u16,
    /// Overrides the OS used to query the ephemeral range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    pub reconcile_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            max_blocks: DEFAULT_MAX_BLOCKS,
            lower_bound: DEFAULT_LOWER_BOUND,
            os: None,
            reconcile_interval_ms: DEFAULT_RECONCILE_INTERVAL_MS,
        }
    }
}

impl Config {
    /// Load a config from a YAML file
    ///
    /// # Example
    /// ```no_run
    /// use porter_core::Config;
    ///
    /// let config = Config::load("porter.yaml").unwrap();
    /// assert!(config.block_size > 0);
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs that can never run
    pub fn validate(&self) -> Result<()> {
        self.validate_blocks()?;
        if self.reconcile_interval_ms == 0 {
            return Err(PorterError::InvalidConfig(
                "reconcileIntervalMs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Reject configs that can never describe a block
    pub fn validate_blocks(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(PorterError::InvalidConfig(
                "blockSize must be greater than 0".to_string(),
            ));
        }
        if self.max_blocks == 0 {
            return Err(PorterError::InvalidConfig(
                "maxBlocks must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// OS identifier used for the ephemeral range query
    pub fn os_name(&self) -> &str {
        match self.os.as_deref() {
            Some(os) if !os.is_empty() => os,
            _ => std::env::consts::OS,
        }
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }
}
