//! Host ephemeral port range lookup
//!
//! The kernel hands out ports from the ephemeral range for outgoing
//! connections. Blocks handed to callers must stay below it, otherwise a
//! client socket can grab a port between the probe and the caller's `bind`.

pub mod sysctl;

pub use sysctl::SysctlRangeProvider;

use crate::errors::{PorterError, Result};
use std::fmt;
use std::str::FromStr;

/// Inclusive `[min, max]` ephemeral port range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EphemeralRange {
    pub min: u16,
    pub max: u16,
}

impl EphemeralRange {
    pub fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.min && port <= self.max
    }
}

impl fmt::Display for EphemeralRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

impl FromStr for EphemeralRange {
    type Err = PorterError;

    /// Parses `MIN-MAX`, e.g. `32768-60999`
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PorterError::InvalidConfig(format!("Invalid ephemeral range: {:?}", s));
        let (min, max) = s.trim().split_once('-').ok_or_else(invalid)?;
        let min = min.trim().parse().map_err(|_| invalid())?;
        let max = max.trim().parse().map_err(|_| invalid())?;
        Ok(Self { min, max })
    }
}

/// OS families with a known ephemeral range query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Linux,
    Darwin,
}

impl FromStr for OsFamily {
    type Err = PorterError;

    fn from_str(os: &str) -> Result<Self> {
        match os.to_ascii_lowercase().as_str() {
            "linux" => Ok(OsFamily::Linux),
            "darwin" | "macos" => Ok(OsFamily::Darwin),
            _ => Err(PorterError::UnsupportedOs(os.to_string())),
        }
    }
}

/// Source of the host ephemeral port range
pub trait EphemeralRangeProvider: Send + Sync {
    /// Query the range for the given OS identifier
    fn ephemeral_range(&self, os: &str) -> Result<EphemeralRange>;
}

/// Provider returning a fixed range for every OS
#[derive(Debug, Clone, Copy)]
pub struct FixedRangeProvider(pub EphemeralRange);

impl EphemeralRangeProvider for FixedRangeProvider {
    fn ephemeral_range(&self, _os: &str) -> Result<EphemeralRange> {
        Ok(self.0)
    }
}
