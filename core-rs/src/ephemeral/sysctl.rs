//! sysctl-backed ephemeral range queries
//!
//! - Linux: `net.ipv4.ip_local_port_range` (falls back to procfs when
//!   `sysctl` is missing or fails)
//! - Darwin: `net.inet.ip.portrange.first` / `net.inet.ip.portrange.last`

use regex::Regex;
use std::fs;
use std::process::Command;
use tracing::debug;

use super::{EphemeralRange, EphemeralRangeProvider, OsFamily};
use crate::errors::{PorterError, Result};

const LINUX_KEY: &str = "net.ipv4.ip_local_port_range";
const LINUX_PROC_PATH: &str = "/proc/sys/net/ipv4/ip_local_port_range";
const DARWIN_FIRST_KEY: &str = "net.inet.ip.portrange.first";
const DARWIN_LAST_KEY: &str = "net.inet.ip.portrange.last";

/// Queries the kernel through `sysctl -n`
#[derive(Debug, Clone, Copy, Default)]
pub struct SysctlRangeProvider;

impl SysctlRangeProvider {
    pub fn new() -> Self {
        Self
    }

    fn linux_range(&self) -> Result<EphemeralRange> {
        match sysctl(&[LINUX_KEY]) {
            Ok(out) => parse_range(&out),
            Err(err) => {
                debug!(error = %err, path = LINUX_PROC_PATH, "sysctl query failed, reading procfs");
                // Report the sysctl failure if procfs is unreadable too
                match fs::read_to_string(LINUX_PROC_PATH) {
                    Ok(content) => parse_range(&content),
                    Err(_) => Err(err),
                }
            }
        }
    }

    fn darwin_range(&self) -> Result<EphemeralRange> {
        let out = sysctl(&[DARWIN_FIRST_KEY, DARWIN_LAST_KEY])?;
        parse_range(&out)
    }
}

impl EphemeralRangeProvider for SysctlRangeProvider {
    fn ephemeral_range(&self, os: &str) -> Result<EphemeralRange> {
        let range = match os.parse::<OsFamily>()? {
            OsFamily::Linux => self.linux_range()?,
            OsFamily::Darwin => self.darwin_range()?,
        };
        debug!(os, %range, "Queried ephemeral port range");
        Ok(range)
    }
}

fn sysctl(keys: &[&str]) -> Result<String> {
    let output = Command::new("sysctl").arg("-n").args(keys).output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PorterError::QueryFailed(format!(
            "sysctl -n {} exited with {}: {}",
            keys.join(" "),
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse two whitespace-separated integers (one line or two)
pub fn parse_range(value: &str) -> Result<EphemeralRange> {
    let pattern = Regex::new(r"^\s*(\d+)\s+(\d+)\s*$")?;

    let unexpected = || PorterError::QueryFailed(format!("Unexpected sysctl value {:?}", value));

    let caps = pattern.captures(value).ok_or_else(unexpected)?;
    let min: u16 = caps[1].parse().map_err(|_| unexpected())?;
    let max: u16 = caps[2].parse().map_err(|_| unexpected())?;

    Ok(EphemeralRange { min, max })
}
