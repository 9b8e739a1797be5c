//! Port availability probe
//!
//! A port is considered free when a TCP listener can be bound on
//! `127.0.0.1:<port>`. Any bind error counts as "in use", so permission
//! errors on privileged ports show up as false positives.

use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};
use tracing::trace;

/// Checks whether a local port is already bound
pub trait PortProbe: Send + Sync {
    /// true = in use / unavailable
    fn is_in_use(&self, port: u16) -> bool;
}

/// Bind-then-release probe on the loopback interface
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

impl PortProbe for TcpProbe {
    fn is_in_use(&self, port: u16) -> bool {
        is_port_in_use(port)
    }
}

/// Loopback socket address for `port`
pub fn loopback(port: u16) -> SocketAddrV4 {
    SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)
}

/// Test if a process is already bound to `port`
///
/// # Returns
/// true if in use, false if available
pub fn is_port_in_use(port: u16) -> bool {
    match TcpListener::bind(loopback(port)) {
        // Listener is dropped (and the port released) right away
        Ok(_listener) => false,
        Err(e) => {
            trace!(port, error = %e, "Port bind failed");
            true
        }
    }
}
