//! # Porter - local TCP port block allocation
//!
//! Test harnesses and local service orchestration need batches of ports
//! that are free *now* and are unlikely to be grabbed by someone else a
//! moment later. Porter hands out ports from a randomly chosen block that
//! sits below the host's ephemeral port range, so outgoing connections
//! never land in it, and holds the block's first port as an anchor so a
//! second Porter on the same host picks a different block.
//!
//! ## Flow
//!
//! ```text
//! EphemeralRangeProvider ──► planner ──► BlockAllocator ──► PortPool
//!                                         (anchor lock)      │   ▲
//!                                                      take  │   │ reconcile
//!                                                            ▼   │ (Reconciler)
//!                                                   caller ──► return_ports
//! ```
//!
//! Returned ports are parked as pending and only re-enter the free set
//! after a fresh bind probe succeeds, since a closed connection can keep
//! its port busy for a while.

pub mod config;
pub mod ephemeral;
pub mod errors;
pub mod port;
pub mod porter;

pub use config::Config;
pub use ephemeral::{
    EphemeralRange, EphemeralRangeProvider, FixedRangeProvider, OsFamily, SysctlRangeProvider,
};
pub use errors::{PorterError, Result};
pub use port::{is_port_in_use, range_overlap, PortPool, PortProbe, TcpProbe};
pub use porter::{Porter, PorterBuilder};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
