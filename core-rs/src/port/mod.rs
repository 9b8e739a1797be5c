/**
 * port module
 * Block planning, anchor reservation and the free/pending port pool
 */

pub mod allocator;
pub mod planner;
pub mod pool;
pub mod probe;
pub mod reconciler;

pub use allocator::{BlockAllocation, BlockAllocator, Reservation};
pub use planner::{plan, range_overlap, Block};
pub use pool::PortPool;
pub use probe::{is_port_in_use, PortProbe, TcpProbe};
pub use reconciler::Reconciler;
