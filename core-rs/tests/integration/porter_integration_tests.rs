//! Integration tests for Porter against real loopback sockets
//!
//! Every test uses its own lower bound so tests running in parallel never
//! compete for the same block.

use porter_core::{Config, EphemeralRange, FixedRangeProvider, Porter, PorterError};
use std::collections::HashSet;
use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

fn config(lower_bound: u16, block_size: u32, max_blocks: u32) -> Config {
    Config {
        lower_bound,
        block_size,
        max_blocks,
        reconcile_interval_ms: 20,
        ..Config::default()
    }
}

fn build(config: Config) -> Porter {
    Porter::builder(config)
        .range_provider(FixedRangeProvider(EphemeralRange::new(32768, 60999)))
        .build()
        .expect("Failed to allocate port block")
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

#[test]
fn test_take_returns_distinct_bindable_ports_inside_block() {
    let porter = build(config(23000, 100, 3));

    assert_eq!(porter.effective_max_blocks(), 3);
    assert!([23000, 23100, 23200].contains(&porter.first_port()));

    let first = porter.first_port();
    let ports = porter.take(5).unwrap();
    assert_eq!(ports.len(), 5);

    let unique: HashSet<u16> = ports.iter().copied().collect();
    assert_eq!(unique.len(), 5);

    for &port in &ports {
        assert!(port > first && port < first + 100, "port {} outside block", port);
        assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
    }
}

#[test]
fn test_initial_free_set_excludes_anchor() {
    let porter = build(config(23400, 50, 1));
    let first = porter.first_port();

    let free = porter.pool().free_ports();
    assert!(!free.contains(&first));
    assert!(free.iter().all(|&p| p > first && p < first + 50));
    // Ascending scan order
    assert!(free.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_take_skips_port_claimed_after_scan() {
    let porter = build(config(23500, 20, 1));
    let free = porter.pool().free_ports();
    let claimed = free[0];

    let _other_process = TcpListener::bind(("127.0.0.1", claimed)).unwrap();

    let ports = porter.take(1).unwrap();
    assert_ne!(ports[0], claimed);
    assert!(!porter.pool().free_ports().contains(&claimed));
}

#[test]
fn test_take_return_reconcile_round_trip() {
    let porter = build(config(23600, 20, 1));
    let before = porter.free_count();

    let ports = porter.take(3).unwrap();
    porter.return_ports(&ports);

    assert!(wait_until(Duration::from_secs(3), || porter.free_count() == before));
    assert_eq!(porter.pending_count(), 0);

    let free = porter.pool().free_ports();
    for port in ports {
        assert!(free.contains(&port));
    }
}

#[test]
fn test_returned_port_still_bound_stays_pending() {
    let porter = build(config(23700, 20, 1));

    let ports = porter.take(1).unwrap();
    let listener = TcpListener::bind(("127.0.0.1", ports[0])).unwrap();
    porter.return_ports(&ports);

    thread::sleep(Duration::from_millis(100));
    assert_eq!(porter.pool().pending_ports(), ports);

    drop(listener);
    assert!(wait_until(Duration::from_secs(3), || porter.pending_count() == 0));
    assert!(porter.pool().free_ports().contains(&ports[0]));
}

#[test]
fn test_insufficient_ports_leaves_free_set_unchanged() {
    let porter = build(config(23800, 10, 1));
    let before = porter.pool().free_ports();

    let result = porter.take(before.len() + 1);
    assert!(matches!(result, Err(PorterError::InsufficientPorts { .. })));
    assert_eq!(porter.pool().free_ports(), before);
}

#[test]
fn test_second_allocator_on_same_block_fails() {
    let first = build(config(23900, 10, 1));
    assert_eq!(first.first_port(), 23900);

    let second = Porter::builder(config(23900, 10, 1))
        .range_provider(FixedRangeProvider(EphemeralRange::new(32768, 60999)))
        .build();

    match second {
        Err(PorterError::ReservationFailed { port, .. }) => assert_eq!(port, 23900),
        other => panic!("Expected ReservationFailed, got {:?}", other),
    }

    // Once released, the block can be allocated again
    first.close();
    let third = build(config(23900, 10, 1));
    assert_eq!(third.first_port(), 23900);
}

#[test]
fn test_returned_ports_not_reclaimed_after_close() {
    let porter = build(config(24000, 10, 1));
    let ports = porter.take(2).unwrap();

    porter.close();
    porter.return_ports(&ports);

    thread::sleep(Duration::from_millis(100));
    assert_eq!(porter.pending_count(), 2);
}

#[test]
fn test_seeded_builds_pick_same_block() {
    let a = Porter::builder(config(24100, 10, 8))
        .range_provider(FixedRangeProvider(EphemeralRange::new(32768, 60999)))
        .seed(99)
        .build()
        .unwrap();
    let block = a.block();
    a.close();

    let b = Porter::builder(config(24100, 10, 8))
        .range_provider(FixedRangeProvider(EphemeralRange::new(32768, 60999)))
        .seed(99)
        .build()
        .unwrap();
    assert_eq!(b.block(), block);
}
