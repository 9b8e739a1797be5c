//! Concurrency tests: parallel take/return against one Porter

use porter_core::{Config, EphemeralRange, FixedRangeProvider, Porter, PortProbe};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task;

struct NeverInUse;

impl PortProbe for NeverInUse {
    fn is_in_use(&self, _port: u16) -> bool {
        false
    }
}

fn shared_porter(lower_bound: u16, block_size: u32) -> Arc<Porter> {
    let config = Config {
        lower_bound,
        block_size,
        max_blocks: 1,
        reconcile_interval_ms: 10,
        ..Config::default()
    };
    let porter = Porter::builder(config)
        .range_provider(FixedRangeProvider(EphemeralRange::new(32768, 60999)))
        .probe(Arc::new(NeverInUse))
        .build()
        .unwrap();
    Arc::new(porter)
}

#[tokio::test]
async fn test_concurrent_take_hands_out_disjoint_ports() {
    let porter = shared_porter(24500, 101);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let porter = Arc::clone(&porter);
        handles.push(task::spawn_blocking(move || porter.take(10)));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        let ports = handle.await.unwrap().unwrap();
        assert_eq!(ports.len(), 10);
        for port in ports {
            assert!(seen.insert(port), "port {} handed out twice", port);
        }
    }

    assert_eq!(seen.len(), 100);
    assert_eq!(porter.free_count(), 0);
}

#[tokio::test]
async fn test_concurrent_take_and_return_converge() {
    let porter = shared_porter(24700, 51);
    let initial = porter.free_count();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let porter = Arc::clone(&porter);
        handles.push(task::spawn_blocking(move || {
            for _ in 0..20 {
                if let Ok(ports) = porter.take(3) {
                    porter.return_ports(&ports);
                }
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    // The reconciler brings every returned port back
    let mut restored = false;
    for _ in 0..300 {
        if porter.free_count() == initial && porter.pending_count() == 0 {
            restored = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(restored, "pool did not converge: {:?}", porter);

    let free: HashSet<u16> = porter.pool().free_ports().into_iter().collect();
    assert_eq!(free.len(), initial);
}

#[tokio::test]
async fn test_close_while_taking() {
    let porter = shared_porter(24800, 51);

    let taker = {
        let porter = Arc::clone(&porter);
        task::spawn_blocking(move || {
            let mut taken = 0;
            while porter.take(1).is_ok() {
                taken += 1;
            }
            taken
        })
    };
    let closer = {
        let porter = Arc::clone(&porter);
        task::spawn_blocking(move || porter.close())
    };

    closer.await.unwrap();
    let taken = taker.await.unwrap();

    assert!(porter.is_closed());
    assert_eq!(taken, 50);
}
