//! Adaptive wake waiting.
//!
//! Three escalation phases: a tight spin (a wake lands within tens of
//! nanoseconds), cooperative yields (about a microsecond), then short
//! timed sleeps (about a millisecond). The flag is consumed with an
//! AcqRel swap so every store write the producer made before waking is
//! visible after the wait returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::store::Store;

/// Escalation thresholds. The defaults satisfy the latency tiers; tune
/// per platform if profiling says so.
#[derive(Debug, Clone, Copy)]
pub struct WakeConfig {
    /// Spin-loop iterations before yielding.
    pub spin_iterations: u32,
    /// Yield iterations before sleeping.
    pub yield_iterations: u32,
    /// Sleep quantum in the final phase.
    pub sleep: Duration,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            spin_iterations: 64,
            yield_iterations: 192,
            sleep: Duration::from_micros(50),
        }
    }
}

/// Block until a wake arrives or `running` clears. Returns whether a
/// wake was observed (false means shutdown).
pub fn wait_for_wake(store: &Store, config: &WakeConfig, running: &Arc<AtomicBool>) -> bool {
    let mut idle: u32 = 0;
    loop {
        if store.consume_wake() {
            return true;
        }
        if !running.load(Ordering::Relaxed) {
            return false;
        }

        idle = idle.saturating_add(1);
        if idle <= config.spin_iterations {
            std::hint::spin_loop();
        } else if idle <= config.spin_iterations + config.yield_iterations {
            std::thread::yield_now();
        } else {
            std::thread::sleep(config.sleep);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;

    fn store() -> Arc<Store> {
        Arc::new(
            Store::allocate(StoreConfig {
                capacity: 4,
                text_pool_size: 64,
                ring_size: 4,
            })
            .unwrap(),
        )
    }

    #[test]
    fn returns_immediately_when_wake_already_set() {
        let store = store();
        let running = Arc::new(AtomicBool::new(true));
        store.wake();
        assert!(wait_for_wake(&store, &WakeConfig::default(), &running));
        // Consumed: a second wait would block, so the flag must be clear.
        assert!(!store.wake_pending());
    }

    #[test]
    fn observes_wake_from_another_thread() {
        let store = store();
        let running = Arc::new(AtomicBool::new(true));
        let store_for_producer = store.clone();
        let producer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            store_for_producer.wake();
        });
        assert!(wait_for_wake(&store, &WakeConfig::default(), &running));
        producer.join().unwrap();
    }

    #[test]
    fn shutdown_unblocks_without_wake() {
        let store = store();
        let running = Arc::new(AtomicBool::new(true));
        let running_for_stopper = running.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            running_for_stopper.store(false, Ordering::Relaxed);
        });
        assert!(!wait_for_wake(&store, &WakeConfig::default(), &running));
        stopper.join().unwrap();
    }

    #[test]
    fn coalesced_wakes_consume_as_one() {
        let store = store();
        let running = Arc::new(AtomicBool::new(true));
        store.wake();
        store.wake();
        store.wake();
        assert!(wait_for_wake(&store, &WakeConfig::default(), &running));
        assert!(!store.wake_pending());
    }
}
