//! Lock-free per-node health record.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Bounds for the per-node readmit backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeBackoff {
    pub min: Duration,
    pub max: Duration,
}

impl Default for NodeBackoff {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(8),
            max: Duration::from_secs(60 * 60),
        }
    }
}

/// Health of one node, updated concurrently by every execution that uses it.
///
/// A server error marks the node unhealthy for its current backoff and then
/// doubles that backoff (capped at `max`); any well-formed reply halves it
/// again (floored at `min`). Times are milliseconds since `epoch`, on the
/// tokio clock the engine's backoff sleeps use.
#[derive(Debug)]
pub struct NodeHealth {
    epoch: Instant,
    min_backoff_ms: u64,
    max_backoff_ms: u64,
    current_backoff_ms: AtomicU64,
    readmit_at_ms: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl NodeHealth {
    pub fn new(backoff: NodeBackoff) -> Self {
        let min = millis(backoff.min);
        let max = millis(backoff.max).max(min);
        Self {
            epoch: Instant::now(),
            min_backoff_ms: min,
            max_backoff_ms: max,
            current_backoff_ms: AtomicU64::new(min),
            readmit_at_ms: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    fn now_ms(&self) -> u64 {
        millis(self.epoch.elapsed())
    }

    pub fn is_healthy(&self) -> bool {
        self.readmit_at_ms.load(Ordering::Acquire) <= self.now_ms()
    }

    /// Time left until the node is considered healthy again.
    pub fn remaining_backoff(&self) -> Duration {
        let readmit = self.readmit_at_ms.load(Ordering::Acquire);
        Duration::from_millis(readmit.saturating_sub(self.now_ms()))
    }

    pub fn current_backoff(&self) -> Duration {
        Duration::from_millis(self.current_backoff_ms.load(Ordering::Relaxed))
    }

    /// Record a node-level failure: back the node off and grow its backoff.
    pub fn record_failure(&self) {
        let max = self.max_backoff_ms;
        let previous = self
            .current_backoff_ms
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| {
                Some(b.saturating_mul(2).min(max))
            })
            .unwrap_or_else(|b| b);
        let readmit = self.now_ms().saturating_add(previous);
        self.readmit_at_ms.fetch_max(readmit, Ordering::AcqRel);
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a well-formed reply: shrink the backoff toward `min`.
    pub fn record_success(&self) {
        let min = self.min_backoff_ms;
        let _ = self
            .current_backoff_ms
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| Some((b / 2).max(min)));
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn backoff(min_s: u64, max_s: u64) -> NodeBackoff {
        NodeBackoff {
            min: Duration::from_secs(min_s),
            max: Duration::from_secs(max_s),
        }
    }

    #[test]
    fn new_node_is_healthy() {
        let h = NodeHealth::new(NodeBackoff::default());
        assert!(h.is_healthy());
        assert_eq!(h.remaining_backoff(), Duration::ZERO);
    }

    #[test]
    fn failure_backs_off_and_doubles() {
        let h = NodeHealth::new(backoff(8, 20));
        h.record_failure();
        assert!(!h.is_healthy());
        assert!(h.remaining_backoff() > Duration::from_secs(7));
        assert_eq!(h.current_backoff(), Duration::from_secs(16));
        h.record_failure();
        assert_eq!(h.current_backoff(), Duration::from_secs(20));
        assert_eq!(h.failures(), 2);
    }

    #[test]
    fn success_halves_backoff_down_to_min() {
        let h = NodeHealth::new(backoff(8, 64));
        for _ in 0..3 {
            h.record_failure();
        }
        assert_eq!(h.current_backoff(), Duration::from_secs(64));
        h.record_success();
        assert_eq!(h.current_backoff(), Duration::from_secs(32));
        for _ in 0..5 {
            h.record_success();
        }
        assert_eq!(h.current_backoff(), Duration::from_secs(8));
        assert_eq!(h.successes(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn readmitted_once_backoff_elapses() {
        let h = NodeHealth::new(backoff(8, 60));
        h.record_failure();
        tokio::time::advance(Duration::from_secs(7)).await;
        assert!(!h.is_healthy());
        assert_eq!(h.remaining_backoff(), Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(h.is_healthy());
    }

    #[test]
    fn concurrent_updates_are_counted() {
        let h = Arc::new(NodeHealth::new(backoff(1, 10)));
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let h = Arc::clone(&h);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        if i % 2 == 0 {
                            h.record_failure();
                        } else {
                            h.record_success();
                        }
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(h.failures(), 400);
        assert_eq!(h.successes(), 400);
        let b = h.current_backoff();
        assert!(b >= Duration::from_secs(1) && b <= Duration::from_secs(10));
    }
}
