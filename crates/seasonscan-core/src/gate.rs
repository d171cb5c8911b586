//! Dispatch gate: concurrency ceiling plus minimum spacing between dispatches.
//!
//! Every outbound lookup passes through one shared [`DispatchGate`]. The gate
//! holds `limit` permits (the in-flight ceiling) and hands out dispatch slots
//! no closer together than `min_interval`. Both scheduling backends share the
//! same gate, so the portal sees identical pressure either way.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::Instant;

/// Shared concurrency + pacing gate for outbound requests.
pub struct DispatchGate {
    permits: Semaphore,
    limit: usize,
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// RAII guard for one in-flight dispatch. Releases the permit on drop.
pub struct DispatchPermit<'a> {
    gate: &'a DispatchGate,
    _permit: SemaphorePermit<'a>,
}

impl DispatchGate {
    /// Create a gate allowing `limit` concurrent dispatches (at least one)
    /// spaced at least `min_interval` apart.
    pub fn new(limit: usize, min_interval: Duration) -> Self {
        let limit = limit.max(1);
        Self {
            permits: Semaphore::new(limit),
            limit,
            min_interval,
            next_slot: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Wait for a permit and a dispatch slot.
    ///
    /// Returns `None` once the gate has been closed; callers must not
    /// dispatch in that case.
    pub async fn acquire(&self) -> Option<DispatchPermit<'_>> {
        let permit = self.permits.acquire().await.ok()?;
        self.wait_for_slot().await;
        if self.is_closed() {
            return None;
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Some(DispatchPermit {
            gate: self,
            _permit: permit,
        })
    }

    /// Reserve the next free slot and sleep until it arrives.
    async fn wait_for_slot(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }

    /// Refuse all further dispatches. Waiters wake up with `None`.
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Configured concurrency ceiling.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Highest number of simultaneous dispatches observed so far.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Drop for DispatchPermit<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn acquire_and_release() {
        runtime().block_on(async {
            let gate = DispatchGate::new(2, Duration::ZERO);
            let p1 = gate.acquire().await.unwrap();
            let _p2 = gate.acquire().await.unwrap();
            assert_eq!(gate.in_flight.load(Ordering::SeqCst), 2);
            drop(p1);
            assert_eq!(gate.in_flight.load(Ordering::SeqCst), 1);
            assert_eq!(gate.peak_in_flight(), 2);
        });
    }

    #[test]
    fn zero_limit_is_clamped() {
        let gate = DispatchGate::new(0, Duration::ZERO);
        assert_eq!(gate.limit(), 1);
    }

    #[test]
    fn closed_gate_refuses() {
        runtime().block_on(async {
            let gate = DispatchGate::new(1, Duration::ZERO);
            gate.close();
            assert!(gate.acquire().await.is_none());
            assert_eq!(gate.peak_in_flight(), 0);
        });
    }

    #[test]
    fn close_wakes_waiters() {
        runtime().block_on(async {
            let gate = Arc::new(DispatchGate::new(1, Duration::ZERO));
            let held = gate.acquire().await.unwrap();

            let waiter = {
                let gate = gate.clone();
                tokio::spawn(async move { gate.acquire().await.is_none() })
            };
            tokio::task::yield_now().await;
            gate.close();
            assert!(waiter.await.unwrap());
            drop(held);
        });
    }

    #[test]
    fn slots_are_spaced() {
        runtime().block_on(async {
            let gate = DispatchGate::new(4, Duration::from_millis(20));
            let start = Instant::now();
            for _ in 0..3 {
                let _p = gate.acquire().await.unwrap();
            }
            // first slot is immediate, the next two wait one interval each
            assert!(start.elapsed() >= Duration::from_millis(40));
        });
    }

    #[test]
    fn blocking_threads_share_gate() {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let gate = Arc::new(DispatchGate::new(2, Duration::ZERO));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let gate = gate.clone();
                let handle = rt.handle().clone();
                std::thread::spawn(move || {
                    handle.block_on(async {
                        let _p = gate.acquire().await.unwrap();
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    })
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(gate.peak_in_flight() <= 2);
        assert_eq!(gate.in_flight.load(Ordering::SeqCst), 0);
    }
}
