//! Run-wide abort signal, tripped by a fatal authentication failure

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Cloneable handle to one run's abort state.
///
/// The first call to [`trip`](AbortSignal::trip) wins; its reason is kept
/// for the final diagnostic and later calls are ignored.
#[derive(Clone, Debug, Default)]
pub struct AbortSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    tripped: AtomicBool,
    reason: OnceLock<String>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the run as aborted. Returns `true` if this call tripped it.
    pub fn trip(&self, reason: impl Into<String>) -> bool {
        let first = self.inner.reason.set(reason.into()).is_ok();
        self.inner.tripped.store(true, Ordering::SeqCst);
        first
    }

    pub fn is_tripped(&self) -> bool {
        self.inner.tripped.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<&str> {
        self.inner.reason.get().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear() {
        let signal = AbortSignal::new();
        assert!(!signal.is_tripped());
        assert_eq!(signal.reason(), None);
    }

    #[test]
    fn first_reason_wins() {
        let signal = AbortSignal::new();
        let clone = signal.clone();
        assert!(clone.trip("session expired"));
        assert!(!signal.trip("second"));
        assert!(signal.is_tripped());
        assert_eq!(signal.reason(), Some("session expired"));
    }
}
