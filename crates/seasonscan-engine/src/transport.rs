//! Transport seam and the gated dispatcher every lookup goes through

use std::sync::Arc;

use seasonscan_core::{AbortSignal, DispatchGate, Stats};

use crate::error::{RunAborted, TransportError};
use crate::model::{LookupRequest, RawResponse};

/// Authenticated request channel to the portal.
///
/// Implementations only move bytes; pacing, the in-flight ceiling, request
/// counting and abort handling live in [`Dispatcher`]. Futures are driven on
/// the thread that awaits them, so they need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait Transport: Sync {
    async fn fetch(&self, request: &LookupRequest) -> Result<RawResponse, TransportError>;
}

impl<T: Transport> Transport for &T {
    async fn fetch(&self, request: &LookupRequest) -> Result<RawResponse, TransportError> {
        (**self).fetch(request).await
    }
}

/// Outcome of one physical dispatch.
#[derive(Debug)]
pub enum DispatchError {
    /// Retryable or terminal transport failure for this request only.
    Transport(TransportError),
    /// The run is aborted; nothing was (or will be) sent.
    Aborted(RunAborted),
}

/// Wraps a [`Transport`] with the run's gate, counters and abort signal.
pub struct Dispatcher<T> {
    transport: T,
    gate: DispatchGate,
    stats: Arc<Stats>,
    abort: AbortSignal,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T, gate: DispatchGate, stats: Arc<Stats>, abort: AbortSignal) -> Self {
        Self {
            transport,
            gate,
            stats,
            abort,
        }
    }

    /// Send one request once the gate allows it.
    ///
    /// An `Auth` failure trips the abort signal and closes the gate, so no
    /// further request leaves this dispatcher. Results that arrive after the
    /// abort are discarded.
    pub async fn dispatch(&self, request: &LookupRequest) -> Result<RawResponse, DispatchError> {
        let Some(_permit) = self.gate.acquire().await else {
            return Err(DispatchError::Aborted(self.aborted()));
        };
        if self.abort.is_tripped() {
            return Err(DispatchError::Aborted(self.aborted()));
        }

        self.stats.record_request();
        let result = self.transport.fetch(request).await;

        if self.abort.is_tripped() {
            return Err(DispatchError::Aborted(self.aborted()));
        }
        match result {
            Ok(raw) => Ok(raw),
            Err(TransportError::Auth(reason)) => {
                if self.abort.trip(reason.clone()) {
                    log::error!("{request}: authentication lost ({reason}), aborting run");
                }
                self.gate.close();
                Err(DispatchError::Aborted(self.aborted()))
            }
            Err(e) => Err(DispatchError::Transport(e)),
        }
    }

    fn aborted(&self) -> RunAborted {
        RunAborted {
            reason: self
                .abort
                .reason()
                .unwrap_or("run aborted")
                .to_string(),
        }
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    pub fn gate(&self) -> &DispatchGate {
        &self.gate
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Identifier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Scripted {
        calls: AtomicUsize,
        fail_auth_on: usize,
    }

    impl Transport for Scripted {
        async fn fetch(&self, _request: &LookupRequest) -> Result<RawResponse, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.fail_auth_on {
                Err(TransportError::Auth("Not logged in".into()))
            } else {
                Ok(RawResponse::new("ok"))
            }
        }
    }

    fn dispatcher(fail_auth_on: usize) -> Dispatcher<Scripted> {
        Dispatcher::new(
            Scripted {
                calls: AtomicUsize::new(0),
                fail_auth_on,
            },
            DispatchGate::new(1, Duration::ZERO),
            Arc::new(Stats::new()),
            AbortSignal::new(),
        )
    }

    fn block_on<F: std::future::Future>(f: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f)
    }

    #[test]
    fn counts_each_dispatch() {
        let d = dispatcher(0);
        let req = LookupRequest::new(Identifier::new("V", 1), 2020);
        block_on(async {
            d.dispatch(&req).await.unwrap();
            d.dispatch(&req).await.unwrap();
        });
        assert_eq!(d.stats().snapshot().requests, 2);
        assert_eq!(d.gate().peak_in_flight(), 1);
    }

    #[test]
    fn auth_failure_stops_further_requests() {
        let d = dispatcher(2);
        let req = LookupRequest::new(Identifier::new("V", 1), 2020);
        block_on(async {
            assert!(d.dispatch(&req).await.is_ok());
            assert!(matches!(
                d.dispatch(&req).await,
                Err(DispatchError::Aborted(_))
            ));
            assert!(matches!(
                d.dispatch(&req).await,
                Err(DispatchError::Aborted(_))
            ));
        });
        assert_eq!(d.transport().calls.load(Ordering::SeqCst), 2);
        assert!(d.abort_signal().is_tripped());
        assert_eq!(d.abort_signal().reason(), Some("Not logged in"));
    }
}
