//! One logical lookup: dispatch, parse, and retry transient failures

use log::{debug, warn};
use seasonscan_core::RetryConfig;

use crate::error::{LookupFailure, RunAborted};
use crate::model::{Identifier, LookupRequest, Period, RawResponse};
use crate::parser::{Parsed, ReportParser};
use crate::report::StructuredReport;
use crate::transport::{DispatchError, Dispatcher, Transport};

/// Terminal result of one logical lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchOutcome {
    Present(StructuredReport),
    Absent,
    Failed(LookupFailure),
}

/// Bounded retry around a [`Dispatcher`] and a [`ReportParser`].
///
/// `Network`/`Timeout` errors are retried up to `max_retries` times with
/// linear backoff. `Absent` and parse errors are never retried. An abort
/// (authentication lost) is the only error that escapes.
pub struct RetryPolicy<T, P> {
    dispatcher: Dispatcher<T>,
    parser: P,
    config: RetryConfig,
}

impl<T: Transport, P: ReportParser> RetryPolicy<T, P> {
    pub fn new(dispatcher: Dispatcher<T>, parser: P, config: RetryConfig) -> Self {
        Self {
            dispatcher,
            parser,
            config,
        }
    }

    pub async fn attempt(
        &self,
        identifier: &Identifier,
        period: Period,
    ) -> Result<FetchOutcome, RunAborted> {
        let request = LookupRequest::new(identifier.clone(), period);
        let stats = self.dispatcher.stats();
        let mut attempt = 1;

        loop {
            let error = match self.dispatcher.dispatch(&request).await {
                Ok(raw) => return Ok(self.interpret(&request, &raw)),
                Err(DispatchError::Aborted(e)) => return Err(e),
                Err(DispatchError::Transport(e)) => e,
            };

            if error.is_retryable() && attempt <= self.config.max_retries {
                let delay = self.config.backoff(attempt);
                stats.record_retry();
                debug!(
                    "{request}: attempt {attempt}/{} failed ({error}), retrying in {delay:?}",
                    self.config.max_attempts()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            stats.record_failure();
            let failure = LookupFailure::Exhausted {
                attempts: attempt,
                last: error,
            };
            warn!("{request}: {failure}");
            return Ok(FetchOutcome::Failed(failure));
        }
    }

    fn interpret(&self, request: &LookupRequest, raw: &RawResponse) -> FetchOutcome {
        let stats = self.dispatcher.stats();
        match self.parser.parse(raw) {
            Ok(Parsed::Present(report)) => {
                stats.record_success();
                FetchOutcome::Present(report)
            }
            Ok(Parsed::Absent) => {
                stats.record_absent();
                FetchOutcome::Absent
            }
            Err(e) => {
                stats.record_failure();
                warn!("{request}: {e}");
                FetchOutcome::Failed(LookupFailure::Parse(e))
            }
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.dispatcher
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseError, TransportError};
    use seasonscan_core::{AbortSignal, DispatchGate, Stats};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Fails with a timeout for the first `failures` calls, then answers `body`.
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        body: &'static str,
    }

    impl Transport for Flaky {
        async fn fetch(&self, _request: &LookupRequest) -> Result<RawResponse, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(TransportError::Timeout("slow portal".into()))
            } else {
                Ok(RawResponse::new(self.body))
            }
        }
    }

    /// Body "" is absent, "?" is unparseable, anything else names the grower.
    struct Echo;

    impl ReportParser for Echo {
        fn parse(&self, raw: &RawResponse) -> Result<Parsed, ParseError> {
            match raw.body.as_str() {
                "" => Ok(Parsed::Absent),
                "?" => Err(ParseError::new("garbled")),
                name => {
                    let mut report = StructuredReport::default();
                    report.identity.insert("name".into(), name.into());
                    Ok(Parsed::Present(report))
                }
            }
        }
    }

    fn policy(failures: u32, body: &'static str) -> RetryPolicy<Flaky, Echo> {
        let dispatcher = Dispatcher::new(
            Flaky {
                calls: AtomicU32::new(0),
                failures,
                body,
            },
            DispatchGate::new(1, Duration::ZERO),
            Arc::new(Stats::new()),
            AbortSignal::new(),
        );
        RetryPolicy::new(dispatcher, Echo, RetryConfig::new(2, Duration::from_millis(1)))
    }

    fn run(policy: &RetryPolicy<Flaky, Echo>) -> FetchOutcome {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(policy.attempt(&Identifier::new("V", 1), 2020))
            .unwrap()
    }

    #[test]
    fn recovers_after_two_timeouts() {
        let p = policy(2, "Tendai");
        assert!(matches!(run(&p), FetchOutcome::Present(_)));
        let s = p.dispatcher().stats().snapshot();
        assert_eq!(s.retries, 2);
        assert_eq!(s.requests, 3);
        assert_eq!(s.successes, 1);
        assert_eq!(s.failures, 0);
    }

    #[test]
    fn gives_up_after_budget() {
        let p = policy(u32::MAX, "Tendai");
        match run(&p) {
            FetchOutcome::Failed(LookupFailure::Exhausted { attempts, .. }) => {
                assert_eq!(attempts, 3)
            }
            other => panic!("unexpected {other:?}"),
        }
        let s = p.dispatcher().stats().snapshot();
        assert_eq!(s.requests, 3);
        assert_eq!(s.failures, 1);
        assert_eq!(s.retries, 2);
    }

    #[test]
    fn absent_is_not_retried() {
        let p = policy(0, "");
        assert_eq!(run(&p), FetchOutcome::Absent);
        let s = p.dispatcher().stats().snapshot();
        assert_eq!(s.requests, 1);
        assert_eq!(s.absent, 1);
        assert_eq!(s.retries, 0);
    }

    #[test]
    fn parse_error_counts_once() {
        let p = policy(0, "?");
        assert!(matches!(
            run(&p),
            FetchOutcome::Failed(LookupFailure::Parse(_))
        ));
        let s = p.dispatcher().stats().snapshot();
        assert_eq!(s.requests, 1);
        assert_eq!(s.failures, 1);
        assert_eq!(s.retries, 0);
    }
}
