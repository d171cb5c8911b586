//! Per-identifier discovery: walk periods upward until a grower shows up

use log::debug;

use crate::error::RunAborted;
use crate::model::{Identifier, Period, PeriodRange};
use crate::parser::ReportParser;
use crate::report::StructuredReport;
use crate::retry::{FetchOutcome, RetryPolicy};
use crate::transport::Transport;

/// First period with data for one identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct DiscoveryResult {
    pub identifier: Identifier,
    pub first_period: Period,
    pub report: StructuredReport,
}

/// Discovery state of a single identifier.
#[derive(Clone, Debug, PartialEq)]
pub enum ProbeState {
    Probing(Period),
    Found(DiscoveryResult),
    Exhausted,
}

/// Next state after probing `period` and getting `outcome`.
///
/// Only a present report that names a grower counts. Absent, nameless, and
/// failed lookups all move on to the next period.
pub fn step(
    periods: &PeriodRange,
    identifier: &Identifier,
    period: Period,
    outcome: FetchOutcome,
) -> ProbeState {
    match outcome {
        FetchOutcome::Present(report) if report.has_identity() => {
            ProbeState::Found(DiscoveryResult {
                identifier: identifier.clone(),
                first_period: period,
                report,
            })
        }
        _ if period >= periods.current() => ProbeState::Exhausted,
        _ => ProbeState::Probing(period + 1),
    }
}

/// Runs the probe state machine for one identifier at a time.
///
/// Periods of one identifier are strictly sequential; callers get
/// concurrency by driving many `discover` futures at once.
pub struct DiscoveryEngine<T, P> {
    retry: RetryPolicy<T, P>,
    periods: PeriodRange,
}

impl<T: Transport, P: ReportParser> DiscoveryEngine<T, P> {
    pub fn new(retry: RetryPolicy<T, P>, periods: PeriodRange) -> Self {
        Self { retry, periods }
    }

    /// Smallest period in range with a named grower, or `None`.
    pub async fn discover(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<DiscoveryResult>, RunAborted> {
        let mut state = ProbeState::Probing(self.periods.start());
        loop {
            state = match state {
                ProbeState::Probing(period) => {
                    let outcome = self.retry.attempt(identifier, period).await?;
                    step(&self.periods, identifier, period, outcome)
                }
                ProbeState::Found(result) => {
                    self.retry.dispatcher().stats().record_discovery();
                    debug!("{identifier}: first season {}", result.first_period);
                    return Ok(Some(result));
                }
                ProbeState::Exhausted => return Ok(None),
            };
        }
    }

    /// Single lookup outside the probe loop (full-history fetch).
    pub async fn fetch(
        &self,
        identifier: &Identifier,
        period: Period,
    ) -> Result<FetchOutcome, RunAborted> {
        self.retry.attempt(identifier, period).await
    }

    pub fn periods(&self) -> &PeriodRange {
        &self.periods
    }

    pub fn retry_policy(&self) -> &RetryPolicy<T, P> {
        &self.retry
    }
}
