//! Batch driver: discovery then full-history fetch over an identifier range

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use log::{debug, error, info, warn};
use seasonscan_core::{
    AbortSignal, DispatchGate, ProgressContext, RetryConfig, SharedProgress, Stats,
    StatsSnapshot, fmt_elapsed, fmt_num,
};

use crate::backend::Scheduler;
use crate::discovery::{DiscoveryEngine, DiscoveryResult};
use crate::error::{RunAborted, RunError};
use crate::model::{Batch, Identifier, IdentifierRange, Period, PeriodRange};
use crate::parser::ReportParser;
use crate::report::{Grower, SeasonalReport, StructuredReport};
use crate::retry::{FetchOutcome, RetryPolicy};
use crate::store::Store;
use crate::transport::{Dispatcher, Transport};

/// Everything that shapes one scan run.
#[derive(Clone, Debug)]
pub struct ScanConfig {
    pub range: IdentifierRange,
    pub periods: PeriodRange,
    pub batch_size: usize,
    /// In-flight request ceiling
    pub concurrency: usize,
    /// Minimum spacing between two dispatches
    pub request_delay: Duration,
    pub retry: RetryConfig,
    /// Stop after persisting each grower's first season
    pub discover_only: bool,
    /// Skip identifiers that already have a stored grower
    pub resume: bool,
}

impl ScanConfig {
    pub fn new(range: IdentifierRange, periods: PeriodRange) -> Self {
        Self {
            range,
            periods,
            batch_size: 100,
            concurrency: 6,
            request_delay: Duration::from_millis(400),
            retry: RetryConfig::default(),
            discover_only: false,
            resume: false,
        }
    }
}

/// Where a run is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    /// Working on the batch with this index
    Running(usize),
    Complete,
    Aborted,
}

/// Metrics for one finished batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    pub index: usize,
    pub candidates: usize,
    /// Identifiers dropped because the store already has them
    pub skipped: usize,
    pub discovered: usize,
    pub growers_saved: usize,
    pub reports_saved: usize,
    pub elapsed: Duration,
    /// Success rate of this batch's lookups alone
    pub success_rate: f64,
}

impl BatchReport {
    pub fn log(&self, total_batches: usize) {
        info!(
            "batch {}/{}: {} candidates ({} skipped), {} discovered, {} reports saved in {}, {:.1}% success",
            self.index + 1,
            total_batches,
            fmt_num(self.candidates),
            fmt_num(self.skipped),
            fmt_num(self.discovered),
            fmt_num(self.reports_saved),
            fmt_elapsed(self.elapsed),
            self.success_rate
        );
    }
}

/// Totals for a whole run.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub batches: usize,
    pub candidates: usize,
    pub skipped: usize,
    pub discovered: usize,
    pub growers_saved: usize,
    pub reports_saved: usize,
    pub elapsed: Duration,
    pub stats: StatsSnapshot,
}

impl RunSummary {
    fn add(&mut self, batch: &BatchReport) {
        self.batches += 1;
        self.candidates += batch.candidates;
        self.skipped += batch.skipped;
        self.discovered += batch.discovered;
        self.growers_saved += batch.growers_saved;
        self.reports_saved += batch.reports_saved;
    }

    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Scan")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        table.add_row(vec![Cell::new("Batches"), Cell::new(fmt_num(self.batches))]);
        table.add_row(vec![
            Cell::new("Candidates"),
            Cell::new(fmt_num(self.candidates)),
        ]);
        table.add_row(vec![
            Cell::new("  already stored"),
            Cell::new(fmt_num(self.skipped)),
        ]);
        table.add_row(vec![
            Cell::new("Discovered").fg(Color::Green),
            Cell::new(fmt_num(self.discovered)).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Growers saved"),
            Cell::new(fmt_num(self.growers_saved)),
        ]);
        table.add_row(vec![
            Cell::new("Reports saved"),
            Cell::new(fmt_num(self.reports_saved)),
        ]);
        table.add_row(vec![
            Cell::new("Elapsed"),
            Cell::new(fmt_elapsed(self.elapsed)),
        ]);

        format!("\n{table}{}", self.stats.format_table())
    }

    pub fn log(&self) {
        info!(
            "scan finished in {}: {} batches, {} candidates ({} already stored), {} discovered, {} growers and {} reports saved",
            fmt_elapsed(self.elapsed),
            fmt_num(self.batches),
            fmt_num(self.candidates),
            fmt_num(self.skipped),
            fmt_num(self.discovered),
            fmt_num(self.growers_saved),
            fmt_num(self.reports_saved),
        );
        self.stats.log();
    }
}

/// Drives an identifier range through discovery and history fetch, batch by
/// batch, using the store for resume and idempotency.
pub struct BatchOrchestrator<T, P, S> {
    config: ScanConfig,
    scheduler: Scheduler,
    engine: DiscoveryEngine<T, P>,
    store: S,
    stats: Arc<Stats>,
    progress: SharedProgress,
    state: RunState,
    summary: RunSummary,
}

impl<T, P, S> BatchOrchestrator<T, P, S>
where
    T: Transport,
    P: ReportParser,
    S: Store,
{
    /// Wire the lookup stack: one gate and one abort signal for the whole
    /// run, shared by every lookup regardless of backend.
    pub fn new(
        config: ScanConfig,
        scheduler: Scheduler,
        transport: T,
        parser: P,
        store: S,
        stats: Arc<Stats>,
    ) -> Self {
        let gate = DispatchGate::new(config.concurrency, config.request_delay);
        let dispatcher = Dispatcher::new(transport, gate, Arc::clone(&stats), AbortSignal::new());
        let retry = RetryPolicy::new(dispatcher, parser, config.retry);
        let engine = DiscoveryEngine::new(retry, config.periods);
        Self {
            config,
            scheduler,
            engine,
            store,
            stats,
            progress: Arc::new(ProgressContext::hidden()),
            state: RunState::Idle,
            summary: RunSummary::default(),
        }
    }

    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Totals so far; complete once `run` returns.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn transport(&self) -> &T {
        self.dispatcher().transport()
    }

    /// Highest number of lookups in flight at once during this run.
    pub fn peak_in_flight(&self) -> usize {
        self.dispatcher().gate().peak_in_flight()
    }

    fn dispatcher(&self) -> &Dispatcher<T> {
        self.engine.retry_policy().dispatcher()
    }

    /// Process every batch of the range.
    ///
    /// Per-lookup failures are counted and skipped; only an authentication
    /// failure (or a store that cannot answer resume queries) ends the run
    /// early.
    pub fn run(&mut self) -> Result<RunSummary, RunError> {
        let start = Instant::now();
        let total_batches = self.config.range.batch_count(self.config.batch_size);
        info!(
            "Scanning {}{}..{}{} ({} identifiers, {} batches), seasons {}..={}, {} in flight, {} backend",
            self.config.range.prefix,
            self.config.range.start,
            self.config.range.prefix,
            self.config.range.end,
            fmt_num(self.config.range.len() as usize),
            fmt_num(total_batches),
            self.config.periods.start(),
            self.config.periods.current(),
            self.config.concurrency,
            self.scheduler.backend(),
        );

        let bar = self.progress.range_bar("range", self.config.range.len());
        let line = self.progress.stage_line("scan");

        let batches: Vec<Batch> = self.config.range.batches(self.config.batch_size).collect();
        let mut result = Ok(());
        for batch in &batches {
            self.state = RunState::Running(batch.index);
            line.set_message(format!(
                "batch {}/{} ({}..{})",
                batch.index + 1,
                total_batches,
                batch.first().map(ToString::to_string).unwrap_or_default(),
                batch.last().map(ToString::to_string).unwrap_or_default(),
            ));

            let outcome = self.run_batch(batch);
            bar.inc(batch.identifiers.len() as u64);
            match outcome {
                Ok(report) => {
                    self.summary.add(&report);
                    if self.progress.is_tty() {
                        debug!("batch {} done", batch.index + 1);
                    } else {
                        report.log(total_batches);
                    }
                }
                Err((report, e)) => {
                    if let Some(report) = report {
                        self.summary.add(&report);
                    }
                    result = Err(e);
                    break;
                }
            }
        }

        bar.finish_and_clear();
        line.finish_and_clear();
        self.summary.elapsed = start.elapsed();
        self.summary.stats = self.stats.snapshot();

        match result {
            Ok(()) => {
                self.state = RunState::Complete;
                Ok(self.summary.clone())
            }
            Err(e) => {
                self.state = RunState::Aborted;
                error!("Scan stopped: {e}");
                Err(e)
            }
        }
    }

    /// One batch, steps 1 to 5. On error, whatever was already persisted in
    /// the batch is still reported.
    fn run_batch(
        &self,
        batch: &Batch,
    ) -> Result<BatchReport, (Option<BatchReport>, RunError)> {
        let start = Instant::now();
        let before = self.stats.snapshot();
        let mut report = BatchReport {
            index: batch.index,
            candidates: batch.identifiers.len(),
            ..Default::default()
        };

        let pending = self.pending(batch).map_err(|e| (None, e))?;
        report.skipped = report.candidates - pending.len();
        if pending.is_empty() {
            debug!("batch {}: every identifier already stored", batch.index + 1);
            report.elapsed = start.elapsed();
            report.success_rate = self.stats.snapshot().since(&before).success_rate();
            return Ok(report);
        }

        let engine = &self.engine;
        let results = self
            .scheduler
            .run_all(&pending, move |id| engine.discover(id));

        let mut aborted = None;
        let mut found = Vec::new();
        for r in results {
            match r {
                Ok(Some(d)) => found.push(d),
                Ok(None) => {}
                Err(e) => aborted = Some(e),
            }
        }
        found.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        report.discovered = found.len();

        let growers: Vec<(Grower, Period)> = found
            .iter()
            .filter_map(|d| self.persist_discovery(d, &mut report))
            .collect();

        let finish = |mut report: BatchReport| {
            report.elapsed = start.elapsed();
            report.success_rate = self.stats.snapshot().since(&before).success_rate();
            report
        };

        if let Some(e) = aborted {
            return Err((Some(finish(report)), e.into()));
        }
        if self.config.discover_only || growers.is_empty() {
            return Ok(finish(report));
        }

        if let Err(e) = self.fetch_history(&growers, &mut report) {
            return Err((Some(finish(report)), e));
        }
        Ok(finish(report))
    }

    /// Batch identifiers still to probe (resume drops stored growers).
    fn pending(&self, batch: &Batch) -> Result<Vec<Identifier>, RunError> {
        if !self.config.resume {
            return Ok(batch.identifiers.clone());
        }
        let mut pending = Vec::with_capacity(batch.identifiers.len());
        for id in &batch.identifiers {
            if !self.store.grower_exists(id).map_err(RunError::Store)? {
                pending.push(id.clone());
            }
        }
        Ok(pending)
    }

    /// Save grower and first season. Returns the grower for history fetch,
    /// or `None` if the grower could not be written.
    fn persist_discovery(
        &self,
        found: &DiscoveryResult,
        report: &mut BatchReport,
    ) -> Option<(Grower, Period)> {
        let identity = found.report.grower_identity(&found.identifier);
        let grower = match self.store.upsert_grower(&identity) {
            Ok((grower, upsert)) => {
                if upsert.inserted() {
                    report.growers_saved += 1;
                }
                grower
            }
            Err(e) => {
                error!("{}: failed to save grower: {e:#}", found.identifier);
                return None;
            }
        };
        self.persist_season(&grower, found.first_period, &found.report, report);
        Some((grower, found.first_period))
    }

    fn persist_season(
        &self,
        grower: &Grower,
        period: Period,
        structured: &StructuredReport,
        report: &mut BatchReport,
    ) {
        let season = SeasonalReport::from_report(grower, period, structured);
        match self.store.upsert_seasonal_report(grower, &season) {
            Ok(upsert) if upsert.inserted() => report.reports_saved += 1,
            Ok(_) => debug!("{} season {period}: already stored", grower.id()),
            Err(e) => error!("{} season {period}: failed to save report: {e:#}", grower.id()),
        }
    }

    /// Fetch every season after the first that the store does not have yet.
    fn fetch_history(
        &self,
        growers: &[(Grower, Period)],
        report: &mut BatchReport,
    ) -> Result<(), RunError> {
        let mut tasks: Vec<(Grower, Period)> = Vec::new();
        for (grower, first) in growers {
            let persisted: BTreeSet<Period> = self
                .store
                .periods_persisted(grower.id())
                .map_err(RunError::Store)?;
            tasks.extend(
                self.config
                    .periods
                    .after(*first)
                    .filter(|p| !persisted.contains(p))
                    .map(|p| (grower.clone(), p)),
            );
        }
        if tasks.is_empty() {
            return Ok(());
        }
        debug!(
            "batch {}: fetching {} missing seasons",
            report.index + 1,
            tasks.len()
        );

        let engine = &self.engine;
        let results = self.scheduler.run_all(&tasks, move |task| async move {
            let (grower, period) = task;
            (grower, *period, engine.fetch(grower.id(), *period).await)
        });

        let mut aborted: Option<RunAborted> = None;
        let mut failed = 0usize;
        for (grower, period, outcome) in results {
            match outcome {
                // Saved even without a name so reruns do not fetch it again
                Ok(FetchOutcome::Present(structured)) => {
                    self.persist_season(grower, period, &structured, report);
                }
                Ok(FetchOutcome::Absent) => {
                    debug!("{} season {period}: no record", grower.id());
                }
                Ok(FetchOutcome::Failed(_)) => failed += 1,
                Err(e) => aborted = Some(e),
            }
        }
        if failed > 0 {
            warn!(
                "batch {}: {failed} season lookups failed, skipped for this run",
                report.index + 1
            );
        }
        match aborted {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
