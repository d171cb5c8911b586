//! Discover subcommand - scan a grower number range and fetch season history

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;

use seasonscan_core::{RetryConfig, SharedProgress, Stats};
use seasonscan_engine::{
    Backend, BatchOrchestrator, IdentifierRange, Period, PeriodRange, ScanConfig, Scheduler,
};
use seasonscan_portal::{Credentials, HtmlReportParser, PortalClient};
use seasonscan_store::DirStore;

use super::parse_identifier;
use crate::config::{Config, PASSWORD_ENV, USERNAME_ENV};

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// First grower number (e.g. V100000; a bare number takes the configured prefix)
    #[arg(long)]
    pub start: String,

    /// Last grower number, inclusive
    #[arg(long)]
    pub end: String,

    /// Identifiers per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Maximum lookups in flight
    #[arg(long)]
    pub concurrent: Option<usize>,

    /// Minimum milliseconds between two dispatches
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Retries after the first attempt for timeouts and network errors
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Base retry delay in milliseconds (grows linearly per attempt)
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Only find first seasons, skip the history fetch
    #[arg(long)]
    pub discover_only: bool,

    /// Skip growers already in the store
    #[arg(long)]
    pub resume: bool,

    /// Scheduling backend: cooperative or thread-pool
    #[arg(long)]
    pub backend: Option<Backend>,

    /// Portal username (password comes from config or SEASONSCAN_PASSWORD)
    #[arg(long)]
    pub username: Option<String>,

    /// First season to probe
    #[arg(long)]
    pub start_period: Option<Period>,

    /// Last season to probe
    #[arg(long)]
    pub current_period: Option<Period>,

    /// Data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,
}

pub fn run(args: DiscoverArgs, config: &Config, progress: &SharedProgress) -> Result<()> {
    let scan = scan_config(&args, config)?;
    let backend = args.backend.unwrap_or(config.scan.backend);
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| config.store.data_dir.clone());
    let credentials = credentials(&args, config)?;

    let store = DirStore::new(&data_dir)?;
    let cleaned = store.cleanup_tmp()?;
    if cleaned > 0 {
        log::info!("Removed {cleaned} unfinished writes from an earlier run");
    }
    log::info!("Store: {}", data_dir.display());

    let scheduler = Scheduler::new(backend, scan.concurrency)?;
    // The session's connections belong to the scheduler's runtime
    let client = scheduler
        .block_on(PortalClient::login(&config.portal(), &credentials))
        .context("Login failed")?;

    let stats = Arc::new(Stats::new());
    let mut orchestrator = BatchOrchestrator::new(
        scan,
        scheduler,
        client,
        HtmlReportParser::new(),
        store,
        stats,
    )
    .with_progress(progress.clone());

    let result = orchestrator.run();
    // Partial totals are still worth showing after an abort
    let summary = orchestrator.summary();
    if progress.is_tty() {
        progress.println(format!("\n{}", summary.format_table()));
    } else {
        summary.log();
    }
    result.map(|_| ()).context("Scan did not finish")
}

fn scan_config(args: &DiscoverArgs, config: &Config) -> Result<ScanConfig> {
    let prefix = &config.scan.prefix;
    let start = parse_identifier(&args.start, prefix)?;
    let end = parse_identifier(&args.end, prefix)?;
    if start.prefix() != end.prefix() {
        bail!("--start {start} and --end {end} have different prefixes");
    }
    if start.number() > end.number() {
        bail!("--start {start} is after --end {end}");
    }

    let first = args.start_period.unwrap_or(config.scan.start_period);
    let last = args
        .current_period
        .unwrap_or_else(|| config.scan.current_period());
    let periods = PeriodRange::new(first, last)
        .with_context(|| format!("first season {first} is after last season {last}"))?;

    let mut scan = ScanConfig::new(
        IdentifierRange::new(start.prefix(), start.number(), end.number()),
        periods,
    );
    scan.batch_size = args.batch_size.unwrap_or(config.scan.batch_size).max(1);
    scan.concurrency = args.concurrent.unwrap_or(config.scan.concurrency).max(1);
    scan.request_delay = args
        .delay_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.scan.delay());
    scan.retry = RetryConfig::new(
        args.max_retries.unwrap_or(config.scan.max_retries),
        args.retry_delay_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.scan.retry_delay()),
    );
    scan.discover_only = args.discover_only;
    scan.resume = args.resume;
    Ok(scan)
}

fn credentials(args: &DiscoverArgs, config: &Config) -> Result<Credentials> {
    let username = args
        .username
        .clone()
        .or_else(|| config.portal.username.clone())
        .with_context(|| format!("No username: pass --username, set [portal].username or {USERNAME_ENV}"))?;
    let password = config
        .portal
        .password
        .clone()
        .with_context(|| format!("No password: set [portal].password or {PASSWORD_ENV}"))?;
    Ok(Credentials::new(username, password))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: DiscoverArgs,
    }

    fn args(extra: &[&str]) -> DiscoverArgs {
        let mut argv = vec!["seasonscan"];
        argv.extend_from_slice(extra);
        Wrapper::parse_from(argv).args
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.scan.current_period = Some(2024);
        config
    }

    #[test]
    fn flags_override_config() {
        let a = args(&[
            "--start", "V100", "--end", "150", "--batch-size", "10", "--concurrent", "2",
            "--delay-ms", "0", "--max-retries", "5", "--resume",
        ]);
        let scan = scan_config(&a, &config()).unwrap();
        assert_eq!(scan.range, IdentifierRange::new("V", 100, 150));
        assert_eq!(scan.batch_size, 10);
        assert_eq!(scan.concurrency, 2);
        assert_eq!(scan.request_delay, Duration::ZERO);
        assert_eq!(scan.retry.max_retries, 5);
        assert_eq!(scan.periods.start(), 2018);
        assert_eq!(scan.periods.current(), 2024);
        assert!(scan.resume && !scan.discover_only);
    }

    #[test]
    fn config_fills_missing_flags() {
        let scan = scan_config(&args(&["--start", "V1", "--end", "V9"]), &config()).unwrap();
        assert_eq!(scan.batch_size, 100);
        assert_eq!(scan.concurrency, 6);
        assert_eq!(scan.request_delay, Duration::from_millis(400));
    }

    #[test]
    fn rejects_bad_ranges() {
        let cfg = config();
        assert!(scan_config(&args(&["--start", "V9", "--end", "V1"]), &cfg).is_err());
        assert!(scan_config(&args(&["--start", "V1", "--end", "W9"]), &cfg).is_err());
        assert!(
            scan_config(
                &args(&["--start", "V1", "--end", "V9", "--start-period", "2025"]),
                &cfg
            )
            .is_err()
        );
    }

    #[test]
    fn password_must_be_configured() {
        let mut cfg = config();
        cfg.portal.username = Some("clerk".into());
        cfg.portal.password = None;
        assert!(credentials(&args(&["--start", "1", "--end", "2"]), &cfg).is_err());

        cfg.portal.password = Some("secret".into());
        let creds = credentials(&args(&["--start", "1", "--end", "2", "--username", "other"]), &cfg)
            .unwrap();
        assert_eq!(creds.username(), "other");
    }

    #[test]
    fn backend_flag_parses() {
        let a = args(&["--start", "1", "--end", "2", "--backend", "thread-pool"]);
        assert_eq!(a.backend, Some(Backend::ThreadPool));
    }
}
