//! Lookup counters shared by every worker of a run.
//!
//! All counters are plain atomics: they are safe under the thread-pool
//! backend and cost nothing extra under the cooperative one. Readers take a
//! [`StatsSnapshot`] and report from that.

use std::sync::atomic::{AtomicU64, Ordering};

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::progress::fmt_num;

/// Concurrency-safe lookup counters.
#[derive(Debug, Default)]
pub struct Stats {
    /// Physical requests dispatched to the portal
    requests: AtomicU64,
    /// Logical lookups that resolved (present or absent)
    successes: AtomicU64,
    /// Subset of `successes` where the portal had no record
    absent: AtomicU64,
    /// Logical lookups that ended in a terminal failure
    failures: AtomicU64,
    /// Extra attempts spent on transient failures
    retries: AtomicU64,
    /// Identifiers whose first period was found
    discoveries: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_absent(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.absent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discovery(&self) {
        self.discoveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            absent: self.absent.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            discoveries: self.discoveries.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub successes: u64,
    pub absent: u64,
    pub failures: u64,
    pub retries: u64,
    pub discoveries: u64,
}

impl StatsSnapshot {
    /// Resolved lookups as a percentage of physical requests.
    pub fn success_rate(&self) -> f64 {
        pct(self.successes, self.requests)
    }

    /// Counter growth since an earlier snapshot.
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.saturating_sub(earlier.requests),
            successes: self.successes.saturating_sub(earlier.successes),
            absent: self.absent.saturating_sub(earlier.absent),
            failures: self.failures.saturating_sub(earlier.failures),
            retries: self.retries.saturating_sub(earlier.retries),
            discoveries: self.discoveries.saturating_sub(earlier.discoveries),
        }
    }

    pub fn format_table(&self) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new("Lookups")
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Value").fg(Color::Cyan),
            ]);

        table.add_row(vec![
            Cell::new("Requests"),
            Cell::new(fmt_num(self.requests as usize)),
        ]);
        table.add_row(vec![
            Cell::new("Resolved"),
            Cell::new(fmt_num(self.successes as usize)),
        ]);
        table.add_row(vec![
            Cell::new("  no record"),
            Cell::new(fmt_num(self.absent as usize)),
        ]);
        table.add_row(vec![
            Cell::new("Failed").fg(Color::Red),
            Cell::new(fmt_num(self.failures as usize)).fg(Color::Red),
        ]);
        table.add_row(vec![
            Cell::new("Retries"),
            Cell::new(fmt_num(self.retries as usize)),
        ]);
        table.add_row(vec![
            Cell::new("Discovered").fg(Color::Green),
            Cell::new(fmt_num(self.discoveries as usize)).fg(Color::Green),
        ]);
        table.add_row(vec![
            Cell::new("Success rate"),
            Cell::new(format!("{:.1}%", self.success_rate())),
        ]);

        format!("\n{table}")
    }

    pub fn log(&self) {
        log::info!(
            "lookups: {} requests, {} resolved ({} no record), {} failed, {} retries, {} discovered, {:.1}% success",
            fmt_num(self.requests as usize),
            fmt_num(self.successes as usize),
            fmt_num(self.absent as usize),
            fmt_num(self.failures as usize),
            fmt_num(self.retries as usize),
            fmt_num(self.discoveries as usize),
            self.success_rate()
        );
    }
}

/// Percentage helper (0 when total is 0)
pub fn pct(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn counters_accumulate() {
        let stats = Stats::new();
        stats.record_request();
        stats.record_request();
        stats.record_success();
        stats.record_absent();
        stats.record_failure();
        stats.record_retry();
        stats.record_discovery();

        let snap = stats.snapshot();
        assert_eq!(snap.requests, 2);
        assert_eq!(snap.successes, 2);
        assert_eq!(snap.absent, 1);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.retries, 1);
        assert_eq!(snap.discoveries, 1);
    }

    #[test]
    fn success_rate_zero_requests() {
        assert_eq!(StatsSnapshot::default().success_rate(), 0.0);
    }

    #[test]
    fn success_rate_normal() {
        let snap = StatsSnapshot {
            requests: 8,
            successes: 6,
            ..Default::default()
        };
        assert!((snap.success_rate() - 75.0).abs() < 0.001);
    }

    #[test]
    fn since_subtracts() {
        let before = StatsSnapshot {
            requests: 10,
            retries: 2,
            ..Default::default()
        };
        let after = StatsSnapshot {
            requests: 15,
            retries: 5,
            failures: 1,
            ..Default::default()
        };
        let delta = after.since(&before);
        assert_eq!(delta.requests, 5);
        assert_eq!(delta.retries, 3);
        assert_eq!(delta.failures, 1);
    }

    #[test]
    fn concurrent_increments() {
        let stats = Arc::new(Stats::new());
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        stats.record_request();
                    }
                });
            }
        });
        assert_eq!(stats.snapshot().requests, 8000);
    }

    #[test]
    fn table_mentions_rate() {
        let snap = StatsSnapshot {
            requests: 4,
            successes: 2,
            ..Default::default()
        };
        assert!(snap.format_table().contains("50.0%"));
    }
}
