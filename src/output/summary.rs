//! Run summaries
//!
//! Turns a `LeechReport` into counts and prints them for the operator.

use crate::leech::{LeechReport, StopReason};
use std::collections::BTreeMap;

/// Aggregate counts derived from a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatistics {
    /// Pages handed to workers
    pub pages_requested: usize,

    /// Pages that returned matches
    pub pages_succeeded: u32,

    /// Matches produced, buffered or streamed
    pub match_count: usize,

    /// Worker exits grouped by reason (failures keyed by status/kind)
    pub exits: BTreeMap<String, usize>,

    /// Whether the run ended on the stop signal
    pub cancelled: bool,
}

impl RunStatistics {
    /// Returns true if the session authenticated but no page produced results
    ///
    /// Such a run is indistinguishable from a query with no hits, so it is
    /// surfaced as a warning rather than an error.
    pub fn looks_like_total_failure(&self) -> bool {
        self.pages_succeeded == 0 && self.pages_requested > 0
    }
}

/// Derives statistics from a report
pub fn summarize(report: &LeechReport) -> RunStatistics {
    let mut exits = BTreeMap::new();
    for worker in &report.workers {
        *exits.entry(exit_key(&worker.stop_reason)).or_insert(0) += 1;
    }

    RunStatistics {
        pages_requested: report.pages_requested().len(),
        pages_succeeded: report.pages_succeeded(),
        match_count: report.match_count,
        exits,
        cancelled: report.cancelled,
    }
}

fn exit_key(reason: &StopReason) -> String {
    match reason {
        StopReason::Exhausted => "exhausted".to_string(),
        StopReason::Cancelled => "cancelled".to_string(),
        StopReason::Rejected { status, .. } => format!("http {}", status),
        StopReason::Malformed { .. } => "malformed response".to_string(),
        StopReason::Transport { .. } => "network error".to_string(),
        StopReason::SinkClosed { .. } => "output closed".to_string(),
    }
}

/// Prints a run summary to stderr
pub fn print_summary(report: &LeechReport) {
    let stats = summarize(report);

    eprintln!("=== Leech Summary ===\n");
    eprintln!("Query: {}", report.query);
    eprintln!("Mode: {}", report.pagination);
    eprintln!(
        "Duration: {:.1}s",
        report.duration().num_milliseconds() as f64 / 1000.0
    );
    if stats.cancelled {
        eprintln!("Stopped early on request");
    }
    eprintln!();

    eprintln!("Pages:");
    eprintln!("  Requested: {}", stats.pages_requested);
    eprintln!("  Succeeded: {}", stats.pages_succeeded);
    eprintln!("  Matches: {}", stats.match_count);
    eprintln!();

    eprintln!("Worker Exits:");
    for (reason, count) in &stats.exits {
        eprintln!("  {}: {}", reason, count);
    }

    if stats.looks_like_total_failure() {
        eprintln!();
        tracing::warn!(
            "No page returned results; every request for '{}' was rejected or failed",
            report.query
        );
    }
}
