//! Per-worker and per-run reports

use crate::leech::distributor::Pagination;
use crate::leech::fetcher::Match;
use chrono::{DateTime, Utc};
use std::fmt;

/// Why a worker stopped pulling pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The queue drained or the page limit was reached
    Exhausted,

    /// The stop signal was observed before taking another page
    Cancelled,

    /// The search endpoint answered with a non-200 status
    Rejected { page: u32, status: u16 },

    /// A 200 response whose body could not be decoded
    Malformed { page: u32, error: String },

    /// The request failed at the network level (including timeouts)
    Transport { page: u32, error: String },

    /// The streaming receiver was dropped
    SinkClosed { page: u32 },
}

impl StopReason {
    /// Returns true if the worker stopped because a page failed
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. } | Self::Malformed { .. } | Self::Transport { .. }
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "no pages left"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Rejected { page, status } => write!(f, "page {} returned HTTP {}", page, status),
            Self::Malformed { page, error } => write!(f, "page {} malformed: {}", page, error),
            Self::Transport { page, error } => write!(f, "page {} failed: {}", page, error),
            Self::SinkClosed { page } => write!(f, "output closed after page {}", page),
        }
    }
}

/// What one worker did before it stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    /// Index of the worker within the pool
    pub worker_id: usize,

    /// Every page this worker requested, in request order
    pub pages_fetched: Vec<u32>,

    /// Pages that returned matches
    pub pages_succeeded: u32,

    /// Number of matches this worker produced
    pub match_count: usize,

    /// Why the worker exited
    pub stop_reason: StopReason,
}

impl WorkerReport {
    /// Creates an empty report for a worker that has not fetched anything yet
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            pages_fetched: Vec::new(),
            pages_succeeded: 0,
            match_count: 0,
            stop_reason: StopReason::Exhausted,
        }
    }
}

/// Outcome of one leech run
#[derive(Debug, Clone)]
pub struct LeechReport {
    /// The query that was searched
    pub query: String,

    /// Policy the run used
    pub pagination: Pagination,

    /// When workers were launched
    pub started_at: DateTime<Utc>,

    /// When the last worker exited
    pub finished_at: DateTime<Utc>,

    /// Worker reports in completion order
    pub workers: Vec<WorkerReport>,

    /// Buffered matches in worker-completion order (bulk only; empty when streaming)
    pub matches: Vec<Match>,

    /// Total matches produced, buffered or streamed
    pub match_count: usize,

    /// Whether the stop signal was raised during the run
    pub cancelled: bool,
}

impl LeechReport {
    /// All page numbers requested across workers, sorted
    pub fn pages_requested(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self
            .workers
            .iter()
            .flat_map(|w| w.pages_fetched.iter().copied())
            .collect();
        pages.sort_unstable();
        pages
    }

    /// Number of pages that returned matches
    pub fn pages_succeeded(&self) -> u32 {
        self.workers.iter().map(|w| w.pages_succeeded).sum()
    }

    /// Workers that stopped on a failing page
    pub fn failures(&self) -> impl Iterator<Item = &StopReason> {
        self.workers
            .iter()
            .map(|w| &w.stop_reason)
            .filter(|r| r.is_failure())
    }

    /// Returns true if the run produced no matches at all
    pub fn is_empty(&self) -> bool {
        self.match_count == 0
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
