//! Result aggregation
//!
//! Each worker owns a `ResultSink`. In bulk mode the sink buffers matches and the
//! `Aggregator` concatenates worker buffers as workers finish. In streaming mode
//! the sink forwards every page's matches to a channel the moment they arrive.

use crate::leech::distributor::Pagination;
use crate::leech::fetcher::Match;
use crate::leech::report::{LeechReport, WorkerReport};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Matches from one page, as delivered to a streaming consumer
#[derive(Debug, Clone, PartialEq)]
pub struct PageBatch {
    /// Page number the matches came from
    pub page: u32,

    /// The page's matches, in server order
    pub matches: Vec<Match>,
}

/// Where a worker puts the matches of each page it fetches
#[derive(Debug)]
pub enum ResultSink {
    /// Keep matches until the worker finishes
    Buffer(Vec<Match>),

    /// Send each page's matches straight to the consumer
    Stream(mpsc::Sender<PageBatch>),
}

impl ResultSink {
    /// Accepts one page's matches
    ///
    /// Returns false if the streaming consumer has gone away.
    pub async fn accept(&mut self, page: u32, matches: Vec<Match>) -> bool {
        match self {
            Self::Buffer(buffer) => {
                buffer.extend(matches);
                true
            }
            Self::Stream(tx) => tx.send(PageBatch { page, matches }).await.is_ok(),
        }
    }

    /// Hands back buffered matches; a streaming sink has none
    pub fn into_matches(self) -> Vec<Match> {
        match self {
            Self::Buffer(buffer) => buffer,
            Self::Stream(_) => Vec::new(),
        }
    }
}

/// What a worker task returns when it exits
#[derive(Debug)]
pub struct WorkerOutput {
    pub report: WorkerReport,
    pub matches: Vec<Match>,
}

/// Collects worker outputs into a `LeechReport`
#[derive(Debug)]
pub struct Aggregator {
    query: String,
    pagination: Pagination,
    started_at: DateTime<Utc>,
    workers: Vec<WorkerReport>,
    matches: Vec<Match>,
    match_count: usize,
}

impl Aggregator {
    /// Starts aggregating a run that begins now
    pub fn new(query: &str, pagination: Pagination) -> Self {
        Self {
            query: query.to_string(),
            pagination,
            started_at: Utc::now(),
            workers: Vec::new(),
            matches: Vec::new(),
            match_count: 0,
        }
    }

    /// Folds in one finished worker, preserving arrival order
    pub fn absorb(&mut self, output: WorkerOutput) {
        self.match_count += output.report.match_count;
        self.matches.extend(output.matches);
        self.workers.push(output.report);
    }

    /// Finalizes the report
    pub fn finish(self, cancelled: bool) -> LeechReport {
        LeechReport {
            query: self.query,
            pagination: self.pagination,
            started_at: self.started_at,
            finished_at: Utc::now(),
            workers: self.workers,
            matches: self.matches,
            match_count: self.match_count,
            cancelled,
        }
    }
}
