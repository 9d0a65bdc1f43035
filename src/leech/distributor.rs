//! Work distribution for the worker pool
//!
//! This module decides which page numbers get fetched:
//! - `Pagination::Bulk` pre-seeds a bounded queue with every page up to a ceiling
//! - `Pagination::Streaming` advances a shared counter up to a limit
//!
//! Both policies sit behind `PageDistributor::next_page`, which hands each page
//! number out at most once and refuses new work once the stop signal is raised.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// How pages are handed out and when the sequence ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Queue pages `1..=ceiling` up front; ends when the queue drains
    Bulk { ceiling: u32 },

    /// Count pages up from 1; ends once `limit` has been handed out
    Streaming { limit: u32 },
}

impl Pagination {
    /// Highest page number this policy can hand out
    pub fn max_page(&self) -> u32 {
        match self {
            Self::Bulk { ceiling } => *ceiling,
            Self::Streaming { limit } => *limit,
        }
    }
}

impl fmt::Display for Pagination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bulk { ceiling } => write!(f, "bulk (ceiling {})", ceiling),
            Self::Streaming { limit } => write!(f, "streaming (limit {})", limit),
        }
    }
}

/// Cooperative stop flag shared by the session and its workers
///
/// Raising it never aborts a request in flight; workers check it before
/// taking their next page.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    /// Creates a lowered stop signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag; idempotent
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Returns true once `stop` has been called on any clone
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// A single unit of work: the session's query plus one page number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// The search query, identical for every request in a session
    pub query: Arc<str>,

    /// Page number, starting at 1
    pub page: u32,
}

enum PageSource {
    Queue(Mutex<mpsc::Receiver<PageRequest>>),
    Counter { next: AtomicU64, limit: u32 },
}

/// Hands out page requests to concurrently running workers
pub struct PageDistributor {
    query: Arc<str>,
    source: PageSource,
    issued: AtomicU32,
    stop: StopSignal,
}

impl PageDistributor {
    /// Creates a distributor for `query` under the given policy
    ///
    /// # Arguments
    ///
    /// * `query` - The search query
    /// * `pagination` - Bulk ceiling or streaming limit
    /// * `stop` - Stop signal consulted before every hand-out
    pub fn new(query: &str, pagination: Pagination, stop: StopSignal) -> Self {
        let query: Arc<str> = Arc::from(query);

        let source = match pagination {
            Pagination::Bulk { ceiling } => {
                let (tx, rx) = mpsc::channel(ceiling.max(1) as usize);
                for page in 1..=ceiling {
                    let request = PageRequest {
                        query: Arc::clone(&query),
                        page,
                    };
                    // Capacity equals the ceiling, so this only fails if the
                    // receiver is gone, which it cannot be yet.
                    if tx.try_send(request).is_err() {
                        break;
                    }
                }
                PageSource::Queue(Mutex::new(rx))
            }
            Pagination::Streaming { limit } => PageSource::Counter {
                next: AtomicU64::new(1),
                limit,
            },
        };

        Self {
            query,
            source,
            issued: AtomicU32::new(0),
            stop,
        }
    }

    /// Takes the next page to fetch
    ///
    /// # Returns
    ///
    /// * `Some(PageRequest)` - A page number no other caller has received
    /// * `None` - The stop signal is raised, or the queue/limit is exhausted
    pub fn next_page(&self) -> Option<PageRequest> {
        if self.stop.is_stopped() {
            tracing::trace!("Stop signal raised, refusing new work");
            return None;
        }

        let page = match &self.source {
            PageSource::Queue(queue) => {
                let mut rx = match queue.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                rx.try_recv().ok()?.page
            }
            PageSource::Counter { next, limit } => {
                let limit = u64::from(*limit);
                let taken = next
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                        (n <= limit).then_some(n + 1)
                    })
                    .ok()?;
                // `taken <= limit <= u32::MAX`
                taken as u32
            }
        };

        self.issued.fetch_add(1, Ordering::SeqCst);
        tracing::trace!("Handing out page {}", page);

        Some(PageRequest {
            query: Arc::clone(&self.query),
            page,
        })
    }

    /// Number of page requests handed out so far
    pub fn pages_issued(&self) -> u32 {
        self.issued.load(Ordering::SeqCst)
    }

    /// The stop signal this distributor obeys
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }
}
