//! Leech module: the page-fetching engine
//!
//! This module contains the core leeching logic, including:
//! - The login exchange and bearer credential
//! - Single-page HTTP fetches and response classification
//! - Page distribution across a bounded worker pool (bulk queue or streaming counter)
//! - Result aggregation and streaming
//! - Session lifecycle and cooperative shutdown

mod aggregator;
mod credentials;
mod distributor;
mod fetcher;
mod report;
mod session;

pub use aggregator::{Aggregator, PageBatch, ResultSink, WorkerOutput};
pub use credentials::{authenticate, Credential};
pub use distributor::{PageDistributor, PageRequest, Pagination, StopSignal};
pub use fetcher::{build_http_client, Match, PageFetcher, PageOutcome};
pub use report::{LeechReport, StopReason, WorkerReport};
pub use session::Session;
