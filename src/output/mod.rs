//! Output module for matches and run summaries
//!
//! This module handles:
//! - Printing matches (final aggregate or one line per streamed record)
//! - Deriving and printing run statistics

mod printer;
pub mod summary;

pub use printer::{write_batch, write_matches};
pub use summary::{print_summary, summarize, RunStatistics};
