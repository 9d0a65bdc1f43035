//! Match printing
//!
//! Matches go to stdout so they can be piped; everything else goes to stderr.

use crate::leech::{Match, PageBatch};
use std::io::{self, Write};

/// Writes a final aggregate as one pretty-printed JSON array
pub fn write_matches<W: Write>(out: &mut W, matches: &[Match]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, matches)?;
    writeln!(out)?;
    out.flush()
}

/// Writes one page's matches, one compact JSON object per line
pub fn write_batch<W: Write>(out: &mut W, batch: &PageBatch) -> io::Result<()> {
    for record in &batch.matches {
        serde_json::to_writer(&mut *out, record)?;
        writeln!(out)?;
    }
    out.flush()
}
