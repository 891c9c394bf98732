//! Line sources.
//!
//! A line source hands out raw lines with their byte offsets and owns the
//! corruption budget for the lines it has handed out. Decoding failures are
//! reported back to the source, which decides whether the scan may continue.

mod budget;
mod reader;

use std::io;

use thiserror::Error;

pub use budget::{CorruptionTracker, ScanStats};
pub use reader::TextLineSource;

/// Errors raised by a line source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(
        "error rate while reading input crossed threshold: {skipped} of {lines} lines skipped (max ratio {max_ratio})"
    )]
    CorruptionBudgetExceeded {
        skipped: u64,
        lines: u64,
        max_ratio: f64,
    },
}

/// One line of input, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub text: String,
    /// Byte offset of the start of the line in the underlying input.
    pub offset: u64,
}

/// Supplies raw lines and enforces the corruption budget.
///
/// Implementations wrap whatever split-aware or compressed input machinery
/// produces the lines.
pub trait LineSource {
    /// Read the next line. Returns `None` at end of input.
    fn next_line(&mut self) -> Result<Option<RawLine>, SourceError>;

    /// Report that the line at `offset` could not be decoded.
    ///
    /// Returns `CorruptionBudgetExceeded` once the ratio of skipped lines
    /// crosses the configured maximum; the scan must then stop.
    fn report_malformed(
        &mut self,
        offset: u64,
        cause: &(dyn std::error::Error + 'static),
    ) -> Result<(), SourceError>;

    /// Counters for the lines handed out so far.
    fn stats(&self) -> ScanStats;
}

impl<S: LineSource + ?Sized> LineSource for Box<S> {
    fn next_line(&mut self) -> Result<Option<RawLine>, SourceError> {
        (**self).next_line()
    }

    fn report_malformed(
        &mut self,
        offset: u64,
        cause: &(dyn std::error::Error + 'static),
    ) -> Result<(), SourceError> {
        (**self).report_malformed(offset, cause)
    }

    fn stats(&self) -> ScanStats {
        (**self).stats()
    }
}
