//! Line source over any buffered reader.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{error, warn};

use super::{CorruptionTracker, LineSource, RawLine, ScanStats, SourceError};
use crate::config::ScanOptions;

/// Malformed lines logged individually before switching to powers of two.
const LOGGED_ERRORS: u64 = 10;

/// Reads `\n`-terminated lines from a `BufRead`.
///
/// A trailing `\r` is stripped. Bytes that are not valid UTF-8 are replaced,
/// which makes the line fail to decode rather than failing the read.
pub struct TextLineSource<R> {
    reader: R,
    /// Byte offset of the next line.
    offset: u64,
    buf: Vec<u8>,
    tracker: CorruptionTracker,
}

impl<R: BufRead> TextLineSource<R> {
    pub fn new(reader: R, options: &ScanOptions) -> Self {
        Self {
            reader,
            offset: 0,
            buf: Vec::with_capacity(4096),
            tracker: CorruptionTracker::from_options(options),
        }
    }

    /// Report offsets relative to `offset`, for readers positioned inside a
    /// larger input.
    pub fn with_start_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl TextLineSource<BufReader<File>> {
    /// Open a file as a line source.
    pub fn open(path: impl AsRef<Path>, options: &ScanOptions) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), options))
    }
}

impl<R: BufRead> LineSource for TextLineSource<R> {
    fn next_line(&mut self) -> Result<Option<RawLine>, SourceError> {
        self.buf.clear();
        let read = self.reader.read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }

        let offset = self.offset;
        self.offset += read as u64;

        let mut end = self.buf.len();
        if end > 0 && self.buf[end - 1] == b'\n' {
            end -= 1;
        }
        if end > 0 && self.buf[end - 1] == b'\r' {
            end -= 1;
        }

        self.tracker.record_line();
        let text = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        Ok(Some(RawLine { text, offset }))
    }

    fn report_malformed(
        &mut self,
        offset: u64,
        cause: &(dyn std::error::Error + 'static),
    ) -> Result<(), SourceError> {
        let result = self.tracker.record_error();
        let stats = self.tracker.stats();

        if let Err(e) = &result {
            error!(offset, skipped = stats.skipped, lines = stats.lines, "{e}");
        } else if stats.skipped <= LOGGED_ERRORS || stats.skipped.is_power_of_two() {
            warn!(
                offset,
                skipped = stats.skipped,
                lines = stats.lines,
                "skipping malformed line: {cause}"
            );
        }
        result
    }

    fn stats(&self) -> ScanStats {
        self.tracker.stats()
    }
}
