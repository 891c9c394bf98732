//! Corruption budget accounting.

use super::SourceError;
use crate::config::ScanOptions;

/// Running counters for one line source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Lines handed out, including malformed ones.
    pub lines: u64,
    /// Lines reported malformed and skipped.
    pub skipped: u64,
}

impl ScanStats {
    /// Lines that produced a record.
    pub fn decoded(&self) -> u64 {
        self.lines.saturating_sub(self.skipped)
    }

    pub fn error_ratio(&self) -> f64 {
        if self.lines == 0 {
            0.0
        } else {
            self.skipped as f64 / self.lines as f64
        }
    }
}

/// Tracks skipped lines against a maximum error ratio.
///
/// The ratio is checked on every reported error once at least `min_errors`
/// errors have been seen. A breach is reported when the ratio strictly exceeds
/// the maximum.
#[derive(Debug, Clone)]
pub struct CorruptionTracker {
    max_error_ratio: f64,
    min_errors: u64,
    stats: ScanStats,
}

impl CorruptionTracker {
    pub fn new(max_error_ratio: f64, min_errors: u64) -> Self {
        Self {
            max_error_ratio,
            min_errors: min_errors.max(1),
            stats: ScanStats::default(),
        }
    }

    pub fn from_options(options: &ScanOptions) -> Self {
        Self::new(options.max_error_ratio, options.min_errors)
    }

    pub fn record_line(&mut self) {
        self.stats.lines += 1;
    }

    /// Count one skipped line and check the budget.
    pub fn record_error(&mut self) -> Result<(), SourceError> {
        self.stats.skipped += 1;
        // Errors can be reported for lines the tracker never saw.
        if self.stats.skipped > self.stats.lines {
            self.stats.lines = self.stats.skipped;
        }

        if self.stats.skipped >= self.min_errors && self.stats.error_ratio() > self.max_error_ratio {
            return Err(SourceError::CorruptionBudgetExceeded {
                skipped: self.stats.skipped,
                lines: self.stats.lines,
                max_ratio: self.max_error_ratio,
            });
        }
        Ok(())
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn max_error_ratio(&self) -> f64 {
        self.max_error_ratio
    }

    pub fn reset(&mut self) {
        self.stats = ScanStats::default();
    }
}
