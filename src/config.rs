//! Scan configuration and configuration errors.

use thiserror::Error;

/// Default maximum fraction of malformed lines tolerated per source.
pub const DEFAULT_MAX_ERROR_RATIO: f64 = 0.0001;

/// Default number of malformed lines that must be seen before the ratio is
/// enforced.
pub const DEFAULT_MIN_ERRORS: u64 = 1;

/// Default number of tuples collected into one Arrow batch.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Fatal configuration problems. These are raised immediately and never
/// absorbed by the scan.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("record type '{0}' is not registered")]
    UnknownType(String),

    #[error("record type name '{name}' is ambiguous, candidates: {}", candidates.join(", "))]
    AmbiguousType { name: String, candidates: Vec<String> },

    #[error("failed to decode FileDescriptorSet: {0}")]
    DescriptorSet(#[from] prost::DecodeError),

    #[error("failed to create descriptor pool: {0}")]
    DescriptorPool(String),

    #[error("projection cannot be changed: {0}")]
    ProjectionFrozen(String),

    #[error("invalid scan options: {0}")]
    InvalidOptions(String),
}

/// Options controlling a single scan over one line source.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    /// Maximum tolerated ratio of skipped lines to lines read, in `[0, 1]`.
    pub max_error_ratio: f64,
    /// Number of skipped lines required before the ratio is checked.
    pub min_errors: u64,
    /// Number of tuples per Arrow batch.
    pub batch_size: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_error_ratio: DEFAULT_MAX_ERROR_RATIO,
            min_errors: DEFAULT_MIN_ERRORS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ScanOptions {
    /// Options that abort on the first malformed line.
    pub fn strict() -> Self {
        Self {
            max_error_ratio: 0.0,
            ..Default::default()
        }
    }

    /// Options tolerating up to `max_error_ratio` malformed lines.
    pub fn tolerant(max_error_ratio: f64) -> Self {
        Self {
            max_error_ratio,
            ..Default::default()
        }
    }

    pub fn with_min_errors(mut self, min_errors: u64) -> Self {
        self.min_errors = min_errors;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Check that the options describe a usable scan.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.max_error_ratio.is_finite() || !(0.0..=1.0).contains(&self.max_error_ratio) {
            return Err(ConfigurationError::InvalidOptions(format!(
                "max error ratio must be within [0, 1], got {}",
                self.max_error_ratio
            )));
        }
        if self.min_errors == 0 {
            return Err(ConfigurationError::InvalidOptions(
                "min errors must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError::InvalidOptions(
                "batch size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
