//! Sinks for projected record batches.

pub mod parquet;

use arrow::array::RecordBatch;
use thiserror::Error;

pub use self::parquet::ParquetBatchWriter;

/// Errors that can occur during output operations.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),
}

/// Destination for record batches sharing one schema.
pub trait BatchWriter {
    fn write_batch(&mut self, batch: &RecordBatch) -> Result<(), OutputError>;

    /// Flush pending data and close the destination.
    fn finish(self: Box<Self>) -> Result<(), OutputError>;
}
