//! Parquet output.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use tracing::debug;

use super::{BatchWriter, OutputError};

/// Writes record batches to a single zstd-compressed Parquet file.
pub struct ParquetBatchWriter<W: Write + Send = File> {
    writer: ArrowWriter<W>,
    rows: usize,
}

impl ParquetBatchWriter<File> {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: &Path, schema: SchemaRef) -> Result<Self, OutputError> {
        let file = File::create(path)?;
        Self::new(file, schema)
    }
}

impl<W: Write + Send> ParquetBatchWriter<W> {
    pub fn new(inner: W, schema: SchemaRef) -> Result<Self, OutputError> {
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(Default::default()))
            .build();

        let writer = ArrowWriter::try_new(inner, schema, Some(props))?;

        Ok(Self { writer, rows: 0 })
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Close the file and return the underlying writer.
    pub fn into_inner(self) -> Result<W, OutputError> {
        debug!(rows = self.rows, "closing parquet writer");
        Ok(self.writer.into_inner()?)
    }
}

impl<W: Write + Send> BatchWriter for ParquetBatchWriter<W> {
    fn write_batch(&mut self, batch: &RecordBatch) -> Result<(), OutputError> {
        self.writer.write(batch)?;
        self.rows += batch.num_rows();
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), OutputError> {
        self.into_inner()?;
        Ok(())
    }
}
