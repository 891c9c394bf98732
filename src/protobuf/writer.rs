//! Base64 line writer, the storage-side counterpart of the loader.

use std::io::{self, Write};

use prost_reflect::{DynamicMessage, ReflectMessage};
use thiserror::Error;

use super::encode_line;
use crate::registry::RecordType;

/// Errors that can occur while writing encoded lines.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("message type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },
}

/// Writes messages of one record type as base64 lines.
pub struct B64LineWriter<W: Write> {
    inner: W,
    record_type: RecordType,
    records_written: u64,
}

impl<W: Write> B64LineWriter<W> {
    pub fn new(inner: W, record_type: RecordType) -> Self {
        Self {
            inner,
            record_type,
            records_written: 0,
        }
    }

    /// Write one message followed by a newline.
    pub fn write(&mut self, message: &DynamicMessage) -> Result<(), WriteError> {
        let descriptor = message.descriptor();
        if &descriptor != self.record_type.descriptor() {
            return Err(WriteError::TypeMismatch {
                expected: self.record_type.name().to_string(),
                got: descriptor.full_name().to_string(),
            });
        }
        let line = encode_line(message);
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\n")?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W, WriteError> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}
