//! Line decoder: base64 text to a dynamic protobuf message.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use prost::Message;
use prost_reflect::DynamicMessage;
use thiserror::Error;

use crate::registry::RecordType;

/// Reasons a single line could not be decoded.
///
/// All variants mean "this line is bad"; the decoder never aborts a scan.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("line is empty")]
    EmptyLine,

    #[error("invalid base64 encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("protobuf decode error: {0}")]
    Deserialize(#[from] prost::DecodeError),
}

/// Decodes lines into messages of one record type.
#[derive(Debug, Clone)]
pub struct RecordDecoder {
    record_type: RecordType,
    /// Reused base64 output buffer.
    buf: Vec<u8>,
}

impl RecordDecoder {
    pub fn new(record_type: RecordType) -> Self {
        Self {
            record_type,
            buf: Vec::with_capacity(1024),
        }
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    /// Decode one line. Surrounding whitespace, including a trailing `\r`, is
    /// ignored.
    pub fn decode(&mut self, line: &str) -> Result<DynamicMessage, DecodeError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(DecodeError::EmptyLine);
        }

        self.buf.clear();
        STANDARD.decode_vec(line, &mut self.buf)?;

        let msg = DynamicMessage::decode(self.record_type.descriptor().clone(), self.buf.as_slice())?;
        Ok(msg)
    }
}

/// Encode a message as one line of text, without the terminator.
pub fn encode_line(message: &DynamicMessage) -> String {
    STANDARD.encode(message.encode_to_vec())
}
