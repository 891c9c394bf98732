//! Protobuf record support.
//!
//! This module decodes base64 line-encoded protobuf records, translates
//! message descriptors into Arrow schemas, and writes records back out as
//! encoded lines.

mod decoder;
mod schema;
mod writer;

pub use decoder::{encode_line, DecodeError, RecordDecoder};
pub use schema::{translate, SchemaError};
pub(crate) use schema::{field_type, list_of, message_fields};
pub use writer::{B64LineWriter, WriteError};

/// Fully-qualified name of the well-known timestamp message.
pub(crate) const TIMESTAMP_TYPE: &str = "google.protobuf.Timestamp";

/// Fully-qualified name of the well-known duration message.
pub(crate) const DURATION_TYPE: &str = "google.protobuf.Duration";
