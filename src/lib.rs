//! Load base64 line-encoded protobuf records as projected tuples.
//!
//! Each input line holds one standard-alphabet base64 encoding of a
//! serialized protobuf message. A [`loader::B64LineLoader`] pulls lines from a
//! [`line::LineSource`], decodes them against a record type resolved through a
//! [`registry::TypeRegistry`], and materializes only the requested fields as
//! [`tuple::Tuple`]s. Malformed lines are skipped until the source's
//! corruption budget runs out.

pub mod arrow;
pub mod config;
pub mod line;
pub mod loader;
pub mod output;
pub mod projection;
pub mod protobuf;
pub mod registry;
pub mod tuple;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigurationError, ScanOptions};
pub use line::{LineSource, RawLine, ScanStats, SourceError, TextLineSource};
pub use loader::{B64LineLoader, LoaderError, LoaderState};
pub use projection::{FieldPath, ProjectionError, ProjectionSpec, TupleProjector};
pub use protobuf::{encode_line, translate, DecodeError, RecordDecoder, SchemaError};
pub use registry::{RecordType, TypeRegistry};
pub use tuple::{Datum, Tuple};
