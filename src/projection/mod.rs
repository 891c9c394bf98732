//! Column projection.
//!
//! A [`ProjectionSpec`] lists the field paths the engine wants. A
//! [`TupleProjector`] resolves those paths against a record type once and then
//! walks only the requested paths of each decoded record.

mod path;
mod projector;
mod value;

use thiserror::Error;

pub use path::{FieldPath, ProjectionSpec};
pub use projector::TupleProjector;
pub use value::{field_datum, message_tuple};

use crate::protobuf::SchemaError;

/// Errors raised while resolving a projection against a record type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("empty field path '{0}'")]
    EmptyPath(String),

    #[error("field path '{0}' is requested more than once")]
    DuplicatePath(String),

    #[error("unknown field '{field}' in {message} (path '{path}')")]
    UnknownField {
        path: String,
        field: String,
        message: String,
    },

    #[error("field '{field}' is not a message and has no subfields (path '{path}')")]
    NotAMessage { path: String, field: String },

    #[error("cannot project into map field '{field}' (path '{path}')")]
    MapTraversal { path: String, field: String },

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}
