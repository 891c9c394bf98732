//! Projected tuple construction.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Fields, Schema};
use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, MessageDescriptor, Value};
use tracing::debug;

use super::value::field_datum;
use super::{FieldPath, ProjectionError, ProjectionSpec};
use crate::protobuf::{field_type, message_fields, SchemaError};
use crate::registry::RecordType;
use crate::tuple::{Datum, Tuple};

/// One resolved hop of a field path.
#[derive(Debug, Clone)]
enum Step {
    /// Terminal field, converted whole.
    Leaf(FieldDescriptor),
    /// Singular message field on the way to the leaf.
    Message {
        field: FieldDescriptor,
        next: Box<Step>,
    },
    /// Repeated message field; each element yields a one-column sub-tuple.
    Repeated {
        field: FieldDescriptor,
        /// Name of the sub-tuple column: the remainder of the path.
        item_name: String,
        next: Box<Step>,
    },
}

impl Step {
    fn resolve(
        message: &MessageDescriptor,
        path: &FieldPath,
        segments: &[String],
    ) -> Result<Self, ProjectionError> {
        let Some((head, rest)) = segments.split_first() else {
            return Err(ProjectionError::EmptyPath(path.to_string()));
        };
        let field = message
            .get_field_by_name(head)
            .ok_or_else(|| ProjectionError::UnknownField {
                path: path.to_string(),
                field: head.clone(),
                message: message.full_name().to_string(),
            })?;

        if rest.is_empty() {
            return Ok(Step::Leaf(field));
        }
        if field.is_map() {
            return Err(ProjectionError::MapTraversal {
                path: path.to_string(),
                field: head.clone(),
            });
        }
        let Kind::Message(child) = field.kind() else {
            return Err(ProjectionError::NotAMessage {
                path: path.to_string(),
                field: head.clone(),
            });
        };

        let next = Box::new(Step::resolve(&child, path, rest)?);
        if field.is_list() {
            Ok(Step::Repeated {
                field,
                item_name: rest.join("."),
                next,
            })
        } else {
            Ok(Step::Message { field, next })
        }
    }

    fn data_type(&self) -> Result<DataType, SchemaError> {
        match self {
            Step::Leaf(field) => field_type(field),
            Step::Message { next, .. } => next.data_type(),
            Step::Repeated { item_name, next, .. } => {
                let item = Field::new(item_name, next.data_type()?, true);
                Ok(crate::protobuf::list_of(DataType::Struct(Fields::from(vec![item]))))
            }
        }
    }

    fn project(&self, msg: &DynamicMessage) -> Datum {
        match self {
            Step::Leaf(field) => field_datum(msg, field),
            Step::Message { field, next } => {
                if !msg.has_field(field) {
                    return Datum::Null;
                }
                match msg.get_field(field).as_ref() {
                    Value::Message(child) => next.project(child),
                    _ => Datum::Null,
                }
            }
            Step::Repeated { field, next, .. } => match msg.get_field(field).as_ref() {
                Value::List(items) => Datum::List(
                    items
                        .iter()
                        .map(|item| match item {
                            Value::Message(child) => Datum::Tuple(Tuple::new(vec![next.project(child)])),
                            _ => Datum::Null,
                        })
                        .collect(),
                ),
                _ => Datum::List(Vec::new()),
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Column {
    path: FieldPath,
    step: Step,
}

/// Builds projected tuples for one record type and one frozen projection.
///
/// Paths are resolved once at construction and reused for every record.
#[derive(Debug, Clone)]
pub struct TupleProjector {
    record_type: RecordType,
    columns: Vec<Column>,
}

impl TupleProjector {
    /// Resolve `spec` against `record_type`.
    pub fn new(record_type: &RecordType, spec: &ProjectionSpec) -> Result<Self, ProjectionError> {
        let columns = spec
            .paths()
            .iter()
            .map(|path| {
                let step = Step::resolve(record_type.descriptor(), path, path.segments())?;
                Ok(Column {
                    path: path.clone(),
                    step,
                })
            })
            .collect::<Result<Vec<_>, ProjectionError>>()?;

        debug!(
            record_type = record_type.name(),
            columns = columns.len(),
            "resolved projection"
        );
        Ok(Self {
            record_type: record_type.clone(),
            columns,
        })
    }

    /// A projector producing the whole record as one opaque value.
    pub fn whole_record(record_type: &RecordType) -> Self {
        Self {
            record_type: record_type.clone(),
            columns: Vec::new(),
        }
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    /// Whether tuples carry the whole record instead of projected columns.
    pub fn is_whole_record(&self) -> bool {
        self.columns.is_empty()
    }

    /// Number of values in each produced tuple.
    pub fn arity(&self) -> usize {
        self.columns.len().max(1)
    }

    /// Build the tuple for one record.
    pub fn build(&self, record: DynamicMessage) -> Tuple {
        if self.columns.is_empty() {
            return Tuple::new(vec![Datum::Record(record)]);
        }
        self.columns.iter().map(|c| c.step.project(&record)).collect()
    }

    /// Arrow schema of the tuples this projector builds.
    ///
    /// Projected columns are named by their dotted path. In whole-record mode
    /// the single column is a struct of every field of the record type.
    pub fn schema(&self) -> Result<Schema, SchemaError> {
        if self.columns.is_empty() {
            let descriptor = self.record_type.descriptor();
            let fields = Fields::from(message_fields(descriptor)?);
            return Ok(Schema::new(vec![Field::new(
                descriptor.name(),
                DataType::Struct(fields),
                false,
            )]));
        }

        let fields = self
            .columns
            .iter()
            .map(|c| Ok(Field::new(c.path.to_string(), c.step.data_type()?, true)))
            .collect::<Result<Vec<_>, SchemaError>>()?;
        Ok(Schema::new(fields))
    }

    /// Convenience for callers that share the schema.
    pub fn schema_ref(&self) -> Result<Arc<Schema>, SchemaError> {
        self.schema().map(Arc::new)
    }
}
