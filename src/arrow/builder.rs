//! Tuple to Arrow `RecordBatch` conversion.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryBuilder, BooleanBuilder, DurationNanosecondBuilder, Float32Builder,
    Float64Builder, Int32Builder, Int64Builder, ListArray, RecordBatch, StringBuilder,
    StructArray, TimestampNanosecondBuilder, UInt32Builder, UInt64Builder,
};
use arrow::buffer::{NullBuffer, OffsetBuffer, ScalarBuffer};
use arrow::datatypes::{DataType, FieldRef, Fields, SchemaRef, TimeUnit};
use thiserror::Error;

use crate::projection::message_tuple;
use crate::tuple::{Datum, Tuple};

/// Errors that can occur while building Arrow batches from tuples.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("tuple has {got} values, expected {expected}")]
    Arity { expected: usize, got: usize },

    #[error("unsupported data type: {0}")]
    UnsupportedType(DataType),

    #[error("list offsets overflow i32")]
    OffsetOverflow,
}

/// Recursive column builder.
enum Builder {
    Bool(BooleanBuilder),
    Int32(Int32Builder),
    Int64(Int64Builder),
    UInt32(UInt32Builder),
    UInt64(UInt64Builder),
    Float32(Float32Builder),
    Float64(Float64Builder),
    String(StringBuilder),
    Binary(BinaryBuilder),
    TimestampNs(TimestampNanosecondBuilder),
    DurationNs(DurationNanosecondBuilder),
    List(ListState),
    Struct(StructState),
}

struct ListState {
    element: Box<Builder>,
    /// Item field, taken from the schema so the finished array matches it.
    field: FieldRef,
    offsets: Vec<i32>,
    nulls: Vec<bool>,
}

struct StructState {
    children: Vec<Builder>,
    fields: Fields,
    nulls: Vec<bool>,
}

impl Builder {
    fn new(data_type: &DataType) -> Result<Self, BatchError> {
        match data_type {
            DataType::Boolean => Ok(Builder::Bool(BooleanBuilder::new())),
            DataType::Int32 => Ok(Builder::Int32(Int32Builder::new())),
            DataType::Int64 => Ok(Builder::Int64(Int64Builder::new())),
            DataType::UInt32 => Ok(Builder::UInt32(UInt32Builder::new())),
            DataType::UInt64 => Ok(Builder::UInt64(UInt64Builder::new())),
            DataType::Float32 => Ok(Builder::Float32(Float32Builder::new())),
            DataType::Float64 => Ok(Builder::Float64(Float64Builder::new())),
            DataType::Utf8 => Ok(Builder::String(StringBuilder::new())),
            DataType::Binary => Ok(Builder::Binary(BinaryBuilder::new())),
            DataType::Timestamp(TimeUnit::Nanosecond, None) => {
                Ok(Builder::TimestampNs(TimestampNanosecondBuilder::new()))
            }
            DataType::Duration(TimeUnit::Nanosecond) => {
                Ok(Builder::DurationNs(DurationNanosecondBuilder::new()))
            }
            DataType::List(field) => Ok(Builder::List(ListState {
                element: Box::new(Builder::new(field.data_type())?),
                field: Arc::clone(field),
                offsets: vec![0],
                nulls: Vec::new(),
            })),
            DataType::Struct(fields) => {
                let children = fields
                    .iter()
                    .map(|f| Builder::new(f.data_type()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Builder::Struct(StructState {
                    children,
                    fields: fields.clone(),
                    nulls: Vec::new(),
                }))
            }
            other => Err(BatchError::UnsupportedType(other.clone())),
        }
    }

    fn append(&mut self, datum: &Datum) -> Result<(), BatchError> {
        match (self, datum) {
            (builder, Datum::Null) => builder.append_null(),
            (Builder::Bool(b), Datum::Bool(v)) => b.append_value(*v),
            (Builder::Int32(b), Datum::Int32(v)) => b.append_value(*v),
            (Builder::Int64(b), Datum::Int64(v)) => b.append_value(*v),
            (Builder::UInt32(b), Datum::UInt32(v)) => b.append_value(*v),
            (Builder::UInt64(b), Datum::UInt64(v)) => b.append_value(*v),
            (Builder::Float32(b), Datum::Float32(v)) => b.append_value(*v),
            (Builder::Float64(b), Datum::Float64(v)) => b.append_value(*v),
            (Builder::String(b), Datum::String(v)) => b.append_value(v),
            (Builder::Binary(b), Datum::Bytes(v)) => b.append_value(v),
            (Builder::TimestampNs(b), Datum::TimestampNanos(v)) => b.append_value(*v),
            (Builder::DurationNs(b), Datum::DurationNanos(v)) => b.append_value(*v),
            (Builder::List(state), Datum::List(items)) => {
                for item in items {
                    state.element.append(item)?;
                }
                let last = state.offsets.last().copied().unwrap_or(0);
                let len = i32::try_from(items.len()).map_err(|_| BatchError::OffsetOverflow)?;
                let next = last.checked_add(len).ok_or(BatchError::OffsetOverflow)?;
                state.offsets.push(next);
                state.nulls.push(true);
            }
            (Builder::Struct(state), Datum::Tuple(tuple)) => state.append_tuple(tuple)?,
            (Builder::Struct(state), Datum::Record(msg)) => state.append_tuple(&message_tuple(msg))?,
            (builder, datum) => {
                return Err(BatchError::TypeMismatch {
                    expected: builder.type_name().to_string(),
                    got: datum_type_name(datum).to_string(),
                });
            }
        }
        Ok(())
    }

    fn append_null(&mut self) {
        match self {
            Builder::Bool(b) => b.append_null(),
            Builder::Int32(b) => b.append_null(),
            Builder::Int64(b) => b.append_null(),
            Builder::UInt32(b) => b.append_null(),
            Builder::UInt64(b) => b.append_null(),
            Builder::Float32(b) => b.append_null(),
            Builder::Float64(b) => b.append_null(),
            Builder::String(b) => b.append_null(),
            Builder::Binary(b) => b.append_null(),
            Builder::TimestampNs(b) => b.append_null(),
            Builder::DurationNs(b) => b.append_null(),
            Builder::List(state) => {
                let last = state.offsets.last().copied().unwrap_or(0);
                state.offsets.push(last);
                state.nulls.push(false);
            }
            Builder::Struct(state) => {
                for child in state.children.iter_mut() {
                    child.append_null();
                }
                state.nulls.push(false);
            }
        }
    }

    fn finish(&mut self) -> Result<ArrayRef, BatchError> {
        let array: ArrayRef = match self {
            Builder::Bool(b) => Arc::new(b.finish()),
            Builder::Int32(b) => Arc::new(b.finish()),
            Builder::Int64(b) => Arc::new(b.finish()),
            Builder::UInt32(b) => Arc::new(b.finish()),
            Builder::UInt64(b) => Arc::new(b.finish()),
            Builder::Float32(b) => Arc::new(b.finish()),
            Builder::Float64(b) => Arc::new(b.finish()),
            Builder::String(b) => Arc::new(b.finish()),
            Builder::Binary(b) => Arc::new(b.finish()),
            Builder::TimestampNs(b) => Arc::new(b.finish()),
            Builder::DurationNs(b) => Arc::new(b.finish()),
            Builder::List(state) => {
                let values = state.element.finish()?;
                let offsets = OffsetBuffer::new(ScalarBuffer::from(std::mem::replace(
                    &mut state.offsets,
                    vec![0],
                )));
                let nulls = take_nulls(&mut state.nulls);
                Arc::new(ListArray::try_new(Arc::clone(&state.field), offsets, values, nulls)?)
            }
            Builder::Struct(state) => {
                let arrays = state
                    .children
                    .iter_mut()
                    .map(Builder::finish)
                    .collect::<Result<Vec<_>, _>>()?;
                let len = state.nulls.len();
                let nulls = take_nulls(&mut state.nulls);
                if state.fields.is_empty() {
                    Arc::new(StructArray::new_empty_fields(len, nulls))
                } else {
                    Arc::new(StructArray::try_new(state.fields.clone(), arrays, nulls)?)
                }
            }
        };
        Ok(array)
    }

    fn type_name(&self) -> &'static str {
        match self {
            Builder::Bool(_) => "bool",
            Builder::Int32(_) => "int32",
            Builder::Int64(_) => "int64",
            Builder::UInt32(_) => "uint32",
            Builder::UInt64(_) => "uint64",
            Builder::Float32(_) => "float32",
            Builder::Float64(_) => "float64",
            Builder::String(_) => "string",
            Builder::Binary(_) => "binary",
            Builder::TimestampNs(_) => "timestamp",
            Builder::DurationNs(_) => "duration",
            Builder::List(_) => "list",
            Builder::Struct(_) => "struct",
        }
    }
}

impl StructState {
    fn append_tuple(&mut self, tuple: &Tuple) -> Result<(), BatchError> {
        if tuple.len() != self.children.len() {
            return Err(BatchError::Arity {
                expected: self.children.len(),
                got: tuple.len(),
            });
        }
        for (child, value) in self.children.iter_mut().zip(tuple.iter()) {
            child.append(value)?;
        }
        self.nulls.push(true);
        Ok(())
    }
}

/// Take the validity flags, dropping the buffer when nothing is null.
fn take_nulls(nulls: &mut Vec<bool>) -> Option<NullBuffer> {
    let nulls = std::mem::take(nulls);
    if nulls.iter().all(|&valid| valid) {
        None
    } else {
        Some(NullBuffer::from(nulls))
    }
}

fn datum_type_name(datum: &Datum) -> &'static str {
    match datum {
        Datum::Null => "null",
        Datum::Bool(_) => "bool",
        Datum::Int32(_) => "int32",
        Datum::Int64(_) => "int64",
        Datum::UInt32(_) => "uint32",
        Datum::UInt64(_) => "uint64",
        Datum::Float32(_) => "float32",
        Datum::Float64(_) => "float64",
        Datum::String(_) => "string",
        Datum::Bytes(_) => "bytes",
        Datum::TimestampNanos(_) => "timestamp",
        Datum::DurationNanos(_) => "duration",
        Datum::Tuple(_) => "tuple",
        Datum::List(_) => "list",
        Datum::Record(_) => "record",
    }
}

/// Accumulates tuples into Arrow record batches of a fixed schema.
pub struct TupleBatchBuilder {
    schema: SchemaRef,
    columns: Vec<Builder>,
    rows: usize,
}

impl TupleBatchBuilder {
    pub fn new(schema: SchemaRef) -> Result<Self, BatchError> {
        let columns = schema
            .fields()
            .iter()
            .map(|f| Builder::new(f.data_type()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            schema,
            columns,
            rows: 0,
        })
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// Append one tuple. Its arity must match the schema.
    ///
    /// On error the builder may hold a partially appended row and should be
    /// discarded.
    pub fn append(&mut self, tuple: &Tuple) -> Result<(), BatchError> {
        if tuple.len() != self.columns.len() {
            return Err(BatchError::Arity {
                expected: self.columns.len(),
                got: tuple.len(),
            });
        }
        for (column, value) in self.columns.iter_mut().zip(tuple.iter()) {
            column.append(value)?;
        }
        self.rows += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Finish the buffered rows into a batch and reset for the next one.
    pub fn finish(&mut self) -> Result<RecordBatch, BatchError> {
        let arrays = self
            .columns
            .iter_mut()
            .map(Builder::finish)
            .collect::<Result<Vec<_>, _>>()?;
        let options = arrow::record_batch::RecordBatchOptions::new().with_row_count(Some(self.rows));
        self.rows = 0;
        Ok(RecordBatch::try_new_with_options(
            Arc::clone(&self.schema),
            arrays,
            &options,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, AsArray, Int32Array, StringArray};
    use arrow::datatypes::{Field, Int32Type, Schema};

    use super::*;
    use crate::projection::{ProjectionSpec, TupleProjector};
    use crate::testing;

    #[test]
    fn test_projected_tuples_to_batch() {
        let projector = TupleProjector::new(
            &testing::record_type("example.Person"),
            &ProjectionSpec::parse(["addr.city", "tags", "age"]).unwrap(),
        )
        .unwrap();
        let mut builder = TupleBatchBuilder::new(projector.schema_ref().unwrap()).unwrap();
        builder.append(&projector.build(testing::sample_person())).unwrap();
        builder.append(&projector.build(testing::person("b", &["z"], None))).unwrap();
        assert_eq!(builder.len(), 2);

        let batch = builder.finish().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert!(builder.is_empty());

        let city = batch.column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(city.value(0), "NYC");
        assert!(city.is_null(1));

        let tags = batch.column(1).as_list::<i32>();
        assert_eq!(tags.value_length(0), 2);
        assert_eq!(tags.value(1).as_string::<i32>().value(0), "z");

        let age = batch.column(2).as_any().downcast_ref::<Int32Array>().unwrap();
        assert_eq!(age.null_count(), 2);
    }

    #[test]
    fn test_whole_records_expand_to_struct() {
        let projector = TupleProjector::whole_record(&testing::record_type("example.Person"));
        let mut builder = TupleBatchBuilder::new(projector.schema_ref().unwrap()).unwrap();
        builder.append(&projector.build(testing::sample_person())).unwrap();

        let batch = builder.finish().unwrap();
        let record = batch.column(0).as_struct();
        let name = record.column_by_name("name").unwrap().as_string::<i32>();
        assert_eq!(name.value(0), "a");
        let addr = record.column_by_name("addr").unwrap().as_struct();
        assert_eq!(addr.column(1).as_string::<i32>().value(0), "10001");
    }

    #[test]
    fn test_repeated_sub_tuples() {
        let projector = TupleProjector::new(
            &testing::record_type("example.Person"),
            &ProjectionSpec::parse(["previous.city"]).unwrap(),
        )
        .unwrap();
        let mut msg = testing::sample_person();
        msg.set_field_by_name(
            "previous",
            prost_reflect::Value::List(vec![
                prost_reflect::Value::Message(testing::address("LA", "90001")),
                prost_reflect::Value::Message(testing::address("SF", "94103")),
            ]),
        );
        let mut builder = TupleBatchBuilder::new(projector.schema_ref().unwrap()).unwrap();
        builder.append(&projector.build(msg)).unwrap();

        let batch = builder.finish().unwrap();
        let previous = batch.column(0).as_list::<i32>();
        let items = previous.value(0);
        let cities = items.as_struct().column(0).as_string::<i32>();
        assert_eq!(cities.value(0), "LA");
        assert_eq!(cities.value(1), "SF");
    }

    #[test]
    fn test_type_mismatch_and_arity() {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int32, true)]));
        let mut builder = TupleBatchBuilder::new(schema).unwrap();

        let err = builder.append(&Tuple::new(vec![Datum::from("x")])).unwrap_err();
        assert!(matches!(err, BatchError::TypeMismatch { .. }));

        let err = builder.append(&Tuple::new(vec![])).unwrap_err();
        assert!(matches!(err, BatchError::Arity { expected: 1, got: 0 }));
    }

    #[test]
    fn test_builder_is_reusable_after_finish() {
        let schema = Arc::new(Schema::new(vec![Field::new("n", DataType::Int32, true)]));
        let mut builder = TupleBatchBuilder::new(schema).unwrap();
        builder.append(&Tuple::new(vec![Datum::Int32(1)])).unwrap();
        builder.finish().unwrap();
        builder.append(&Tuple::new(vec![Datum::Int32(2)])).unwrap();
        let batch = builder.finish().unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.column(0).as_primitive::<Int32Type>().value(0), 2);
    }
}
