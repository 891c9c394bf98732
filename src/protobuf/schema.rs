//! Protobuf descriptor to Arrow schema translation.
//!
//! The translation is a pure function of the message descriptor. Nested
//! messages become structs, repeated fields become lists and maps become lists
//! of key/value structs. Anything without a finite Arrow representation fails
//! the whole translation.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Fields, Schema, TimeUnit};
use prost_reflect::{FieldDescriptor, Kind, MessageDescriptor};
use thiserror::Error;

use super::{DURATION_TYPE, TIMESTAMP_TYPE};
use crate::registry::RecordType;

/// Schema metadata key holding the fully-qualified record type name.
pub const RECORD_TYPE_METADATA_KEY: &str = "pbline.record_type";

/// Errors that can occur during schema translation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unsupported protobuf type: {0}")]
    UnsupportedType(String),
}

/// Translate a record type into the Arrow schema of its top-level fields.
pub fn translate(record_type: &RecordType) -> Result<Schema, SchemaError> {
    let fields = message_fields(record_type.descriptor())?;
    let metadata = HashMap::from([(
        RECORD_TYPE_METADATA_KEY.to_string(),
        record_type.name().to_string(),
    )]);
    Ok(Schema::new_with_metadata(fields, metadata))
}

/// Arrow fields for every field of a message, in declaration order.
pub(crate) fn message_fields(message: &MessageDescriptor) -> Result<Vec<Field>, SchemaError> {
    let mut expanding = vec![message.full_name().to_string()];
    message
        .fields()
        .map(|f| field_to_arrow(&f, &mut expanding))
        .collect()
}

/// Arrow data type of a field, including list wrapping for repeated fields.
pub(crate) fn field_type(field: &FieldDescriptor) -> Result<DataType, SchemaError> {
    field_data_type(field, &mut Vec::new())
}

fn field_to_arrow(field: &FieldDescriptor, expanding: &mut Vec<String>) -> Result<Field, SchemaError> {
    let data_type = field_data_type(field, expanding)?;
    // Unset optional fields surface as nulls.
    Ok(Field::new(field.name(), data_type, true))
}

fn field_data_type(field: &FieldDescriptor, expanding: &mut Vec<String>) -> Result<DataType, SchemaError> {
    if field.is_map() {
        let Kind::Message(entry) = field.kind() else {
            return Err(SchemaError::UnsupportedType(format!(
                "map field {} without entry message",
                field.full_name()
            )));
        };
        let (Some(key), Some(value)) = (entry.get_field(1), entry.get_field(2)) else {
            return Err(SchemaError::UnsupportedType(format!(
                "map entry {} lacks key or value field",
                entry.full_name()
            )));
        };
        let entry_fields = Fields::from(vec![
            Field::new("key", kind_to_arrow(key.kind(), expanding)?, false),
            Field::new("value", kind_to_arrow(value.kind(), expanding)?, true),
        ]);
        Ok(list_of(DataType::Struct(entry_fields)))
    } else if field.is_list() {
        Ok(list_of(kind_to_arrow(field.kind(), expanding)?))
    } else {
        kind_to_arrow(field.kind(), expanding)
    }
}

pub(crate) fn list_of(item: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", item, true)))
}

/// `expanding` holds the messages currently being expanded, outermost first.
fn kind_to_arrow(kind: Kind, expanding: &mut Vec<String>) -> Result<DataType, SchemaError> {
    match kind {
        Kind::Bool => Ok(DataType::Boolean),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => Ok(DataType::Int32),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => Ok(DataType::Int64),
        Kind::Uint32 | Kind::Fixed32 => Ok(DataType::UInt32),
        Kind::Uint64 | Kind::Fixed64 => Ok(DataType::UInt64),
        Kind::Float => Ok(DataType::Float32),
        Kind::Double => Ok(DataType::Float64),
        Kind::String => Ok(DataType::Utf8),
        Kind::Bytes => Ok(DataType::Binary),
        // Enums surface as their value names.
        Kind::Enum(_) => Ok(DataType::Utf8),
        Kind::Message(msg) => match msg.full_name() {
            TIMESTAMP_TYPE => Ok(DataType::Timestamp(TimeUnit::Nanosecond, None)),
            DURATION_TYPE => Ok(DataType::Duration(TimeUnit::Nanosecond)),
            name => {
                if expanding.iter().any(|n| n == name) {
                    return Err(SchemaError::UnsupportedType(format!(
                        "recursive message {} ({})",
                        name,
                        expanding.join(" -> ")
                    )));
                }
                expanding.push(name.to_string());
                let fields = msg
                    .fields()
                    .map(|f| field_to_arrow(&f, expanding))
                    .collect::<Result<Vec<_>, _>>();
                expanding.pop();
                Ok(DataType::Struct(Fields::from(fields?)))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_person_schema() {
        let schema = translate(&testing::record_type("example.Person")).unwrap();

        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["name", "tags", "addr", "age", "previous", "color"]);

        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
        assert_eq!(schema.field(1).data_type(), &list_of(DataType::Utf8));
        let address = DataType::Struct(Fields::from(vec![
            Field::new("city", DataType::Utf8, true),
            Field::new("zip", DataType::Utf8, true),
        ]));
        assert_eq!(schema.field(2).data_type(), &address);
        assert_eq!(schema.field(3).data_type(), &DataType::Int32);
        assert_eq!(schema.field(4).data_type(), &list_of(address));
        assert_eq!(schema.field(5).data_type(), &DataType::Utf8);
        assert!(schema.fields().iter().all(|f| f.is_nullable()));
        assert_eq!(
            schema.metadata().get(RECORD_TYPE_METADATA_KEY).map(String::as_str),
            Some("example.Person")
        );
    }

    #[test]
    fn test_well_known_and_scalar_types() {
        let schema = translate(&testing::record_type("example.Event")).unwrap();
        assert_eq!(
            schema.field(0).data_type(),
            &DataType::Timestamp(TimeUnit::Nanosecond, None)
        );
        assert_eq!(schema.field(1).data_type(), &DataType::Binary);
        assert_eq!(schema.field(2).data_type(), &DataType::Float64);
        assert_eq!(schema.field(3).data_type(), &DataType::UInt64);
        assert_eq!(schema.field(4).data_type(), &DataType::Boolean);
    }

    #[test]
    fn test_recursive_message_is_unsupported() {
        let err = translate(&testing::record_type("example.Tree")).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedType(msg) if msg.contains("example.Tree")));
    }

    #[test]
    fn test_map_field_is_list_of_entries() {
        let tree = testing::descriptor("example.Tree");
        let weights = tree.get_field_by_name("weights").unwrap();
        let entry = DataType::Struct(Fields::from(vec![
            Field::new("key", DataType::Utf8, false),
            Field::new("value", DataType::Int64, true),
        ]));
        assert_eq!(field_type(&weights).unwrap(), list_of(entry));
    }

    #[test]
    fn test_translation_is_deterministic() {
        let record_type = testing::record_type("example.Person");
        assert_eq!(translate(&record_type).unwrap(), translate(&record_type).unwrap());
    }
}
