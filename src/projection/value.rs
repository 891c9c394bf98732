//! Conversion from decoded protobuf values to tuple values.

use prost_reflect::{DynamicMessage, FieldDescriptor, Kind, ReflectMessage, Value};

use crate::protobuf::{DURATION_TYPE, TIMESTAMP_TYPE};
use crate::tuple::{Datum, Tuple};

/// Convert every field of a message, in declaration order.
pub fn message_tuple(msg: &DynamicMessage) -> Tuple {
    msg.descriptor()
        .fields()
        .map(|field| field_datum(msg, &field))
        .collect()
}

/// Convert one field of a message.
///
/// Unset fields that track presence become `Null`; repeated and map fields
/// are never null.
pub fn field_datum(msg: &DynamicMessage, field: &FieldDescriptor) -> Datum {
    if field.is_map() {
        return map_datum(msg, field);
    }
    if field.is_list() {
        let kind = field.kind();
        return match msg.get_field(field).as_ref() {
            Value::List(items) => Datum::List(items.iter().map(|v| value_datum(v, &kind)).collect()),
            _ => Datum::List(Vec::new()),
        };
    }
    if field.supports_presence() && !msg.has_field(field) {
        return Datum::Null;
    }
    value_datum(&msg.get_field(field), &field.kind())
}

fn map_datum(msg: &DynamicMessage, field: &FieldDescriptor) -> Datum {
    let Kind::Message(entry) = field.kind() else {
        return Datum::List(Vec::new());
    };
    let key_kind = entry.map_entry_key_field().kind();
    let value_kind = entry.map_entry_value_field().kind();

    match msg.get_field(field).as_ref() {
        Value::Map(map) => Datum::List(
            map.iter()
                .map(|(key, value)| {
                    let key: Value = key.clone().into();
                    Datum::Tuple(Tuple::new(vec![
                        value_datum(&key, &key_kind),
                        value_datum(value, &value_kind),
                    ]))
                })
                .collect(),
        ),
        _ => Datum::List(Vec::new()),
    }
}

/// Convert a single (non-repeated) value.
pub(crate) fn value_datum(value: &Value, kind: &Kind) -> Datum {
    match value {
        Value::Bool(v) => Datum::Bool(*v),
        Value::I32(v) => Datum::Int32(*v),
        Value::I64(v) => Datum::Int64(*v),
        Value::U32(v) => Datum::UInt32(*v),
        Value::U64(v) => Datum::UInt64(*v),
        Value::F32(v) => Datum::Float32(*v),
        Value::F64(v) => Datum::Float64(*v),
        Value::String(v) => Datum::String(v.clone()),
        Value::Bytes(v) => Datum::Bytes(v.to_vec()),
        Value::EnumNumber(number) => {
            let name = match kind {
                Kind::Enum(e) => e.get_value(*number).map(|v| v.name().to_string()),
                _ => None,
            };
            Datum::String(name.unwrap_or_else(|| number.to_string()))
        }
        Value::Message(msg) => match msg.descriptor().full_name() {
            TIMESTAMP_TYPE => Datum::TimestampNanos(well_known_nanos(msg)),
            DURATION_TYPE => Datum::DurationNanos(well_known_nanos(msg)),
            _ => Datum::Tuple(message_tuple(msg)),
        },
        // Repeated values only occur through list and map fields.
        Value::List(_) | Value::Map(_) => Datum::Null,
    }
}

/// Total nanoseconds of a `seconds`/`nanos` well-known message.
fn well_known_nanos(msg: &DynamicMessage) -> i64 {
    let seconds = msg
        .get_field_by_name("seconds")
        .map(|v| match v.as_ref() {
            Value::I64(s) => *s,
            _ => 0,
        })
        .unwrap_or(0);
    let nanos = msg
        .get_field_by_name("nanos")
        .map(|v| match v.as_ref() {
            Value::I32(n) => *n,
            _ => 0,
        })
        .unwrap_or(0);
    seconds
        .saturating_mul(1_000_000_000)
        .saturating_add(i64::from(nanos))
}

#[cfg(test)]
mod tests {
    use prost_reflect::MapKey;

    use super::*;
    use crate::testing;

    #[test]
    fn test_message_tuple_with_unset_fields() {
        let tuple = message_tuple(&testing::sample_person());
        assert_eq!(
            tuple,
            Tuple::new(vec![
                Datum::from("a"),
                Datum::List(vec![Datum::from("x"), Datum::from("y")]),
                Datum::Tuple(Tuple::new(vec![Datum::from("NYC"), Datum::from("10001")])),
                Datum::Null,
                Datum::List(vec![]),
                Datum::Null,
            ])
        );
    }

    #[test]
    fn test_enum_values_are_named() {
        let mut msg = testing::sample_person();
        msg.set_field_by_name("color", Value::EnumNumber(2));
        let field = msg.descriptor().get_field_by_name("color").unwrap();
        assert_eq!(field_datum(&msg, &field), Datum::from("BLUE"));
    }

    #[test]
    fn test_timestamp_to_nanos() {
        let mut at = DynamicMessage::new(testing::descriptor("google.protobuf.Timestamp"));
        at.set_field_by_name("seconds", Value::I64(2));
        at.set_field_by_name("nanos", Value::I32(5));
        let mut event = DynamicMessage::new(testing::descriptor("example.Event"));
        event.set_field_by_name("at", Value::Message(at));
        event.set_field_by_name("payload", Value::Bytes(b"hi".to_vec().into()));

        let tuple = message_tuple(&event);
        assert_eq!(tuple[0], Datum::TimestampNanos(2_000_000_005));
        assert_eq!(tuple[1], Datum::Bytes(b"hi".to_vec()));
        assert_eq!(tuple[2], Datum::Null);
    }

    #[test]
    fn test_map_entries_become_key_value_tuples() {
        let mut tree = DynamicMessage::new(testing::descriptor("example.Tree"));
        let mut weights = std::collections::HashMap::new();
        weights.insert(MapKey::String("w".to_string()), Value::I64(3));
        tree.set_field_by_name("weights", Value::Map(weights));

        let field = tree.descriptor().get_field_by_name("weights").unwrap();
        assert_eq!(
            field_datum(&tree, &field),
            Datum::List(vec![Datum::Tuple(Tuple::new(vec![Datum::from("w"), Datum::Int64(3)]))])
        );
    }

    #[test]
    fn test_recursive_data_is_finite() {
        let mut leaf = DynamicMessage::new(testing::descriptor("example.Tree"));
        leaf.set_field_by_name("label", Value::String("leaf".to_string()));
        let mut root = DynamicMessage::new(testing::descriptor("example.Tree"));
        root.set_field_by_name("children", Value::List(vec![Value::Message(leaf)]));

        let tuple = message_tuple(&root);
        assert_eq!(tuple[0], Datum::Null);
        assert_eq!(
            tuple[1],
            Datum::List(vec![Datum::Tuple(Tuple::new(vec![
                Datum::from("leaf"),
                Datum::List(vec![]),
                Datum::List(vec![]),
            ]))])
        );
    }
}
