//! Descriptor and message fixtures shared by unit tests.
//!
//! Descriptors are assembled from `prost_types` protos so tests do not need
//! `protoc`. The fixture corresponds to:
//!
//! ```text
//! // google/protobuf/timestamp.proto (proto3)
//! message Timestamp { int64 seconds = 1; int32 nanos = 2; }
//!
//! // example.proto (proto2)
//! enum Color { RED = 0; GREEN = 1; BLUE = 2; }
//! message Address { optional string city = 1; optional string zip = 2; }
//! message Person {
//!   optional string name = 1;
//!   repeated string tags = 2;
//!   optional Address addr = 3;
//!   optional int32 age = 4;
//!   repeated Address previous = 5;
//!   optional Color color = 6;
//! }
//! message Tree {
//!   optional string label = 1;
//!   repeated Tree children = 2;
//!   map<string, int64> weights = 3;
//! }
//! message Event {
//!   optional google.protobuf.Timestamp at = 1;
//!   optional bytes payload = 2;
//!   optional double score = 3;
//!   optional uint64 count = 4;
//!   optional bool ok = 5;
//! }
//! ```

use std::sync::OnceLock;

use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, Value};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MessageOptions,
};

use crate::registry::{RecordType, TypeRegistry};

fn field(name: &str, number: i32, label: Label, ty: Type, type_name: Option<&str>) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        type_name: type_name.map(str::to_string),
        ..Default::default()
    }
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn timestamp_file() -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some("google/protobuf/timestamp.proto".to_string()),
        package: Some("google.protobuf".to_string()),
        message_type: vec![message(
            "Timestamp",
            vec![
                field("seconds", 1, Label::Optional, Type::Int64, None),
                field("nanos", 2, Label::Optional, Type::Int32, None),
            ],
        )],
        syntax: Some("proto3".to_string()),
        ..Default::default()
    }
}

fn example_file() -> FileDescriptorProto {
    let color = EnumDescriptorProto {
        name: Some("Color".to_string()),
        value: ["RED", "GREEN", "BLUE"]
            .iter()
            .enumerate()
            .map(|(i, name)| EnumValueDescriptorProto {
                name: Some(name.to_string()),
                number: Some(i as i32),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };

    let address = message(
        "Address",
        vec![
            field("city", 1, Label::Optional, Type::String, None),
            field("zip", 2, Label::Optional, Type::String, None),
        ],
    );

    let person = message(
        "Person",
        vec![
            field("name", 1, Label::Optional, Type::String, None),
            field("tags", 2, Label::Repeated, Type::String, None),
            field("addr", 3, Label::Optional, Type::Message, Some(".example.Address")),
            field("age", 4, Label::Optional, Type::Int32, None),
            field("previous", 5, Label::Repeated, Type::Message, Some(".example.Address")),
            field("color", 6, Label::Optional, Type::Enum, Some(".example.Color")),
        ],
    );

    let mut weights_entry = message(
        "WeightsEntry",
        vec![
            field("key", 1, Label::Optional, Type::String, None),
            field("value", 2, Label::Optional, Type::Int64, None),
        ],
    );
    weights_entry.options = Some(MessageOptions {
        map_entry: Some(true),
        ..Default::default()
    });
    let mut tree = message(
        "Tree",
        vec![
            field("label", 1, Label::Optional, Type::String, None),
            field("children", 2, Label::Repeated, Type::Message, Some(".example.Tree")),
            field("weights", 3, Label::Repeated, Type::Message, Some(".example.Tree.WeightsEntry")),
        ],
    );
    tree.nested_type.push(weights_entry);

    let event = message(
        "Event",
        vec![
            field("at", 1, Label::Optional, Type::Message, Some(".google.protobuf.Timestamp")),
            field("payload", 2, Label::Optional, Type::Bytes, None),
            field("score", 3, Label::Optional, Type::Double, None),
            field("count", 4, Label::Optional, Type::Uint64, None),
            field("ok", 5, Label::Optional, Type::Bool, None),
        ],
    );

    FileDescriptorProto {
        name: Some("example.proto".to_string()),
        package: Some("example".to_string()),
        dependency: vec!["google/protobuf/timestamp.proto".to_string()],
        message_type: vec![address, person, tree, event],
        enum_type: vec![color],
        syntax: Some("proto2".to_string()),
        ..Default::default()
    }
}

pub(crate) fn descriptor_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![timestamp_file(), example_file()],
    }
}

pub(crate) fn descriptor_set_bytes() -> Vec<u8> {
    descriptor_set().encode_to_vec()
}

/// The shared fixture pool. Descriptors compare equal only within one pool,
/// so every fixture comes from the same instance.
pub(crate) fn pool() -> DescriptorPool {
    static POOL: OnceLock<DescriptorPool> = OnceLock::new();
    POOL.get_or_init(|| {
        DescriptorPool::from_file_descriptor_set(descriptor_set()).expect("fixture descriptors are valid")
    })
    .clone()
}

pub(crate) fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register_pool(&pool());
    registry
}

pub(crate) fn descriptor(name: &str) -> MessageDescriptor {
    pool().get_message_by_name(name).expect("fixture message exists")
}

pub(crate) fn record_type(name: &str) -> RecordType {
    RecordType::new(descriptor(name))
}

pub(crate) fn address(city: &str, zip: &str) -> DynamicMessage {
    let mut msg = DynamicMessage::new(descriptor("example.Address"));
    msg.set_field_by_name("city", Value::String(city.to_string()));
    msg.set_field_by_name("zip", Value::String(zip.to_string()));
    msg
}

/// `{name: "a", tags: ["x", "y"], addr: {city: "NYC", zip: "10001"}}`
pub(crate) fn sample_person() -> DynamicMessage {
    person("a", &["x", "y"], Some(address("NYC", "10001")))
}

pub(crate) fn person(name: &str, tags: &[&str], addr: Option<DynamicMessage>) -> DynamicMessage {
    let mut msg = DynamicMessage::new(descriptor("example.Person"));
    msg.set_field_by_name("name", Value::String(name.to_string()));
    if !tags.is_empty() {
        msg.set_field_by_name(
            "tags",
            Value::List(tags.iter().map(|t| Value::String(t.to_string())).collect()),
        );
    }
    if let Some(addr) = addr {
        msg.set_field_by_name("addr", Value::Message(addr));
    }
    msg
}
