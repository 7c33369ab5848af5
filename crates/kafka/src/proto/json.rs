//! Decoded protobuf messages as JSON.
//!
//! Fields keep their schema names and definition order. Fields absent from
//! the wire are omitted. Enums render by value name, bytes as base64, and
//! non-finite floats as the strings `NaN`, `Infinity` and `-Infinity`.

use base64::Engine;
use kafka_types::{ProtoFieldValue, ProtoMessage, ProtoSchema, ProtoType};
use serde_json::{Map, Number, Value};

pub fn message_to_json(schema: &ProtoSchema, message: &ProtoMessage) -> Value {
    let mut object = Map::new();
    for field in message.descriptor.ordered_fields() {
        if let Some(value) = message.fields.get(&field.name) {
            object.insert(
                field.name.clone(),
                value_to_json(schema, &field.field_type, value),
            );
        }
    }
    Value::Object(object)
}

fn value_to_json(schema: &ProtoSchema, field_type: &ProtoType, value: &ProtoFieldValue) -> Value {
    match value {
        ProtoFieldValue::Double(d) => float_to_json(*d),
        // Shortest f32 representation, so 0.1f32 renders as 0.1.
        ProtoFieldValue::Float(f) => {
            float_to_json(f.to_string().parse::<f64>().unwrap_or(f64::from(*f)))
        }
        ProtoFieldValue::Int32(i) => Value::from(*i),
        ProtoFieldValue::Int64(i) => Value::from(*i),
        ProtoFieldValue::Uint32(u) => Value::from(*u),
        ProtoFieldValue::Uint64(u) => Value::from(*u),
        ProtoFieldValue::Bool(b) => Value::Bool(*b),
        ProtoFieldValue::String(s) => Value::String(s.clone()),
        ProtoFieldValue::Bytes(b) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
        ProtoFieldValue::Enum(number) => {
            let name = match field_type {
                ProtoType::Enum(enum_name) => schema
                    .get_enum(enum_name)
                    .and_then(|e| e.name_of(*number)),
                _ => None,
            };
            match name {
                Some(name) => Value::String(name.to_string()),
                None => Value::from(*number),
            }
        }
        ProtoFieldValue::Message(message) => message_to_json(schema, message),
        ProtoFieldValue::Repeated(values) => Value::Array(
            values
                .iter()
                .map(|v| value_to_json(schema, field_type, v))
                .collect(),
        ),
        ProtoFieldValue::Null => Value::Null,
    }
}

fn float_to_json(f: f64) -> Value {
    match Number::from_f64(f) {
        Some(n) => Value::Number(n),
        None if f.is_nan() => Value::String("NaN".to_string()),
        None if f > 0.0 => Value::String("Infinity".to_string()),
        None => Value::String("-Infinity".to_string()),
    }
}
