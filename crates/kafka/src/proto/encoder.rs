//! JSON to protobuf wire format.
//!
//! The encoding follows the protobuf wire format:
//! - Each field is encoded as (tag, value) pairs
//! - Tag = (field_number << 3) | wire_type
//! - Wire types: 0=varint, 1=64-bit, 2=length-delimited, 5=32-bit
//!
//! Fields are written in definition order. JSON keys may be the schema field
//! name or its camelCase JSON name. Repeated fields are written unpacked,
//! which every protobuf reader accepts.

use crate::error::{Error, Result};
use base64::Engine;
use kafka_types::{ProtoFieldDescriptor, ProtoMessageDescriptor, ProtoSchema, ProtoType};
use protobuf::CodedOutputStream;
use serde_json::Value;

fn encode_err(e: protobuf::Error) -> Error {
    Error::ProtobufEncode(e.to_string())
}

/// Runtime protobuf encoder borrowing a parsed schema.
pub struct ProtoEncoder<'a> {
    schema: &'a ProtoSchema,
}

impl<'a> ProtoEncoder<'a> {
    pub fn new(schema: &'a ProtoSchema) -> Self {
        Self { schema }
    }

    /// Encode a JSON object as a message of `message_type`.
    pub fn encode(&self, message_type: &str, value: &Value) -> Result<Vec<u8>> {
        let descriptor = self
            .schema
            .get_message(message_type)
            .ok_or_else(|| Error::MessageTypeNotFound(message_type.to_string()))?;
        self.encode_message(descriptor, value)
    }

    fn encode_message(&self, descriptor: &ProtoMessageDescriptor, value: &Value) -> Result<Vec<u8>> {
        let object = value.as_object().ok_or_else(|| {
            Error::ProtobufEncode(format!(
                "expected a JSON object for message {}, got {value}",
                descriptor.name
            ))
        })?;

        for key in object.keys() {
            if descriptor.get_field_by_json_key(key).is_none() {
                return Err(Error::FieldNotFound {
                    message: descriptor.name.clone(),
                    field: key.clone(),
                });
            }
        }

        let mut buffer = Vec::new();
        {
            let mut stream = CodedOutputStream::vec(&mut buffer);

            for field in descriptor.ordered_fields() {
                let field_value = object
                    .get(&field.name)
                    .or_else(|| object.get(&field.json_name));

                let field_value = match field_value {
                    None | Some(Value::Null) => {
                        if field.is_required {
                            return Err(Error::MissingRequiredField {
                                message: descriptor.name.clone(),
                                field: field.name.clone(),
                            });
                        }
                        continue;
                    }
                    Some(v) => v,
                };

                if field.is_repeated {
                    let items = field_value.as_array().ok_or_else(|| invalid(field, field_value))?;
                    for item in items {
                        self.encode_field(&mut stream, field, item)?;
                    }
                } else {
                    self.encode_field(&mut stream, field, field_value)?;
                }
            }

            stream.flush().map_err(encode_err)?;
        }

        Ok(buffer)
    }

    /// Encode a single value with its field number.
    fn encode_field(
        &self,
        stream: &mut CodedOutputStream,
        field: &ProtoFieldDescriptor,
        value: &Value,
    ) -> Result<()> {
        let number = u32::try_from(field.number)
            .map_err(|_| Error::ProtobufEncode(format!("invalid field number {}", field.number)))?;

        let written = match &field.field_type {
            ProtoType::Double => stream.write_double(number, as_f64(field, value)?),
            ProtoType::Float => stream.write_float(number, as_f64(field, value)? as f32),
            ProtoType::Int32 => stream.write_int32(number, as_i32(field, value)?),
            ProtoType::Sint32 => stream.write_sint32(number, as_i32(field, value)?),
            ProtoType::Sfixed32 => stream.write_sfixed32(number, as_i32(field, value)?),
            ProtoType::Int64 => stream.write_int64(number, as_i64(field, value)?),
            ProtoType::Sint64 => stream.write_sint64(number, as_i64(field, value)?),
            ProtoType::Sfixed64 => stream.write_sfixed64(number, as_i64(field, value)?),
            ProtoType::Uint32 => stream.write_uint32(number, as_u32(field, value)?),
            ProtoType::Fixed32 => stream.write_fixed32(number, as_u32(field, value)?),
            ProtoType::Uint64 => stream.write_uint64(number, as_u64(field, value)?),
            ProtoType::Fixed64 => stream.write_fixed64(number, as_u64(field, value)?),
            ProtoType::Bool => {
                let b = value.as_bool().ok_or_else(|| invalid(field, value))?;
                stream.write_bool(number, b)
            }
            ProtoType::String => {
                let s = value.as_str().ok_or_else(|| invalid(field, value))?;
                stream.write_string(number, s)
            }
            ProtoType::Bytes => {
                let s = value.as_str().ok_or_else(|| invalid(field, value))?;
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .map_err(|_| invalid(field, value))?;
                stream.write_bytes(number, &bytes)
            }
            ProtoType::Enum(enum_name) => {
                let enum_number = match value {
                    Value::String(name) => self
                        .schema
                        .get_enum(enum_name)
                        .and_then(|e| e.number_of(name))
                        .ok_or_else(|| invalid(field, value))?,
                    _ => as_i32(field, value)?,
                };
                stream.write_enum(number, enum_number)
            }
            ProtoType::Message(type_name) => {
                let nested = self
                    .schema
                    .get_message(type_name)
                    .ok_or_else(|| Error::MessageTypeNotFound(type_name.clone()))?;
                let bytes = self.encode_message(nested, value)?;
                // Write as length-delimited message
                stream.write_bytes(number, &bytes)
            }
            other => {
                return Err(Error::ProtobufEncode(format!(
                    "Unsupported field type: {other}"
                )))
            }
        };
        written.map_err(encode_err)
    }
}

fn invalid(field: &ProtoFieldDescriptor, value: &Value) -> Error {
    Error::InvalidFieldValue {
        field: field.name.clone(),
        expected: field.field_type.clone(),
        actual: value.to_string(),
    }
}

fn as_f64(field: &ProtoFieldDescriptor, value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| invalid(field, value)),
        Value::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other.parse().map_err(|_| invalid(field, value)),
        },
        _ => Err(invalid(field, value)),
    }
}

fn as_i64(field: &ProtoFieldDescriptor, value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| invalid(field, value)),
        Value::String(s) => s.parse().map_err(|_| invalid(field, value)),
        _ => Err(invalid(field, value)),
    }
}

fn as_u64(field: &ProtoFieldDescriptor, value: &Value) -> Result<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
            .ok_or_else(|| invalid(field, value)),
        Value::String(s) => s.parse().map_err(|_| invalid(field, value)),
        _ => Err(invalid(field, value)),
    }
}

fn as_i32(field: &ProtoFieldDescriptor, value: &Value) -> Result<i32> {
    i32::try_from(as_i64(field, value)?).map_err(|_| invalid(field, value))
}

fn as_u32(field: &ProtoFieldDescriptor, value: &Value) -> Result<u32> {
    u32::try_from(as_u64(field, value)?).map_err(|_| invalid(field, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::decoder::ProtoDecoder;
    use crate::proto::json::message_to_json;
    use crate::proto::parser::{parse_str, ProtoCompiler};
    use serde_json::json;

    const SNACK_PROTO: &str = r#"
        message Snack {
            required string name = 1;
            required float calories = 2;
            optional string colour = 3;
        }
    "#;

    fn snack_schema() -> ProtoSchema {
        parse_str(SNACK_PROTO, &ProtoCompiler::Pure).expect("Failed to parse proto")
    }

    #[test]
    fn test_encode_then_decode_snack() {
        let schema = snack_schema();
        let input = json!({"name": "cookie", "calories": 500.0, "colour": "brown"});

        let bytes = ProtoEncoder::new(&schema).encode("Snack", &input).unwrap();
        let message = ProtoDecoder::new(&schema).decode("Snack", &bytes).unwrap();

        assert_eq!(message_to_json(&schema, &message), input);
    }

    #[test]
    fn test_encode_writes_definition_order() {
        let schema = snack_schema();
        let bytes = ProtoEncoder::new(&schema)
            .encode("Snack", &json!({"calories": 1.0, "name": "a"}))
            .unwrap();
        // field 1 (string "a") comes before field 2 (float)
        assert_eq!(&bytes[..3], &[0x0a, 0x01, b'a']);
        assert_eq!(bytes[3], 0x15);
    }

    #[test]
    fn test_missing_required_field() {
        let schema = snack_schema();
        let err = ProtoEncoder::new(&schema)
            .encode("Snack", &json!({"name": "cake"}))
            .unwrap_err();
        assert!(matches!(err, Error::MissingRequiredField { ref field, .. } if field == "calories"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let schema = snack_schema();
        let err = ProtoEncoder::new(&schema)
            .encode("Snack", &json!({"name": "cake", "calories": 1, "sugar": 3}))
            .unwrap_err();
        assert!(matches!(err, Error::FieldNotFound { ref field, .. } if field == "sugar"));
    }

    #[test]
    fn test_type_mismatch() {
        let schema = snack_schema();
        let err = ProtoEncoder::new(&schema)
            .encode("Snack", &json!({"name": 7, "calories": 1}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFieldValue { .. }));
    }

    #[test]
    fn test_nested_repeated_enum_and_camel_case_keys() {
        let schema = parse_str(
            r#"
            syntax = "proto3";
            package shop;
            message Order {
                message Line {
                    string sku = 1;
                    int64 quantity = 2;
                }
                enum Status { OPEN = 0; SHIPPED = 1; }
                string order_id = 1;
                repeated Line lines = 2;
                Status status = 3;
                repeated sint32 deltas = 4;
            }
        "#,
            &ProtoCompiler::Pure,
        )
        .unwrap();

        let input = json!({
            "orderId": "o-1",
            "lines": [{"sku": "a", "quantity": 2}, {"sku": "b", "quantity": "9000000000"}],
            "status": "SHIPPED",
            "deltas": [-1, 2]
        });
        let bytes = ProtoEncoder::new(&schema).encode("shop.Order", &input).unwrap();
        let message = ProtoDecoder::new(&schema).decode("shop.Order", &bytes).unwrap();

        assert_eq!(
            message_to_json(&schema, &message),
            json!({
                "order_id": "o-1",
                "lines": [{"sku": "a", "quantity": 2}, {"sku": "b", "quantity": 9000000000i64}],
                "status": "SHIPPED",
                "deltas": [-1, 2]
            })
        );
    }
}
