//! Protobuf decoder implementation.
//!
//! Decodes wire bytes into `ProtoMessage` values from kafka-types using a
//! parsed schema. Unknown fields are skipped, and repeated scalars are
//! accepted both packed and unpacked.

use crate::error::{Error, Result};
use crate::proto::indexes::read_message_indexes;
use kafka_types::{
    ProtoFieldDescriptor, ProtoFieldValue, ProtoMessage, ProtoMessageDescriptor, ProtoSchema,
    ProtoType,
};
use protobuf::CodedInputStream;
use std::collections::HashMap;

const WIRE_VARINT: u32 = 0;
const WIRE_FIXED64: u32 = 1;
const WIRE_LENGTH_DELIMITED: u32 = 2;
const WIRE_FIXED32: u32 = 5;

fn decode_err(e: impl std::fmt::Display) -> Error {
    Error::ProtobufDecode(e.to_string())
}

/// Runtime protobuf decoder borrowing a parsed schema.
pub struct ProtoDecoder<'a> {
    schema: &'a ProtoSchema,
}

impl<'a> ProtoDecoder<'a> {
    pub fn new(schema: &'a ProtoSchema) -> Self {
        Self { schema }
    }

    /// Decode a protobuf message of `message_type` from bytes.
    pub fn decode(&self, message_type: &str, data: &[u8]) -> Result<ProtoMessage> {
        let descriptor = self
            .schema
            .get_message(message_type)
            .ok_or_else(|| Error::MessageTypeNotFound(message_type.to_string()))?;
        let mut stream = CodedInputStream::from_bytes(data);
        self.decode_message(descriptor, &mut stream)
    }

    /// Decode a payload that starts with a Confluent message-index list (the
    /// bytes right after the 5-byte registry header).
    pub fn decode_framed(&self, data: &[u8]) -> Result<ProtoMessage> {
        let mut stream = CodedInputStream::from_bytes(data);
        let indexes = read_message_indexes(&mut stream)?;
        let descriptor = self.schema.message_by_index(&indexes).ok_or_else(|| {
            Error::MessageTypeNotFound(format!("message index path {indexes:?}"))
        })?;
        self.decode_message(descriptor, &mut stream)
    }

    fn decode_message(
        &self,
        descriptor: &ProtoMessageDescriptor,
        stream: &mut CodedInputStream,
    ) -> Result<ProtoMessage> {
        let mut fields = HashMap::new();

        while !stream.eof().map_err(decode_err)? {
            let tag = stream.read_raw_varint32().map_err(decode_err)?;
            if tag == 0 {
                return Err(Error::ProtobufDecode(format!(
                    "invalid tag 0 in message {}",
                    descriptor.name
                )));
            }

            let field_number = (tag >> 3) as i32;
            let wire_type = tag & 0x7;

            let Some(field_desc) = descriptor.get_field_by_number(field_number) else {
                skip_field(stream, wire_type)?;
                continue;
            };

            if field_desc.is_repeated {
                let existing = fields
                    .entry(field_desc.name.clone())
                    .or_insert_with(|| ProtoFieldValue::Repeated(Vec::new()));
                let ProtoFieldValue::Repeated(values) = existing else {
                    continue;
                };

                if wire_type == WIRE_LENGTH_DELIMITED && field_desc.field_type.is_packable() {
                    let len = stream.read_raw_varint64().map_err(decode_err)?;
                    let old_limit = stream.push_limit(len).map_err(decode_err)?;
                    while !stream.eof().map_err(decode_err)? {
                        values.push(self.decode_field_value(field_desc, stream)?);
                    }
                    stream.pop_limit(old_limit);
                } else {
                    values.push(self.decode_field_value(field_desc, stream)?);
                }
                continue;
            }

            let value = self.decode_field_value(field_desc, stream)?;
            fields.insert(field_desc.name.clone(), value);
        }

        Ok(ProtoMessage {
            message_type: descriptor.name.clone(),
            fields,
            descriptor: descriptor.clone(),
        })
    }

    fn decode_field_value(
        &self,
        field_desc: &ProtoFieldDescriptor,
        stream: &mut CodedInputStream,
    ) -> Result<ProtoFieldValue> {
        Ok(match &field_desc.field_type {
            ProtoType::Double => ProtoFieldValue::Double(stream.read_double().map_err(decode_err)?),
            ProtoType::Float => ProtoFieldValue::Float(stream.read_float().map_err(decode_err)?),
            ProtoType::Int32 => ProtoFieldValue::Int32(stream.read_int32().map_err(decode_err)?),
            ProtoType::Sint32 => ProtoFieldValue::Int32(stream.read_sint32().map_err(decode_err)?),
            ProtoType::Sfixed32 => {
                ProtoFieldValue::Int32(stream.read_sfixed32().map_err(decode_err)?)
            }
            ProtoType::Int64 => ProtoFieldValue::Int64(stream.read_int64().map_err(decode_err)?),
            ProtoType::Sint64 => ProtoFieldValue::Int64(stream.read_sint64().map_err(decode_err)?),
            ProtoType::Sfixed64 => {
                ProtoFieldValue::Int64(stream.read_sfixed64().map_err(decode_err)?)
            }
            ProtoType::Uint32 => ProtoFieldValue::Uint32(stream.read_uint32().map_err(decode_err)?),
            ProtoType::Fixed32 => {
                ProtoFieldValue::Uint32(stream.read_fixed32().map_err(decode_err)?)
            }
            ProtoType::Uint64 => ProtoFieldValue::Uint64(stream.read_uint64().map_err(decode_err)?),
            ProtoType::Fixed64 => {
                ProtoFieldValue::Uint64(stream.read_fixed64().map_err(decode_err)?)
            }
            ProtoType::Bool => ProtoFieldValue::Bool(stream.read_bool().map_err(decode_err)?),
            ProtoType::String => ProtoFieldValue::String(stream.read_string().map_err(decode_err)?),
            ProtoType::Bytes => ProtoFieldValue::Bytes(stream.read_bytes().map_err(decode_err)?),
            ProtoType::Enum(_) => ProtoFieldValue::Enum(stream.read_int32().map_err(decode_err)?),
            ProtoType::Message(type_name) => {
                let len = stream.read_raw_varint64().map_err(decode_err)?;
                let old_limit = stream.push_limit(len).map_err(decode_err)?;

                let nested_descriptor = self
                    .schema
                    .get_message(type_name)
                    .ok_or_else(|| Error::MessageTypeNotFound(type_name.clone()))?;
                let nested_message = self.decode_message(nested_descriptor, stream)?;

                stream.pop_limit(old_limit);
                ProtoFieldValue::Message(Box::new(nested_message))
            }
            other => {
                return Err(Error::ProtobufDecode(format!(
                    "Unsupported field type: {other}"
                )))
            }
        })
    }
}

fn skip_field(stream: &mut CodedInputStream, wire_type: u32) -> Result<()> {
    match wire_type {
        WIRE_VARINT => {
            stream.read_raw_varint64().map_err(decode_err)?;
        }
        WIRE_FIXED64 => {
            stream.read_raw_little_endian64().map_err(decode_err)?;
        }
        WIRE_LENGTH_DELIMITED => {
            let len = stream.read_raw_varint32().map_err(decode_err)?;
            stream.skip_raw_bytes(len).map_err(decode_err)?;
        }
        WIRE_FIXED32 => {
            stream.read_raw_little_endian32().map_err(decode_err)?;
        }
        other => {
            return Err(Error::ProtobufDecode(format!(
                "unsupported wire type {other} for unknown field"
            )))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::parser::{parse_str, ProtoCompiler};
    use protobuf::CodedOutputStream;

    fn schema(proto: &str) -> ProtoSchema {
        parse_str(proto, &ProtoCompiler::Pure).expect("Failed to parse proto")
    }

    fn write(f: impl FnOnce(&mut CodedOutputStream)) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut stream = CodedOutputStream::vec(&mut buffer);
            f(&mut stream);
            stream.flush().unwrap();
        }
        buffer
    }

    #[test]
    fn test_decode_signed_and_fixed_types() {
        let schema = schema(
            r#"
            syntax = "proto3";
            message Numbers {
                sint32 a = 1;
                sint64 b = 2;
                sfixed32 c = 3;
                fixed64 d = 4;
            }
        "#,
        );
        let data = write(|s| {
            s.write_sint32(1, -5).unwrap();
            s.write_sint64(2, -7_000_000_000).unwrap();
            s.write_sfixed32(3, -9).unwrap();
            s.write_fixed64(4, u64::MAX).unwrap();
        });

        let message = ProtoDecoder::new(&schema).decode("Numbers", &data).unwrap();
        assert_eq!(message.fields["a"], ProtoFieldValue::Int32(-5));
        assert_eq!(message.fields["b"], ProtoFieldValue::Int64(-7_000_000_000));
        assert_eq!(message.fields["c"], ProtoFieldValue::Int32(-9));
        assert_eq!(message.fields["d"], ProtoFieldValue::Uint64(u64::MAX));
    }

    #[test]
    fn test_decode_packed_repeated_and_skips_unknown() {
        let schema = schema(
            r#"
            syntax = "proto3";
            message Scores {
                repeated int32 values = 1;
            }
        "#,
        );
        let packed = write(|s| {
            s.write_string(9, "ignored").unwrap();
            let mut body = Vec::new();
            {
                let mut inner = CodedOutputStream::vec(&mut body);
                for v in [3, 270, 86942] {
                    inner.write_int32_no_tag(v).unwrap();
                }
                inner.flush().unwrap();
            }
            s.write_bytes(1, &body).unwrap();
            s.write_int32(1, 4).unwrap();
        });

        let message = ProtoDecoder::new(&schema).decode("Scores", &packed).unwrap();
        assert_eq!(
            message.fields["values"],
            ProtoFieldValue::Repeated(vec![
                ProtoFieldValue::Int32(3),
                ProtoFieldValue::Int32(270),
                ProtoFieldValue::Int32(86942),
                ProtoFieldValue::Int32(4),
            ])
        );
        assert!(!message.fields.contains_key("ignored"));
    }

    #[test]
    fn test_decode_nested_message_and_enum() {
        let schema = schema(
            r#"
            syntax = "proto3";
            package shop;
            enum Status { OPEN = 0; SHIPPED = 1; }
            message Line { string sku = 1; }
            message Order {
                Line line = 1;
                Status status = 2;
            }
        "#,
        );
        let line = write(|s| s.write_string(1, "abc").unwrap());
        let data = write(|s| {
            s.write_bytes(1, &line).unwrap();
            s.write_enum(2, 1).unwrap();
        });

        let message = ProtoDecoder::new(&schema).decode("shop.Order", &data).unwrap();
        let ProtoFieldValue::Message(nested) = &message.fields["line"] else {
            panic!("expected nested message");
        };
        assert_eq!(nested.message_type, "shop.Line");
        assert_eq!(
            nested.fields["sku"],
            ProtoFieldValue::String("abc".to_string())
        );
        assert_eq!(message.fields["status"], ProtoFieldValue::Enum(1));
    }

    #[test]
    fn test_decode_framed_uses_index_path() {
        let schema = schema(
            r#"
            syntax = "proto3";
            message First { string a = 1; }
            message Second { string b = 1; }
        "#,
        );
        // index list [1]: count 1, index 1, both zigzag encoded
        let mut data = vec![0x02, 0x02];
        data.extend(write(|s| s.write_string(1, "x").unwrap()));

        let message = ProtoDecoder::new(&schema).decode_framed(&data).unwrap();
        assert_eq!(message.message_type, "Second");

        let mut default_index = vec![0x00];
        default_index.extend(write(|s| s.write_string(1, "y").unwrap()));
        let message = ProtoDecoder::new(&schema)
            .decode_framed(&default_index)
            .unwrap();
        assert_eq!(message.message_type, "First");
    }

    #[test]
    fn test_decode_truncated_payload() {
        let schema = schema(
            r#"
            syntax = "proto3";
            message Text { string value = 1; }
        "#,
        );
        let err = ProtoDecoder::new(&schema)
            .decode("Text", &[0x0a, 0x05, b'a'])
            .unwrap_err();
        assert!(matches!(err, Error::ProtobufDecode(_)));
    }
}
