//! Compiled type descriptors.
//!
//! A [`DescriptorBuilder`] turns registry schema text into something the codec
//! can serialize against. Each structural format has one builder; the
//! protobuf builder lives in `kbridge-kafka` next to the protobuf parser.

use crate::error::{Error, Result};
use kafka_types::{Format, ProtoSchema, SchemaId};
use std::fmt;
use std::sync::Arc;

/// A schema compiled into its format's runtime representation.
#[derive(Clone)]
pub enum TypeDescriptor {
    Protobuf(ProtoSchema),
    Avro(apache_avro::Schema),
    JsonSchema(Arc<jsonschema::Validator>),
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Protobuf(schema) => f
                .debug_tuple("Protobuf")
                .field(&schema.message_order)
                .finish(),
            TypeDescriptor::Avro(schema) => f.debug_tuple("Avro").field(schema).finish(),
            TypeDescriptor::JsonSchema(_) => f.write_str("JsonSchema(..)"),
        }
    }
}

impl TypeDescriptor {
    pub fn format(&self) -> Format {
        match self {
            TypeDescriptor::Protobuf(_) => Format::Protobuf,
            TypeDescriptor::Avro(_) => Format::Avro,
            TypeDescriptor::JsonSchema(_) => Format::JsonSchema,
        }
    }
}

/// Compiles schema text for one structural format.
///
/// Compilation may block (for example on an external compiler process); the
/// schema cache calls it at most once per schema id.
pub trait DescriptorBuilder: Send + Sync {
    fn format(&self) -> Format;

    fn compile(&self, id: SchemaId, text: &str) -> Result<TypeDescriptor>;
}

/// Parses Avro schema JSON with `apache-avro`.
#[derive(Debug, Default, Clone, Copy)]
pub struct AvroDescriptorBuilder;

impl DescriptorBuilder for AvroDescriptorBuilder {
    fn format(&self) -> Format {
        Format::Avro
    }

    fn compile(&self, id: SchemaId, text: &str) -> Result<TypeDescriptor> {
        let schema = apache_avro::Schema::parse_str(text).map_err(|e| Error::SchemaCompile {
            format: Format::Avro,
            id,
            message: e.to_string(),
        })?;
        Ok(TypeDescriptor::Avro(schema))
    }
}

/// Builds a `jsonschema` validator.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSchemaDescriptorBuilder;

impl DescriptorBuilder for JsonSchemaDescriptorBuilder {
    fn format(&self) -> Format {
        Format::JsonSchema
    }

    fn compile(&self, id: SchemaId, text: &str) -> Result<TypeDescriptor> {
        let compile_error = |message: String| Error::SchemaCompile {
            format: Format::JsonSchema,
            id,
            message,
        };
        let schema: serde_json::Value =
            serde_json::from_str(text).map_err(|e| compile_error(e.to_string()))?;
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| compile_error(e.to_string()))?;
        Ok(TypeDescriptor::JsonSchema(Arc::new(validator)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_avro_builder() {
        let text = r#"{"type": "record", "name": "Snack", "fields": [{"name": "name", "type": "string"}]}"#;
        let descriptor = AvroDescriptorBuilder.compile(SchemaId(1), text).unwrap();
        assert_eq!(descriptor.format(), Format::Avro);
    }

    #[test]
    fn test_avro_builder_rejects_garbage() {
        let err = AvroDescriptorBuilder
            .compile(SchemaId(9), "{not avro")
            .unwrap_err();
        match err {
            Error::SchemaCompile { format, id, .. } => {
                assert_eq!(format, Format::Avro);
                assert_eq!(id, SchemaId(9));
            }
            other => panic!("expected SchemaCompile, got {other:?}"),
        }
    }

    #[test]
    fn test_json_schema_builder_validates() {
        let text = r#"{"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}"#;
        let descriptor = JsonSchemaDescriptorBuilder
            .compile(SchemaId(2), text)
            .unwrap();
        let TypeDescriptor::JsonSchema(validator) = descriptor else {
            panic!("expected a JSON Schema descriptor");
        };
        assert!(validator.is_valid(&json!({"name": "cookie"})));
        assert!(!validator.is_valid(&json!({"calories": 1})));
    }
}
