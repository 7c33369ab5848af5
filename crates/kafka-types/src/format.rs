//! Wire formats for message keys and values.

use crate::error::KafkaTypesError;
use std::fmt;
use std::str::FromStr;

/// Encoding of a single message field (key or value).
///
/// The three structural formats carry a schema registry header in front of
/// their payload and need a resolved schema to be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Raw bytes, passed through untouched.
    Bytes,
    /// UTF-8 text.
    #[default]
    Str,
    /// Schemaless JSON.
    Json,
    /// Protobuf with a registry header and message index list.
    Protobuf,
    /// Avro binary datum with a registry header.
    Avro,
    /// JSON validated against a registered JSON Schema.
    JsonSchema,
}

impl Format {
    /// Whether payloads in this format start with the registry header.
    pub fn is_structural(&self) -> bool {
        matches!(self, Format::Protobuf | Format::Avro | Format::JsonSchema)
    }

    /// The `schemaType` the registry expects when registering a schema.
    pub fn schema_type(&self) -> Option<&'static str> {
        match self {
            Format::Protobuf => Some("PROTOBUF"),
            Format::Avro => Some("AVRO"),
            Format::JsonSchema => Some("JSON"),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Bytes => "bytes",
            Format::Str => "str",
            Format::Json => "json",
            Format::Protobuf => "protobuf",
            Format::Avro => "avro",
            Format::JsonSchema => "jsonschema",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = KafkaTypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bytes" => Ok(Format::Bytes),
            "str" | "string" => Ok(Format::Str),
            "json" => Ok(Format::Json),
            "pb" | "protobuf" => Ok(Format::Protobuf),
            "avro" => Ok(Format::Avro),
            "jsonschema" => Ok(Format::JsonSchema),
            other => Err(KafkaTypesError::UnknownFormat(other.to_string())),
        }
    }
}
