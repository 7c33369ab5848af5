//! Protobuf type definitions.
//!
//! These types describe a parsed `.proto` schema and the messages decoded
//! against it. The parser and the wire decoder/encoder live in `kbridge-kafka`;
//! the schema cache in `kbridge-schema-registry` stores [`ProtoSchema`] values
//! as compiled descriptors.
//!
//! ## Naming
//!
//! Message and enum descriptors are keyed by their fully qualified name
//! without the leading dot (`snacks.Snack`, `snacks.Snack.Colour`). Field type
//! references produced by the parser keep the leading dot (`.snacks.Snack`);
//! [`ProtoSchema::get_message`] and [`ProtoSchema::get_enum`] accept both.

use std::collections::HashMap;

/// Represents a field value in a decoded protobuf message.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtoFieldValue {
    Double(f64),
    Float(f32),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    /// Enum number; the name is looked up in the schema when rendering.
    Enum(i32),
    Message(Box<ProtoMessage>),
    Repeated(Vec<ProtoFieldValue>),
    Null,
}

impl ProtoFieldValue {
    /// Get the type descriptor for this field value.
    pub fn proto_field_type(&self) -> ProtoType {
        match self {
            ProtoFieldValue::Double(_) => ProtoType::Double,
            ProtoFieldValue::Float(_) => ProtoType::Float,
            ProtoFieldValue::Int32(_) => ProtoType::Int32,
            ProtoFieldValue::Int64(_) => ProtoType::Int64,
            ProtoFieldValue::Uint32(_) => ProtoType::Uint32,
            ProtoFieldValue::Uint64(_) => ProtoType::Uint64,
            ProtoFieldValue::Bool(_) => ProtoType::Bool,
            ProtoFieldValue::String(_) => ProtoType::String,
            ProtoFieldValue::Bytes(_) => ProtoType::Bytes,
            ProtoFieldValue::Enum(_) => ProtoType::Enum(String::new()),
            ProtoFieldValue::Message(msg) => ProtoType::Message(msg.message_type.clone()),
            ProtoFieldValue::Repeated(_) => ProtoType::Repeated(Box::new(ProtoType::Null)),
            ProtoFieldValue::Null => ProtoType::Null,
        }
    }
}

/// A decoded protobuf message.
///
/// Only fields present on the wire appear in `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoMessage {
    /// Fully qualified message type name
    pub message_type: String,
    /// Decoded field values by field name
    pub fields: HashMap<String, ProtoFieldValue>,
    /// Schema reference for field introspection
    pub descriptor: ProtoMessageDescriptor,
}

/// Protobuf field type enumeration.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtoType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
    Message(String),
    Enum(String),
    Repeated(Box<ProtoType>),
    Optional(Box<ProtoType>),
    Null,
}

impl std::fmt::Display for ProtoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl ProtoType {
    /// Get the human-readable type name.
    pub fn type_name(&self) -> String {
        match self {
            ProtoType::Double => "double".to_string(),
            ProtoType::Float => "float".to_string(),
            ProtoType::Int32 => "int32".to_string(),
            ProtoType::Int64 => "int64".to_string(),
            ProtoType::Uint32 => "uint32".to_string(),
            ProtoType::Uint64 => "uint64".to_string(),
            ProtoType::Sint32 => "sint32".to_string(),
            ProtoType::Sint64 => "sint64".to_string(),
            ProtoType::Fixed32 => "fixed32".to_string(),
            ProtoType::Fixed64 => "fixed64".to_string(),
            ProtoType::Sfixed32 => "sfixed32".to_string(),
            ProtoType::Sfixed64 => "sfixed64".to_string(),
            ProtoType::Bool => "bool".to_string(),
            ProtoType::String => "string".to_string(),
            ProtoType::Bytes => "bytes".to_string(),
            ProtoType::Message(name) => format!("message:{name}"),
            ProtoType::Enum(name) => format!("enum:{name}"),
            ProtoType::Repeated(inner) => format!("repeated<{}>", inner.type_name()),
            ProtoType::Optional(inner) => format!("optional<{}>", inner.type_name()),
            ProtoType::Null => "null".to_string(),
        }
    }

    /// Scalar numeric types that proto3 packs by default when repeated.
    pub fn is_packable(&self) -> bool {
        !matches!(
            self,
            ProtoType::String
                | ProtoType::Bytes
                | ProtoType::Message(_)
                | ProtoType::Repeated(_)
                | ProtoType::Optional(_)
                | ProtoType::Null
        )
    }
}

/// Describes a single field in a protobuf message.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoFieldDescriptor {
    /// Field name as written in the schema
    pub name: String,
    /// camelCase name used by the canonical JSON mapping
    pub json_name: String,
    /// Field number (tag)
    pub number: i32,
    /// Element type; repetition is carried by `is_repeated`
    pub field_type: ProtoType,
    pub is_repeated: bool,
    pub is_optional: bool,
    /// proto2 `required`
    pub is_required: bool,
}

/// Describes a protobuf message type.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoMessageDescriptor {
    /// Fully qualified message name (e.g., "snacks.Snack")
    pub name: String,
    /// Map of field names to their descriptors
    pub fields: HashMap<String, ProtoFieldDescriptor>,
    /// Ordered list of field names (preserves proto definition order)
    pub field_order: Vec<String>,
    /// Fully qualified names of nested message types, in declaration order
    pub nested: Vec<String>,
}

impl ProtoMessageDescriptor {
    /// Get a field descriptor by name.
    pub fn get_field(&self, name: &str) -> Option<&ProtoFieldDescriptor> {
        self.fields.get(name)
    }

    /// Get a field descriptor by its schema name or its camelCase JSON name.
    pub fn get_field_by_json_key(&self, key: &str) -> Option<&ProtoFieldDescriptor> {
        self.fields
            .get(key)
            .or_else(|| self.fields.values().find(|f| f.json_name == key))
    }

    /// Get a field descriptor by tag number.
    pub fn get_field_by_number(&self, number: i32) -> Option<&ProtoFieldDescriptor> {
        self.fields.values().find(|f| f.number == number)
    }

    /// List all field names in definition order.
    pub fn list_fields(&self) -> &[String] {
        &self.field_order
    }

    /// Iterate field descriptors in definition order.
    pub fn ordered_fields(&self) -> impl Iterator<Item = &ProtoFieldDescriptor> {
        self.field_order.iter().filter_map(|n| self.fields.get(n))
    }
}

/// Describes a protobuf enum type.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoEnumDescriptor {
    pub name: String,
    /// `(value name, number)` in declaration order
    pub values: Vec<(String, i32)>,
}

impl ProtoEnumDescriptor {
    pub fn name_of(&self, number: i32) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, n)| *n == number)
            .map(|(name, _)| name.as_str())
    }

    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

/// A parsed protobuf schema containing message and enum types.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProtoSchema {
    /// Map of fully qualified message names to their descriptors
    pub messages: HashMap<String, ProtoMessageDescriptor>,
    /// Fully qualified names of top-level messages, in declaration order
    pub message_order: Vec<String>,
    /// Map of fully qualified enum names to their descriptors
    pub enums: HashMap<String, ProtoEnumDescriptor>,
}

impl ProtoSchema {
    /// Get a message descriptor by fully qualified name, with or without the
    /// leading dot. Falls back to a unique simple-name match.
    pub fn get_message(&self, name: &str) -> Option<&ProtoMessageDescriptor> {
        let name = name.strip_prefix('.').unwrap_or(name);
        if let Some(message) = self.messages.get(name) {
            return Some(message);
        }
        let suffix = format!(".{name}");
        let mut candidates = self.messages.values().filter(|m| m.name.ends_with(&suffix));
        match (candidates.next(), candidates.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    /// Get an enum descriptor by fully qualified name, with or without the
    /// leading dot.
    pub fn get_enum(&self, name: &str) -> Option<&ProtoEnumDescriptor> {
        let name = name.strip_prefix('.').unwrap_or(name);
        self.enums.get(name)
    }

    /// The first top-level message, which is the one a schema registry
    /// payload with message index `[0]` refers to.
    pub fn root_message(&self) -> Option<&ProtoMessageDescriptor> {
        self.message_order
            .first()
            .and_then(|name| self.messages.get(name))
    }

    /// Resolve a Confluent message index path: the first index selects a
    /// top-level message, each further index a nested message of the previous.
    /// An empty path means the first top-level message.
    pub fn message_by_index(&self, indexes: &[i32]) -> Option<&ProtoMessageDescriptor> {
        let Some((first, rest)) = indexes.split_first() else {
            return self.root_message();
        };
        let name = self.message_order.get(usize::try_from(*first).ok()?)?;
        let mut current = self.messages.get(name)?;
        for index in rest {
            let nested = current.nested.get(usize::try_from(*index).ok()?)?;
            current = self.messages.get(nested)?;
        }
        Some(current)
    }

    /// List all message type names in the schema.
    pub fn list_messages(&self) -> Vec<String> {
        self.messages.keys().cloned().collect()
    }
}
