use crate::error::{Error, Result};
use kafka_types::{
    ProtoEnumDescriptor, ProtoFieldDescriptor, ProtoMessageDescriptor, ProtoSchema, ProtoType,
};
use protobuf::descriptor::field_descriptor_proto::{Label, Type};
use protobuf::descriptor::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto};
use protobuf_parse::Parser;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Which schema compiler turns `.proto` text into descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProtoCompiler {
    /// In-process parser from `protobuf-parse`.
    #[default]
    Pure,
    /// External `protoc`, from `PATH` unless a path is given.
    Protoc(Option<PathBuf>),
}

/// Parse a .proto file and create a schema.
///
/// Top-level messages keep their declaration order in
/// `ProtoSchema::message_order`, which is what Confluent message indexes
/// refer to.
pub fn parse_file<P: AsRef<Path>>(path: P, compiler: &ProtoCompiler) -> Result<ProtoSchema> {
    let p = path.as_ref();

    let mut parser = Parser::new();
    match compiler {
        ProtoCompiler::Pure => {
            parser.pure();
        }
        ProtoCompiler::Protoc(protoc_path) => {
            parser.protoc();
            if let Some(protoc_path) = protoc_path {
                parser.protoc_path(protoc_path);
            }
        }
    }
    parser.input(p);

    // Get parent directory of the schema file for includes
    if let Some(parent) = p.parent() {
        parser.include(parent);
    }

    let parsed = parser
        .parse_and_typecheck()
        .map_err(|e| Error::ProtobufParse(e.to_string()))?;

    let input_name = p
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut schema = ProtoSchema::default();

    for file_descriptor in &parsed.file_descriptors {
        let package = file_descriptor.package.clone().unwrap_or_default();
        let is_input = file_descriptor
            .name
            .as_deref()
            .is_some_and(|name| name == input_name || name.ends_with(&format!("/{input_name}")));

        for enum_type in &file_descriptor.enum_type {
            collect_enum(&mut schema, &package, enum_type);
        }
        for message in &file_descriptor.message_type {
            let full_name = collect_message(&mut schema, &package, message)?;
            if is_input {
                schema.message_order.push(full_name);
            }
        }
    }

    if schema.message_order.is_empty() {
        return Err(Error::ProtobufParse(format!(
            "no message types defined in {}",
            p.display()
        )));
    }

    Ok(schema)
}

/// Parse .proto content from a string, through a scratch file.
pub fn parse_str(content: &str, compiler: &ProtoCompiler) -> Result<ProtoSchema> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("schema.proto");
    std::fs::write(&path, content)?;
    parse_file(&path, compiler)
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{scope}.{name}")
    }
}

fn collect_enum(schema: &mut ProtoSchema, scope: &str, enum_type: &EnumDescriptorProto) {
    let name = qualify(scope, enum_type.name.as_deref().unwrap_or_default());
    let values = enum_type
        .value
        .iter()
        .map(|v| (v.name.clone().unwrap_or_default(), v.number.unwrap_or(0)))
        .collect();
    schema
        .enums
        .insert(name.clone(), ProtoEnumDescriptor { name, values });
}

/// Register `message` and everything nested in it; returns its full name.
fn collect_message(
    schema: &mut ProtoSchema,
    scope: &str,
    message: &DescriptorProto,
) -> Result<String> {
    let full_name = qualify(scope, message.name.as_deref().unwrap_or_default());

    for enum_type in &message.enum_type {
        collect_enum(schema, &full_name, enum_type);
    }

    let mut nested = Vec::with_capacity(message.nested_type.len());
    for nested_type in &message.nested_type {
        nested.push(collect_message(schema, &full_name, nested_type)?);
    }

    let mut fields = HashMap::new();
    let mut field_order = Vec::new();

    for field in &message.field {
        let field_name = field.name.clone().unwrap_or_default();
        if field_name.is_empty() {
            continue;
        }
        field_order.push(field_name.clone());

        let label = field.label.map(|l| l.enum_value_or_default());
        let descriptor = ProtoFieldDescriptor {
            name: field_name.clone(),
            json_name: field
                .json_name
                .clone()
                .unwrap_or_else(|| json_name(&field_name)),
            number: field.number.unwrap_or(0),
            field_type: parse_field_type(field)?,
            is_repeated: label == Some(Label::LABEL_REPEATED),
            is_optional: label == Some(Label::LABEL_OPTIONAL),
            is_required: label == Some(Label::LABEL_REQUIRED),
        };

        fields.insert(field_name, descriptor);
    }

    schema.messages.insert(
        full_name.clone(),
        ProtoMessageDescriptor {
            name: full_name.clone(),
            fields,
            field_order,
            nested,
        },
    );

    Ok(full_name)
}

/// lowerCamelCase name used by the canonical JSON mapping.
fn json_name(field_name: &str) -> String {
    let mut out = String::with_capacity(field_name.len());
    let mut upper_next = false;
    for c in field_name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_field_type(field: &FieldDescriptorProto) -> Result<ProtoType> {
    let field_type_enum_or_unknown = field
        .type_
        .ok_or_else(|| Error::ProtobufParse("Field missing type".to_string()))?;

    // Convert EnumOrUnknown to the enum value
    let field_type_enum = field_type_enum_or_unknown.enum_value_or_default();

    Ok(match field_type_enum {
        Type::TYPE_DOUBLE => ProtoType::Double,
        Type::TYPE_FLOAT => ProtoType::Float,
        Type::TYPE_INT64 => ProtoType::Int64,
        Type::TYPE_UINT64 => ProtoType::Uint64,
        Type::TYPE_INT32 => ProtoType::Int32,
        Type::TYPE_FIXED64 => ProtoType::Fixed64,
        Type::TYPE_FIXED32 => ProtoType::Fixed32,
        Type::TYPE_BOOL => ProtoType::Bool,
        Type::TYPE_STRING => ProtoType::String,
        Type::TYPE_MESSAGE => ProtoType::Message(field.type_name.clone().unwrap_or_default()),
        Type::TYPE_BYTES => ProtoType::Bytes,
        Type::TYPE_UINT32 => ProtoType::Uint32,
        Type::TYPE_ENUM => ProtoType::Enum(field.type_name.clone().unwrap_or_default()),
        Type::TYPE_SFIXED32 => ProtoType::Sfixed32,
        Type::TYPE_SFIXED64 => ProtoType::Sfixed64,
        Type::TYPE_SINT32 => ProtoType::Sint32,
        Type::TYPE_SINT64 => ProtoType::Sint64,
        Type::TYPE_GROUP => {
            return Err(Error::ProtobufParse(
                "TYPE_GROUP is Proto2 syntax only and deprecated hence not supported".to_string(),
            ))
        }
    })
}
