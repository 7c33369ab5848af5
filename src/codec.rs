//! Format dispatch for message keys and values.
//!
//! Plain formats (`bytes`, `str`, `json`) are handled inline. Structural
//! formats go through the cluster's [`SchemaCache`]: decode reads the registry
//! header and resolves the schema by id, encode registers the caller's schema
//! for the topic subject and frames the payload with the returned id.

use crate::error::{Error, Result};
use kafka_types::{split_header, write_header, Decoded, DecodedValue, Format, SchemaId};
use kbridge_kafka::proto::indexes::write_message_indexes;
use kbridge_kafka::proto::json::message_to_json;
use kbridge_kafka::{ProtoDecoder, ProtoEncoder};
use kbridge_schema_registry::{SchemaCache, SchemaEntry, TypeDescriptor};
use serde_json::Value;
use std::sync::Arc;

/// Encoder/decoder bound to one cluster connection.
pub struct Codec {
    cluster: String,
    cache: Option<SchemaCache>,
}

impl Codec {
    /// `cache` is `None` when the cluster has no schema registry; structural
    /// formats then fail with [`Error::NoSchemaRegistry`].
    pub fn new(cluster: impl Into<String>, cache: Option<SchemaCache>) -> Self {
        Self {
            cluster: cluster.into(),
            cache,
        }
    }

    pub fn cache(&self) -> Option<&SchemaCache> {
        self.cache.as_ref()
    }

    fn cache_mut(&mut self, format: Format) -> Result<&mut SchemaCache> {
        let cluster = &self.cluster;
        self.cache.as_mut().ok_or_else(|| Error::NoSchemaRegistry {
            cluster: cluster.clone(),
            format,
        })
    }

    /// Decode one key or value. Absent bytes decode to an absent value for
    /// every format.
    pub async fn decode(
        &mut self,
        bytes: Option<&[u8]>,
        format: Format,
        topic: &str,
        is_key: bool,
    ) -> Result<Decoded> {
        let Some(bytes) = bytes else {
            return Ok(Decoded::default());
        };

        let value = match format {
            Format::Bytes => DecodedValue::Bytes(bytes.to_vec()),
            Format::Str => DecodedValue::String(
                String::from_utf8(bytes.to_vec()).map_err(|e| Error::decode(format, None, e))?,
            ),
            Format::Json => DecodedValue::Json(
                serde_json::from_slice(bytes).map_err(|e| Error::decode(format, None, e))?,
            ),
            Format::Protobuf | Format::Avro | Format::JsonSchema => {
                return self.decode_structural(bytes, format, topic, is_key).await;
            }
        };
        Ok(Decoded::plain(Some(value)))
    }

    async fn decode_structural(
        &mut self,
        bytes: &[u8],
        format: Format,
        topic: &str,
        is_key: bool,
    ) -> Result<Decoded> {
        let (id, payload) = split_header(bytes).map_err(|e| Error::decode(format, None, e))?;
        let entry = self.cache_mut(format)?.resolve(format, id).await?;
        tracing::trace!(
            "Decoding {format} {} of {topic} with schema {id}",
            if is_key { "key" } else { "value" }
        );

        let value = decode_payload(&entry, payload)?;
        Ok(Decoded {
            value: Some(DecodedValue::Json(value)),
            schema: Some(entry.raw_text.clone()),
        })
    }

    /// Encode one key or value. Structural formats need `schema` and register
    /// it under `{topic}-key` or `{topic}-value` before serializing.
    pub async fn encode(
        &mut self,
        value: Option<&DecodedValue>,
        format: Format,
        schema: Option<&str>,
        topic: &str,
        is_key: bool,
    ) -> Result<Option<Vec<u8>>> {
        let Some(value) = value else {
            return Ok(None);
        };

        let bytes = match format {
            Format::Bytes | Format::Str => match value {
                DecodedValue::Bytes(b) => b.clone(),
                DecodedValue::String(s) => s.as_bytes().to_vec(),
                DecodedValue::Json(v) => v.to_string().into_bytes(),
            },
            Format::Json => match value {
                DecodedValue::Json(v) => {
                    serde_json::to_vec(v).map_err(|e| Error::encode(format, None, e))?
                }
                DecodedValue::String(s) => s.as_bytes().to_vec(),
                DecodedValue::Bytes(b) => b.clone(),
            },
            Format::Protobuf | Format::Avro | Format::JsonSchema => {
                let schema = schema.ok_or_else(|| {
                    Error::encode(format, None, "a schema is required for structural formats")
                })?;
                let json = json_input(value, format)?;
                return self
                    .encode_structural(&json, format, schema, topic, is_key)
                    .await
                    .map(Some);
            }
        };
        Ok(Some(bytes))
    }

    async fn encode_structural(
        &mut self,
        value: &Value,
        format: Format,
        schema: &str,
        topic: &str,
        is_key: bool,
    ) -> Result<Vec<u8>> {
        let cache = self.cache_mut(format)?;
        let id = cache.register(schema, format, topic, is_key).await?;
        let entry = cache.entry_for_registered(format, id, schema)?;

        let mut out = Vec::new();
        write_header(id, &mut out);
        encode_payload(&entry, value, &mut out)?;
        Ok(out)
    }
}

/// Structural encoders take JSON. Text and bytes inputs are parsed first.
fn json_input(value: &DecodedValue, format: Format) -> Result<Value> {
    match value {
        DecodedValue::Json(v) => Ok(v.clone()),
        DecodedValue::String(s) => {
            serde_json::from_str(s).map_err(|e| Error::encode(format, None, e))
        }
        DecodedValue::Bytes(b) => {
            serde_json::from_slice(b).map_err(|e| Error::encode(format, None, e))
        }
    }
}

fn decode_payload(entry: &Arc<SchemaEntry>, payload: &[u8]) -> Result<Value> {
    let format = entry.format;
    let id = Some(entry.id);
    match &entry.descriptor {
        TypeDescriptor::Protobuf(schema) => {
            let message = ProtoDecoder::new(schema)
                .decode_framed(payload)
                .map_err(|e| Error::decode(format, id, e))?;
            Ok(message_to_json(schema, &message))
        }
        TypeDescriptor::Avro(schema) => {
            let mut reader = payload;
            let datum = apache_avro::from_avro_datum(schema, &mut reader, None)
                .map_err(|e| Error::decode(format, id, e))?;
            Value::try_from(datum).map_err(|e| Error::decode(format, id, e))
        }
        TypeDescriptor::JsonSchema(validator) => {
            let value: Value =
                serde_json::from_slice(payload).map_err(|e| Error::decode(format, id, e))?;
            check_json_schema(validator, &value)
                .map_err(|message| Error::decode(format, id, message))?;
            Ok(value)
        }
    }
}

fn encode_payload(entry: &Arc<SchemaEntry>, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    let format = entry.format;
    let id = Some(entry.id);
    match &entry.descriptor {
        TypeDescriptor::Protobuf(schema) => {
            let root = schema
                .root_message()
                .ok_or_else(|| Error::encode(format, id, "schema defines no message"))?;
            let body = ProtoEncoder::new(schema)
                .encode(&root.name, value)
                .map_err(|e| Error::encode(format, id, e))?;
            // The root message is always the first one: index list [0].
            write_message_indexes(&[0], out).map_err(|e| Error::encode(format, id, e))?;
            out.extend_from_slice(&body);
        }
        TypeDescriptor::Avro(schema) => {
            let datum = apache_avro::types::Value::from(value.clone())
                .resolve(schema)
                .map_err(|e| Error::encode(format, id, e))?;
            let body = apache_avro::to_avro_datum(schema, datum)
                .map_err(|e| Error::encode(format, id, e))?;
            out.extend_from_slice(&body);
        }
        TypeDescriptor::JsonSchema(validator) => {
            check_json_schema(validator, value)
                .map_err(|message| Error::encode(format, id, message))?;
            serde_json::to_writer(&mut *out, value).map_err(|e| Error::encode(format, id, e))?;
        }
    }
    Ok(())
}

fn check_json_schema(
    validator: &jsonschema::Validator,
    value: &Value,
) -> std::result::Result<(), String> {
    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at '{}'", e, e.instance_path))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

/// Schema id of a structurally encoded payload.
pub fn schema_id_of(bytes: &[u8]) -> Option<SchemaId> {
    split_header(bytes).ok().map(|(id, _)| id)
}
