//! Log message types.
//!
//! [`RawMessage`] is what a log consumer hands out: bytes plus broker
//! metadata. [`NormalizedRecord`] is the same message after its key and value
//! were decoded. [`ProduceRequest`] is the encoded form handed to a producer.

use base64::Engine;
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{json, Map, Value};
use std::io;

/// A single message header. Kafka allows header values to be null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: Option<Vec<u8>>,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

/// Message timestamp together with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timestamp {
    #[default]
    NotAvailable,
    CreateTime(i64),
    LogAppendTime(i64),
}

impl Timestamp {
    /// Milliseconds since epoch, whatever the kind.
    pub fn millis(&self) -> Option<i64> {
        match self {
            Timestamp::NotAvailable => None,
            Timestamp::CreateTime(ms) | Timestamp::LogAppendTime(ms) => Some(*ms),
        }
    }

    /// Milliseconds since epoch, only when the producer set the timestamp.
    pub fn create_time(&self) -> Option<i64> {
        match self {
            Timestamp::CreateTime(ms) => Some(*ms),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Timestamp::NotAvailable => "NOT_AVAILABLE",
            Timestamp::CreateTime(_) => "CREATE_TIME",
            Timestamp::LogAppendTime(_) => "LOG_APPEND_TIME",
        }
    }
}

/// A message as read from the log, before key/value decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp: Timestamp,
    pub headers: Vec<Header>,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
}

/// A decoded key or value. The variant is fixed by the format that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedValue {
    Bytes(Vec<u8>),
    String(String),
    Json(Value),
}

impl DecodedValue {
    /// Render as a line of text: strings verbatim, JSON with
    /// [`to_spaced_json`], bytes as lossy UTF-8.
    pub fn to_text(&self) -> String {
        match self {
            DecodedValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            DecodedValue::String(s) => s.clone(),
            DecodedValue::Json(v) => to_spaced_json(v),
        }
    }

    /// Render as a JSON value. Bytes become a base64 string.
    pub fn to_json(&self) -> Value {
        match self {
            DecodedValue::Bytes(b) => {
                Value::String(base64::engine::general_purpose::STANDARD.encode(b))
            }
            DecodedValue::String(s) => Value::String(s.clone()),
            DecodedValue::Json(v) => v.clone(),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            DecodedValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_json_mut(&mut self) -> Option<&mut Value> {
        match self {
            DecodedValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DecodedValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for DecodedValue {
    fn from(s: String) -> Self {
        DecodedValue::String(s)
    }
}

impl From<&str> for DecodedValue {
    fn from(s: &str) -> Self {
        DecodedValue::String(s.to_string())
    }
}

impl From<Value> for DecodedValue {
    fn from(v: Value) -> Self {
        DecodedValue::Json(v)
    }
}

impl From<Vec<u8>> for DecodedValue {
    fn from(b: Vec<u8>) -> Self {
        DecodedValue::Bytes(b)
    }
}

/// Single-line JSON with `", "` between items and `": "` after keys, and
/// non-ASCII characters escaped as `\uXXXX`. This is the layout of the
/// record files written by download and read back by upload.
pub fn to_spaced_json(value: &Value) -> String {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, SpacedFormatter);
    if value.serialize(&mut serializer).is_err() {
        return value.to_string();
    }
    String::from_utf8(out).unwrap_or_else(|_| value.to_string())
}

struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }
        let mut units = [0u16; 2];
        for c in fragment.chars() {
            if c.is_ascii() {
                writer.write_all(&[c as u8])?;
            } else {
                for unit in c.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// Result of decoding one key or value: the value plus the schema text it was
/// decoded with (structural formats only).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decoded {
    pub value: Option<DecodedValue>,
    pub schema: Option<String>,
}

impl Decoded {
    pub fn plain(value: Option<DecodedValue>) -> Self {
        Self {
            value,
            schema: None,
        }
    }
}

/// A log message with decoded key and value.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub headers: Vec<Header>,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp: Timestamp,
    pub key: Option<DecodedValue>,
    pub value: Option<DecodedValue>,
    pub key_schema: Option<String>,
    pub value_schema: Option<String>,
}

impl NormalizedRecord {
    /// JSON view of the record, used by `cat` style output.
    pub fn to_json(&self) -> Value {
        let headers: Vec<Value> = self
            .headers
            .iter()
            .map(|h| {
                let value = match &h.value {
                    Some(v) => Value::String(String::from_utf8_lossy(v).into_owned()),
                    None => Value::Null,
                };
                let mut entry = Map::new();
                entry.insert(h.name.clone(), value);
                Value::Object(entry)
            })
            .collect();
        json!({
            "topic": self.topic,
            "headers": headers,
            "partition": self.partition,
            "offset": self.offset,
            "timestamp": [self.timestamp.kind(), self.timestamp.millis()],
            "key": self.key.as_ref().map(DecodedValue::to_json),
            "value": self.value.as_ref().map(DecodedValue::to_json),
        })
    }
}

/// Arguments for a single produce call, key and value already encoded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProduceRequest {
    pub topic: String,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    /// `None` lets the partitioner pick.
    pub partition: Option<i32>,
    /// `None` lets the broker assign the timestamp.
    pub timestamp: Option<i64>,
    pub headers: Vec<Header>,
}

impl ProduceRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }
}
