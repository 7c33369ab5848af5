//! Runtime protobuf support.
//!
//! Schemas arrive as `.proto` text from the schema registry, so nothing here
//! relies on generated code: [`parser`] turns the text into a
//! `kafka_types::ProtoSchema`, [`decoder`] and [`encoder`] walk the wire
//! format against it, [`json`] maps decoded messages to `serde_json` values,
//! and [`indexes`] handles the Confluent message-index prefix.

pub mod builder;
pub mod decoder;
pub mod encoder;
pub mod indexes;
pub mod json;
pub mod parser;
