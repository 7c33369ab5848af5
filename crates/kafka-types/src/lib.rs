//! Shared type library for kbridge.
//!
//! This crate holds the data structures that every other kbridge crate agrees on:
//! the wire formats a key or value can be encoded in, raw and normalized log
//! records, the protobuf descriptor model, and the log collaborator traits.
//!
//! # Architecture
//!
//! ```text
//! RawMessage ──decode(Format)──▶ NormalizedRecord ──transform──▶ NormalizedRecord
//!                                                                      │
//! LogProducer ◀──────────── ProduceRequest ◀──encode(Format)───────────┘
//! ```
//!
//! # Dependency Direction
//!
//! `kbridge-schema-registry`, `kbridge-kafka` and the `kbridge` binary crate all
//! depend on this crate. It depends on none of them, so the rdkafka-backed log
//! and the in-memory test log can implement the same traits.

pub mod error;
pub mod format;
pub mod log;
pub mod message;
pub mod proto;
pub mod wire;

pub use error::{KafkaTypesError, LogError, Result};
pub use format::Format;
pub use log::{
    validate_offsets, CommittedOffset, LogConsumer, LogProducer, PartitionOffsets,
    SubscribeRequest,
};
pub use message::{
    Decoded, DecodedValue, Header, NormalizedRecord, ProduceRequest, RawMessage, Timestamp,
    to_spaced_json,
};
pub use proto::{
    ProtoEnumDescriptor, ProtoFieldDescriptor, ProtoFieldValue, ProtoMessage,
    ProtoMessageDescriptor, ProtoSchema, ProtoType,
};
pub use wire::{split_header, write_header, SchemaId, HEADER_LEN, MAGIC_BYTE};
