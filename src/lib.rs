//! kbridge library
//!
//! Move Kafka messages between topics and files, transcoding keys and values
//! between wire formats on the way.
//!
//! # Features
//!
//! - Formats: raw bytes, UTF-8 text, JSON, and the schema registry formats
//!   Protobuf, Avro and JSON Schema
//! - Schema registry: schemas are fetched by the id in each message header and
//!   compiled once per connection; writes register the schema for the topic
//! - Replicate: copy a topic to another topic, on the same or another cluster,
//!   keeping partitions, headers and (optionally) timestamps
//! - Download / upload: topic to file and back, one record per line
//! - Fold / foreach / grep over a topic with a per-record [`pipeline::Process`]
//!   step
//!
//! # Crates
//!
//! - `kafka-types` - formats, records, wire header and the log traits
//! - `kbridge-schema-registry` - registry client and the per-id schema cache
//! - `kbridge-kafka` - rdkafka consumer/producer and runtime protobuf support
//!
//! # CLI Usage
//!
//! ```bash
//! # Copy a topic between clusters, bytes for bytes
//! kbridge replicate --source local --source-topic orders --target backup --target-topic orders
//!
//! # Download protobuf values as JSON lines
//! kbridge download --cluster local --topic snacks --file snacks.txt --value-format pb
//!
//! # Upload key/value lines
//! kbridge upload --cluster local --file snacks.txt --topic snacks --key-value-separator /
//! ```

pub mod cluster;
pub mod codec;
pub mod config;
pub mod envelope;
pub mod error;
pub mod pipeline;
pub mod testing;

pub use cluster::{BatchCursor, Cluster, ProduceOptions, SubscribeOptions};
pub use codec::Codec;
pub use config::{ClusterConfig, SchemaRegistryConfig, SessionConfig};
pub use envelope::{EnvelopeTranslator, SchemaOverrides};
pub use error::{Error, Result};
pub use kafka_types::{
    CommittedOffset, Decoded, DecodedValue, Format, Header, NormalizedRecord, PartitionOffsets,
    SchemaId, Timestamp,
};
pub use pipeline::{
    download, fold, foreach, grep, replicate, upload, DownloadOptions, Process,
    ReplicateOptions, RunOptions, UploadOptions,
};
