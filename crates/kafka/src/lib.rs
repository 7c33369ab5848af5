//! Kafka access for kbridge.
//!
//! Features:
//!
//! - Log collaborators: [`KafkaConsumer`] and [`KafkaProducer`] implement the
//!   `LogConsumer` / `LogProducer` traits from `kafka-types` over rdkafka
//! - Offset overrides: explicit `{partition: offset}` maps are applied in the
//!   rebalance callback, after the broker's assignment
//! - Runtime Protobuf Support: parse `.proto` schema text at runtime and
//!   decode/encode Confluent-framed messages without code generation

/// Group consumer with assignment-time offset overrides
pub mod consumer;
pub mod error;

/// Buffered producer with explicit flush
pub mod producer;
pub mod proto;

// Re-export main types for easy access
pub use consumer::{ConsumerConfig, KafkaConsumer};
pub use error::{Error, Result};
pub use producer::{KafkaProducer, ProducerConfig};
pub use proto::builder::ProtoDescriptorBuilder;
pub use proto::decoder::ProtoDecoder;
pub use proto::encoder::ProtoEncoder;
pub use proto::parser::ProtoCompiler;
