//! Error types for kafka-types crate.

use thiserror::Error;

/// Errors raised while interpreting formats and wire headers.
#[derive(Error, Debug)]
pub enum KafkaTypesError {
    #[error("Unknown format: {0} (expected one of bytes, str, json, pb, protobuf, avro, jsonschema)")]
    UnknownFormat(String),

    #[error("Malformed schema header: {0}")]
    MalformedHeader(String),
}

/// Result type alias for kafka-types operations.
pub type Result<T> = std::result::Result<T, KafkaTypesError>;

/// Errors surfaced by a log collaborator (consumer or producer).
///
/// Transport failures from the underlying client are carried unmodified in
/// [`LogError::Transport`].
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Invalid offset for topic '{topic}': partition {partition} is outside 0..{partition_count}")]
    InvalidOffset {
        topic: String,
        partition: i32,
        partition_count: i32,
    },

    #[error("Not subscribed to any topic")]
    NotSubscribed,

    #[error("Produce error: {0}")]
    Produce(String),

    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl LogError {
    /// Wrap a client-level error without altering it.
    pub fn transport<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LogError::Transport(Box::new(error))
    }
}
