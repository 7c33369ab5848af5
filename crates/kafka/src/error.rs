use kafka_types::ProtoType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Protobuf parse error: {0}")]
    ProtobufParse(String),

    #[error("Protobuf decode error: {0}")]
    ProtobufDecode(String),

    #[error("Protobuf encode error: {0}")]
    ProtobufEncode(String),

    #[error("Field not found: {field} in message {message}")]
    FieldNotFound { message: String, field: String },

    #[error("Missing required field: {field} in message {message}")]
    MissingRequiredField { message: String, field: String },

    #[error("Invalid value for field {field}: expected {expected}, got {actual}")]
    InvalidFieldValue {
        field: String,
        expected: ProtoType,
        actual: String,
    },

    #[error("Message type not found: {0}")]
    MessageTypeNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
