//! Error types for the kbridge library.

use kafka_types::{Format, KafkaTypesError, LogError, SchemaId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] kbridge_schema_registry::Error),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Kafka(#[from] kbridge_kafka::Error),

    #[error(transparent)]
    Types(#[from] KafkaTypesError),

    #[error("Failed to decode {format} payload{}: {message}", schema_suffix(.schema_id))]
    Decode {
        format: Format,
        schema_id: Option<SchemaId>,
        message: String,
    },

    #[error("Failed to encode {format} payload{}: {message}", schema_suffix(.schema_id))]
    Encode {
        format: Format,
        schema_id: Option<SchemaId>,
        message: String,
    },

    #[error("No schema registry configured for cluster '{cluster}', required for {format}")]
    NoSchemaRegistry { cluster: String, format: Format },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn schema_suffix(schema_id: &Option<SchemaId>) -> String {
    schema_id
        .map(|id| format!(" with schema {id}"))
        .unwrap_or_default()
}

impl Error {
    pub(crate) fn decode(format: Format, schema_id: Option<SchemaId>, e: impl ToString) -> Self {
        Error::Decode {
            format,
            schema_id,
            message: e.to_string(),
        }
    }

    pub(crate) fn encode(format: Format, schema_id: Option<SchemaId>, e: impl ToString) -> Self {
        Error::Encode {
            format,
            schema_id,
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
