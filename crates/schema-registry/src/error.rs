use kafka_types::{Format, SchemaId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to fetch schema {id}: {message}")]
    SchemaFetch { id: SchemaId, message: String },

    #[error("Failed to compile {format} schema {id}: {message}")]
    SchemaCompile {
        format: Format,
        id: SchemaId,
        message: String,
    },

    #[error("Failed to register schema under subject '{subject}': {message}")]
    SchemaRegistration { subject: String, message: String },

    #[error("No descriptor builder for format {0}")]
    UnsupportedFormat(Format),

    #[error("Schema registry HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
