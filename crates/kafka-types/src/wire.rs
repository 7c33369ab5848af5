//! Schema registry wire header.
//!
//! Structural payloads are laid out as:
//!
//! ```text
//! byte 0      magic byte (0x00)
//! bytes 1..5  schema id, big-endian u32
//! bytes 5..   format-specific payload
//! ```

use crate::error::{KafkaTypesError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAGIC_BYTE: u8 = 0;
pub const HEADER_LEN: usize = 5;

/// Identifier of one schema version in a schema registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(pub u32);

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Append the 5-byte header for `id` to `out`.
pub fn write_header(id: SchemaId, out: &mut Vec<u8>) {
    out.push(MAGIC_BYTE);
    out.extend_from_slice(&id.0.to_be_bytes());
}

/// Split a structural payload into its schema id and the bytes after the header.
pub fn split_header(data: &[u8]) -> Result<(SchemaId, &[u8])> {
    if data.len() < HEADER_LEN {
        return Err(KafkaTypesError::MalformedHeader(format!(
            "payload is {} bytes, header needs {HEADER_LEN}",
            data.len()
        )));
    }
    if data[0] != MAGIC_BYTE {
        return Err(KafkaTypesError::MalformedHeader(format!(
            "unexpected magic byte {:#04x}",
            data[0]
        )));
    }
    let id = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);
    Ok((SchemaId(id), &data[HEADER_LEN..]))
}
