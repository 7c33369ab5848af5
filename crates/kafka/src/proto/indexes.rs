//! Confluent message indexes.
//!
//! Between the 5-byte registry header and the protobuf body, Confluent
//! framing stores the path to the message type inside the schema: a zigzag
//! varint count followed by that many zigzag varint indexes. The common path
//! `[0]` is written as a single `0` byte.

use crate::error::{Error, Result};
use protobuf::{CodedInputStream, CodedOutputStream};

pub fn read_message_indexes(stream: &mut CodedInputStream) -> Result<Vec<i32>> {
    let count = stream
        .read_sint32()
        .map_err(|e| Error::ProtobufDecode(format!("message index count: {e}")))?;
    if count == 0 {
        return Ok(vec![0]);
    }
    if count < 0 {
        return Err(Error::ProtobufDecode(format!(
            "negative message index count {count}"
        )));
    }
    (0..count)
        .map(|_| {
            stream
                .read_sint32()
                .map_err(|e| Error::ProtobufDecode(format!("message index: {e}")))
        })
        .collect()
}

pub fn write_message_indexes(indexes: &[i32], out: &mut Vec<u8>) -> Result<()> {
    let encode_err = |e: protobuf::Error| Error::ProtobufEncode(e.to_string());
    let mut stream = CodedOutputStream::vec(out);
    if indexes == [0] {
        stream.write_sint32_no_tag(0).map_err(encode_err)?;
    } else {
        let count = i32::try_from(indexes.len())
            .map_err(|_| Error::ProtobufEncode("too many message indexes".to_string()))?;
        stream.write_sint32_no_tag(count).map_err(encode_err)?;
        for index in indexes {
            stream.write_sint32_no_tag(*index).map_err(encode_err)?;
        }
    }
    stream.flush().map_err(encode_err)?;
    Ok(())
}
