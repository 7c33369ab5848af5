//! File to log.

use super::crossed_multiple;
use crate::cluster::{Cluster, ProduceOptions};
use crate::error::{Error, Result};
use kafka_types::{DecodedValue, Format};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub key_format: Format,
    pub value_format: Format,
    /// Schema text for structural key formats.
    pub key_schema: Option<String>,
    /// Schema text for structural value formats.
    pub value_schema: Option<String>,
    /// Split each record into `key<separator>value`. Records that do not
    /// split into exactly two parts are produced whole, without a key.
    pub key_value_separator: Option<String>,
    pub message_separator: String,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            key_format: Format::Str,
            value_format: Format::Str,
            key_schema: None,
            value_schema: None,
            key_value_separator: None,
            message_separator: "\n".to_string(),
        }
    }
}

/// Splits a byte stream on a separator of any length, across chunk borders.
#[derive(Debug)]
struct RecordSplitter {
    separator: Vec<u8>,
    buffer: Vec<u8>,
}

impl RecordSplitter {
    fn new(separator: &str) -> Self {
        Self {
            separator: separator.as_bytes().to_vec(),
            buffer: Vec::new(),
        }
    }

    /// Complete records found after appending `chunk`.
    fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        let mut records = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buffer[start..]
            .windows(self.separator.len())
            .position(|window| window == self.separator.as_slice())
        {
            records.push(self.buffer[start..start + pos].to_vec());
            start += pos + self.separator.len();
        }
        self.buffer.drain(..start);
        records
    }

    /// Whatever followed the last separator.
    fn finish(self) -> Option<Vec<u8>> {
        (!self.buffer.is_empty()).then_some(self.buffer)
    }
}

/// Key and value of one record, or `None` for a blank record.
pub fn split_record<'a>(
    record: &'a str,
    key_value_separator: Option<&str>,
) -> Option<(Option<&'a str>, &'a str)> {
    let record = record.trim();
    if record.is_empty() {
        return None;
    }
    if let Some(separator) = key_value_separator {
        let parts: Vec<&str> = record.split(separator).collect();
        if let [key, value] = parts.as_slice() {
            return Some((Some(*key), *value));
        }
    }
    Some((None, record))
}

/// Produce every record of the file at `path` to `topic`, then flush.
/// Returns the number of messages produced.
pub async fn upload(
    cluster: &mut Cluster,
    path: &Path,
    topic: &str,
    options: &UploadOptions,
) -> Result<usize> {
    if options.message_separator.is_empty() {
        return Err(Error::Config("The message separator must not be empty".to_string()));
    }
    if options.key_value_separator.as_deref() == Some("") {
        return Err(Error::Config(
            "The key/value separator must not be empty".to_string(),
        ));
    }

    let mut file = File::open(path).await?;
    tracing::info!("Uploading {} to {topic}", path.display());

    let produce_options = ProduceOptions {
        key_format: options.key_format,
        value_format: options.value_format,
        key_schema: options.key_schema.clone(),
        value_schema: options.value_schema.clone(),
        ..ProduceOptions::default()
    };
    let progress_every = cluster.session().progress_num_messages;
    let mut splitter = RecordSplitter::new(&options.message_separator);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut produced = 0;

    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        for record in splitter.push(&buf[..read]) {
            let before = produced;
            produced += produce_record(cluster, topic, &record, options, &produce_options).await?;
            if crossed_multiple(before, produced, progress_every) {
                tracing::info!("{topic}: {produced} messages");
            }
        }
    }
    if let Some(rest) = splitter.finish() {
        produced += produce_record(cluster, topic, &rest, options, &produce_options).await?;
    }

    cluster.flush().await?;
    tracing::info!("Produced {produced} messages to {topic}");
    Ok(produced)
}

/// Produce one record unless it is blank. Returns how many were produced.
async fn produce_record(
    cluster: &mut Cluster,
    topic: &str,
    record: &[u8],
    options: &UploadOptions,
    produce_options: &ProduceOptions,
) -> Result<usize> {
    let text = std::str::from_utf8(record).map_err(|e| Error::decode(Format::Str, None, e))?;
    let Some((key, value)) = split_record(text, options.key_value_separator.as_deref()) else {
        return Ok(0);
    };

    let key = key.map(DecodedValue::from);
    let value = DecodedValue::from(value);
    cluster
        .produce(topic, key.as_ref(), Some(&value), produce_options)
        .await?;
    Ok(1)
}
