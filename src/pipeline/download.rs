//! Log to file.

use super::{run_batches, BatchSink, RunOptions};
use crate::cluster::Cluster;
use crate::error::Result;
use async_trait::async_trait;
use kafka_types::{DecodedValue, NormalizedRecord};
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub run: RunOptions,
    /// Write `key<separator>value` instead of just the value.
    pub key_value_separator: Option<String>,
    /// Written after every record.
    pub message_separator: String,
    /// Truncate the file first; otherwise append to it.
    pub overwrite: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            run: RunOptions::default(),
            key_value_separator: None,
            message_separator: "\n".to_string(),
            overwrite: true,
        }
    }
}

/// One record as written to a file, separator included. Structured values
/// are written as single-line JSON with spaced separators (see
/// [`kafka_types::to_spaced_json`]); absent keys and values as
/// empty text.
pub fn format_line(
    record: &NormalizedRecord,
    key_value_separator: Option<&str>,
    message_separator: &str,
) -> String {
    let text = |v: &Option<DecodedValue>| v.as_ref().map(DecodedValue::to_text).unwrap_or_default();
    let value = text(&record.value);
    match key_value_separator {
        Some(separator) => format!(
            "{}{separator}{value}{message_separator}",
            text(&record.key)
        ),
        None => format!("{value}{message_separator}"),
    }
}

struct FileSink<'a> {
    writer: BufWriter<File>,
    options: &'a DownloadOptions,
}

#[async_trait]
impl BatchSink for FileSink<'_> {
    async fn deliver(&mut self, records: Vec<NormalizedRecord>) -> Result<()> {
        let mut chunk = String::new();
        for record in &records {
            chunk.push_str(&format_line(
                record,
                self.options.key_value_separator.as_deref(),
                &self.options.message_separator,
            ));
        }
        self.writer.write_all(chunk.as_bytes()).await?;
        Ok(())
    }
}

/// Write every record of `topic` to `path`, one per line. Returns the number
/// of messages consumed.
pub async fn download(
    cluster: &mut Cluster,
    topic: &str,
    path: &Path,
    options: &DownloadOptions,
) -> Result<usize> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(options.overwrite)
        .append(!options.overwrite)
        .open(path)
        .await?;
    tracing::info!("Downloading {topic} to {}", path.display());

    let mut sink = FileSink {
        writer: BufWriter::new(file),
        options,
    };
    let consumed = run_batches(cluster, topic, &options.run, &mut sink).await;
    let flushed = sink.writer.flush().await;

    let consumed = consumed?;
    flushed?;
    Ok(consumed)
}
