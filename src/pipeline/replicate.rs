//! Log to log copy.

use super::process::Process;
use super::{run_batches, BatchSink, RunOptions};
use crate::cluster::Cluster;
use crate::envelope::{EnvelopeTranslator, SchemaOverrides};
use crate::error::Result;
use async_trait::async_trait;
use kafka_types::{Format, NormalizedRecord};

#[derive(Debug, Clone)]
pub struct ReplicateOptions {
    /// Source subscription and budget. The key and value formats are used
    /// for both decoding and re-encoding.
    pub run: RunOptions,
    /// Copy create-time timestamps verbatim. Otherwise the target assigns
    /// new ones.
    pub keep_timestamps: bool,
}

impl Default for ReplicateOptions {
    fn default() -> Self {
        Self {
            run: RunOptions {
                key_format: Format::Bytes,
                value_format: Format::Bytes,
                ..RunOptions::default()
            },
            keep_timestamps: true,
        }
    }
}

struct ReplicateSink<'a, P> {
    target: &'a mut Cluster,
    target_topic: &'a str,
    translator: EnvelopeTranslator,
    transform: &'a mut P,
    keep_timestamps: bool,
}

#[async_trait]
impl<P> BatchSink for ReplicateSink<'_, P>
where
    P: Process<Output = NormalizedRecord> + Send,
{
    async fn deliver(&mut self, records: Vec<NormalizedRecord>) -> Result<()> {
        for record in records {
            for record in self.transform.process(record) {
                let mut request = self
                    .translator
                    .from_record(
                        self.target.codec_mut(),
                        &record,
                        self.target_topic,
                        SchemaOverrides::default(),
                    )
                    .await?;
                request.partition = Some(record.partition);
                request.timestamp = if self.keep_timestamps {
                    record.timestamp.create_time()
                } else {
                    None
                };
                self.target.send(request).await?;
            }
        }
        Ok(())
    }
}

/// Copy `source_topic` on `source` to `target_topic` on `target`, passing
/// every record through `transform` (use [`super::Identity`] for a plain
/// copy). Partition and headers are preserved; structural values are
/// re-encoded with the schema they were read with.
///
/// The target is flushed at the end. Returns the number of messages consumed.
pub async fn replicate<P>(
    source: &mut Cluster,
    source_topic: &str,
    target: &mut Cluster,
    target_topic: &str,
    transform: &mut P,
    options: &ReplicateOptions,
) -> Result<usize>
where
    P: Process<Output = NormalizedRecord> + Send,
{
    tracing::info!(
        "Replicating {}/{source_topic} to {}/{target_topic}",
        source.name(),
        target.name()
    );
    let mut sink = ReplicateSink {
        target,
        target_topic,
        translator: EnvelopeTranslator::new(options.run.key_format, options.run.value_format),
        transform,
        keep_timestamps: options.keep_timestamps,
    };
    let consumed = run_batches(source, source_topic, &options.run, &mut sink).await;
    let flushed = sink.target.flush().await;

    let consumed = consumed?;
    flushed?;
    Ok(consumed)
}
