//! Batched consume loops.
//!
//! Every consuming driver (replicate, download, fold/foreach/grep) runs the
//! same loop over a [`Cluster`]:
//!
//! ```text
//! subscribe -> consume(batch_size) -> deliver -> ... -> unsubscribe
//!                  |
//!                  +-- empty batch, or n reached: stop
//! ```
//!
//! The loop unsubscribes on every exit path. Upload is the only driver that
//! does not consume and lives apart from the loop.

pub mod download;
pub mod process;
pub mod replicate;
pub mod upload;

pub use download::{download, DownloadOptions};
pub use process::{fold, foreach, grep, Filter, ForEach, Identity, Map, Process};
pub use replicate::{replicate, ReplicateOptions};
pub use upload::{upload, UploadOptions};

use crate::cluster::{Cluster, SubscribeOptions};
use crate::error::Result;
use async_trait::async_trait;
use kafka_types::{Format, NormalizedRecord, PartitionOffsets};
use std::collections::BTreeMap;

/// Options shared by every consuming driver.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Consumer group. A unique group is created when absent.
    pub group: Option<String>,
    /// Explicit starting offsets for some partitions.
    pub offsets: Option<PartitionOffsets>,
    pub key_format: Format,
    pub value_format: Format,
    /// Extra consumer properties for this run.
    pub config: BTreeMap<String, String>,
    /// Stop after the batch that reaches this many messages. `None` reads
    /// until a batch comes back empty.
    pub n: Option<usize>,
    pub batch_size: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            group: None,
            offsets: None,
            key_format: Format::Str,
            value_format: Format::Str,
            config: BTreeMap::new(),
            n: None,
            batch_size: 1,
        }
    }
}

impl RunOptions {
    fn subscribe_options(&self) -> SubscribeOptions {
        SubscribeOptions {
            group: self.group.clone(),
            offsets: self.offsets.clone(),
            key_format: self.key_format,
            value_format: self.value_format,
            config: self.config.clone(),
        }
    }
}

/// Receives each decoded batch of a run.
#[async_trait]
pub(crate) trait BatchSink: Send {
    async fn deliver(&mut self, records: Vec<NormalizedRecord>) -> Result<()>;
}

/// Subscribe to `topic`, feed batches to `sink`, then unsubscribe. Returns
/// the number of messages consumed.
pub(crate) async fn run_batches<S: BatchSink>(
    cluster: &mut Cluster,
    topic: &str,
    options: &RunOptions,
    sink: &mut S,
) -> Result<usize> {
    cluster.subscribe(topic, options.subscribe_options()).await?;
    let result = consume_loop(cluster, topic, options, sink).await;
    let unsubscribed = cluster.unsubscribe().await;

    let consumed = result?;
    unsubscribed?;
    Ok(consumed)
}

async fn consume_loop<S: BatchSink>(
    cluster: &mut Cluster,
    topic: &str,
    options: &RunOptions,
    sink: &mut S,
) -> Result<usize> {
    let batch_size = options.batch_size.max(1);
    let progress_every = cluster.session().progress_num_messages;
    let mut consumed = 0;

    loop {
        let records = cluster.consume(batch_size).await?;
        if records.is_empty() {
            break;
        }

        let before = consumed;
        consumed += records.len();
        sink.deliver(records).await?;
        if crossed_multiple(before, consumed, progress_every) {
            tracing::info!("{topic}: {consumed} messages");
        }

        if options.n.is_some_and(|n| consumed >= n) {
            break;
        }
    }

    tracing::info!("Consumed {consumed} messages from {topic}");
    Ok(consumed)
}

/// Whether going from `before` to `after` passed a multiple of `every`.
pub(crate) fn crossed_multiple(before: usize, after: usize, every: usize) -> bool {
    every > 0 && after / every > before / every
}
