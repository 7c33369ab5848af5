//! Log collaborator traits.
//!
//! The pipeline engine talks to the broker only through [`LogConsumer`] and
//! [`LogProducer`]. `kbridge-kafka` implements them over rdkafka and
//! `kbridge::testing` implements them in memory.

use crate::error::LogError;
use crate::message::{ProduceRequest, RawMessage};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Explicit starting offsets, keyed by partition.
pub type PartitionOffsets = BTreeMap<i32, i64>;

/// Everything a consumer needs to join a topic.
#[derive(Debug, Clone, Default)]
pub struct SubscribeRequest {
    pub topic: String,
    pub group: String,
    /// Starting offsets applied after the broker's assignment, only for the
    /// partitions named. Other partitions follow `auto.offset.reset`.
    pub offsets: Option<PartitionOffsets>,
    /// Extra client properties layered over the session defaults.
    pub config: BTreeMap<String, String>,
}

impl SubscribeRequest {
    pub fn new(topic: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            group: group.into(),
            ..Default::default()
        }
    }

    pub fn with_offsets(mut self, offsets: Option<PartitionOffsets>) -> Self {
        self.offsets = offsets;
        self
    }
}

/// A committed consumer group position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommittedOffset {
    Offset(i64),
    Beginning,
    End,
    Stored,
    Invalid,
}

impl fmt::Display for CommittedOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommittedOffset::Offset(o) => write!(f, "{o}"),
            CommittedOffset::Beginning => f.write_str("OFFSET_BEGINNING"),
            CommittedOffset::End => f.write_str("OFFSET_END"),
            CommittedOffset::Stored => f.write_str("OFFSET_STORED"),
            CommittedOffset::Invalid => f.write_str("OFFSET_INVALID"),
        }
    }
}

/// Consuming side of a log connection.
#[async_trait]
pub trait LogConsumer: Send {
    /// Number of partitions of `topic`.
    async fn partition_count(&mut self, topic: &str) -> Result<i32, LogError>;

    /// Join the consumer group and subscribe to the request's topic.
    async fn subscribe(&mut self, request: SubscribeRequest) -> Result<(), LogError>;

    /// Pull up to `max` messages, waiting at most `timeout` in total.
    /// An empty result means nothing arrived in time.
    async fn consume(&mut self, max: usize, timeout: Duration)
        -> Result<Vec<RawMessage>, LogError>;

    /// Commit the position just after `message` for its partition.
    async fn commit(&mut self, message: &RawMessage) -> Result<(), LogError>;

    /// Committed offsets of the group for every partition of the subscribed topic.
    async fn committed_offsets(
        &mut self,
        timeout: Duration,
    ) -> Result<BTreeMap<i32, CommittedOffset>, LogError>;

    /// Leave the subscription. Calling it while not subscribed is a no-op.
    async fn unsubscribe(&mut self) -> Result<(), LogError>;
}

/// Producing side of a log connection.
#[async_trait]
pub trait LogProducer: Send {
    /// Queue one message for delivery.
    async fn produce(&mut self, request: ProduceRequest) -> Result<(), LogError>;

    /// Wait until every queued message is delivered or `timeout` elapses.
    async fn flush(&mut self, timeout: Duration) -> Result<(), LogError>;
}

/// Reject offsets naming a partition the topic does not have.
pub fn validate_offsets(
    topic: &str,
    offsets: &PartitionOffsets,
    partition_count: i32,
) -> Result<(), LogError> {
    for partition in offsets.keys() {
        if *partition < 0 || *partition >= partition_count {
            return Err(LogError::InvalidOffset {
                topic: topic.to_string(),
                partition: *partition,
                partition_count,
            });
        }
    }
    Ok(())
}
