//! In-memory log implementing [`LogConsumer`] and [`LogProducer`].
//!
//! Topics live behind an `Arc<Mutex<..>>`, so every consumer and producer
//! handed out by one [`MemoryLog`] sees the same partitions and committed
//! offsets. Consume calls never wait: an empty result is returned as soon as
//! nothing is left, whatever the timeout.

use crate::config::SessionConfig;
use async_trait::async_trait;
use kafka_types::{
    validate_offsets, CommittedOffset, LogConsumer, LogError, LogProducer, ProduceRequest,
    RawMessage, SubscribeRequest, Timestamp,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Create-time assigned to messages produced without a timestamp; increments
/// by one millisecond per message.
pub const CLOCK_START_MS: i64 = 1_700_000_000_000;

const OFFSET_BEGINNING: i64 = -2;
const OFFSET_END: i64 = -1;

#[derive(Debug, Default)]
struct LogState {
    topics: BTreeMap<String, Vec<Vec<RawMessage>>>,
    /// Keyed by (group, topic, partition).
    committed: HashMap<(String, String, i32), i64>,
    clock: i64,
    flushes: usize,
}

impl LogState {
    fn tick(&mut self) -> i64 {
        self.clock = self.clock.max(CLOCK_START_MS) + 1;
        self.clock
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    state: Arc<Mutex<LogState>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create `topic` with `partitions` empty partitions. Existing topics are
    /// left untouched.
    pub fn create_topic(&self, topic: &str, partitions: i32) {
        let count = usize::try_from(partitions.max(1)).unwrap_or(1);
        self.lock()
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| vec![Vec::new(); count]);
    }

    /// All messages of `topic`, partition by partition, in offset order.
    pub fn messages(&self, topic: &str) -> Vec<RawMessage> {
        self.lock()
            .topics
            .get(topic)
            .map(|partitions| partitions.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of producer flushes across all producers of this log.
    pub fn flush_count(&self) -> usize {
        self.lock().flushes
    }

    pub fn committed(&self, group: &str, topic: &str, partition: i32) -> Option<i64> {
        self.lock()
            .committed
            .get(&(group.to_string(), topic.to_string(), partition))
            .copied()
    }

    pub fn consumer(&self, session: &SessionConfig) -> MemoryConsumer {
        MemoryConsumer {
            log: self.clone(),
            auto_offset_reset: session.auto_offset_reset.clone(),
            enable_auto_commit: session.enable_auto_commit,
            subscription: None,
        }
    }

    pub fn producer(&self) -> MemoryProducer {
        MemoryProducer { log: self.clone() }
    }
}

#[derive(Debug)]
struct Subscription {
    topic: String,
    group: String,
    positions: BTreeMap<i32, i64>,
}

#[derive(Debug)]
pub struct MemoryConsumer {
    log: MemoryLog,
    auto_offset_reset: String,
    enable_auto_commit: bool,
    subscription: Option<Subscription>,
}

fn partition_len(partition: &[RawMessage]) -> i64 {
    i64::try_from(partition.len()).unwrap_or(i64::MAX)
}

#[async_trait]
impl LogConsumer for MemoryConsumer {
    async fn partition_count(&mut self, topic: &str) -> Result<i32, LogError> {
        let state = self.log.lock();
        let partitions = state
            .topics
            .get(topic)
            .ok_or_else(|| LogError::Subscription(format!("Topic '{topic}' not found")))?;
        Ok(i32::try_from(partitions.len()).unwrap_or(i32::MAX))
    }

    async fn subscribe(&mut self, request: SubscribeRequest) -> Result<(), LogError> {
        let partition_count = self.partition_count(&request.topic).await?;
        if let Some(offsets) = &request.offsets {
            validate_offsets(&request.topic, offsets, partition_count)?;
        }

        let state = self.log.lock();
        let partitions = &state.topics[&request.topic];
        let mut positions = BTreeMap::new();
        for (partition, messages) in (0..partition_count).zip(partitions) {
            let end = partition_len(messages);
            let explicit = request
                .offsets
                .as_ref()
                .and_then(|offsets| offsets.get(&partition).copied());
            let committed = state
                .committed
                .get(&(request.group.clone(), request.topic.clone(), partition))
                .copied();
            let position = match explicit.or(committed) {
                Some(OFFSET_BEGINNING) => 0,
                Some(OFFSET_END) => end,
                Some(offset) => offset,
                None if self.auto_offset_reset == "latest" => end,
                None => 0,
            };
            positions.insert(partition, position);
        }
        drop(state);

        self.subscription = Some(Subscription {
            topic: request.topic,
            group: request.group,
            positions,
        });
        Ok(())
    }

    async fn consume(
        &mut self,
        max: usize,
        _timeout: Duration,
    ) -> Result<Vec<RawMessage>, LogError> {
        let subscription = self.subscription.as_mut().ok_or(LogError::NotSubscribed)?;
        let mut state = self.log.lock();
        let Some(partitions) = state.topics.get(&subscription.topic) else {
            return Ok(Vec::new());
        };

        let mut batch = Vec::new();
        for (partition, position) in subscription.positions.iter_mut() {
            let Some(messages) = usize::try_from(*partition)
                .ok()
                .and_then(|p| partitions.get(p))
            else {
                continue;
            };
            while batch.len() < max {
                let Some(message) = usize::try_from(*position)
                    .ok()
                    .and_then(|p| messages.get(p))
                else {
                    break;
                };
                batch.push(message.clone());
                *position += 1;
            }
        }

        if self.enable_auto_commit {
            for (partition, position) in &subscription.positions {
                state.committed.insert(
                    (
                        subscription.group.clone(),
                        subscription.topic.clone(),
                        *partition,
                    ),
                    *position,
                );
            }
        }
        Ok(batch)
    }

    async fn commit(&mut self, message: &RawMessage) -> Result<(), LogError> {
        let subscription = self.subscription.as_ref().ok_or(LogError::NotSubscribed)?;
        self.log.lock().committed.insert(
            (
                subscription.group.clone(),
                message.topic.clone(),
                message.partition,
            ),
            message.offset + 1,
        );
        Ok(())
    }

    async fn committed_offsets(
        &mut self,
        _timeout: Duration,
    ) -> Result<BTreeMap<i32, CommittedOffset>, LogError> {
        let subscription = self.subscription.as_ref().ok_or(LogError::NotSubscribed)?;
        let state = self.log.lock();
        Ok(subscription
            .positions
            .keys()
            .map(|partition| {
                let committed = state
                    .committed
                    .get(&(
                        subscription.group.clone(),
                        subscription.topic.clone(),
                        *partition,
                    ))
                    .map(|offset| CommittedOffset::Offset(*offset))
                    .unwrap_or(CommittedOffset::Invalid);
                (*partition, committed)
            })
            .collect())
    }

    async fn unsubscribe(&mut self) -> Result<(), LogError> {
        self.subscription = None;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MemoryProducer {
    log: MemoryLog,
}

#[async_trait]
impl LogProducer for MemoryProducer {
    /// Unknown topics are created with just enough partitions for the request.
    async fn produce(&mut self, request: ProduceRequest) -> Result<(), LogError> {
        let mut state = self.log.lock();
        let partition = request.partition.unwrap_or(0);
        let index = usize::try_from(partition)
            .map_err(|_| LogError::Produce(format!("Invalid partition {partition}")))?;
        let timestamp = match request.timestamp {
            Some(ts) if ts > 0 => ts,
            _ => state.tick(),
        };

        let partitions = state
            .topics
            .entry(request.topic.clone())
            .or_insert_with(|| vec![Vec::new(); index + 1]);
        let messages = partitions.get_mut(index).ok_or_else(|| {
            LogError::Produce(format!(
                "Topic '{}' has no partition {partition}",
                request.topic
            ))
        })?;

        let offset = partition_len(messages);
        messages.push(RawMessage {
            offset,
            topic: request.topic,
            partition,
            timestamp: Timestamp::CreateTime(timestamp),
            headers: request.headers,
            key: request.key,
            value: request.value,
        });
        Ok(())
    }

    async fn flush(&mut self, _timeout: Duration) -> Result<(), LogError> {
        self.log.lock().flushes += 1;
        Ok(())
    }
}
