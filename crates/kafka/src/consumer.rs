use kafka_types::{
    validate_offsets, CommittedOffset, Header, LogConsumer, LogError, PartitionOffsets,
    RawMessage, SubscribeRequest, Timestamp,
};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{
    BaseConsumer, CommitMode, Consumer as RdkafkaConsumer, ConsumerContext, Rebalance,
    StreamConsumer as RdkafkaStreamConsumer,
};
use rdkafka::message::{BorrowedMessage, Headers, Message as RdkafkaMessage};
use rdkafka::{ClientContext, Offset, TopicPartitionList};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Configuration for the Kafka consumer
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Raw librdkafka properties (`bootstrap.servers`, security settings, ...)
    pub properties: BTreeMap<String, String>,
    /// Auto offset reset strategy ("earliest" or "latest")
    ///
    /// Applies to every partition without a committed offset and without an
    /// explicit starting offset in the subscribe request.
    pub auto_offset_reset: String,
    /// Session timeout in milliseconds
    pub session_timeout_ms: u32,
    /// Enable auto commit
    ///
    /// Explicit commits only have an observable effect when this is false.
    pub enable_auto_commit: bool,
    /// Timeout for metadata and committed-offset requests
    pub request_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            properties: BTreeMap::from([(
                "bootstrap.servers".to_string(),
                "localhost:9092".to_string(),
            )]),
            auto_offset_reset: "earliest".to_string(),
            session_timeout_ms: 10000,
            enable_auto_commit: true,
            request_timeout: Duration::from_secs(1),
        }
    }
}

/// Tracks the group assignment so explicit starting offsets can be applied.
///
/// The rebalance callback only records the assignment with the overrides
/// merged in; [`KafkaConsumer::consume`] re-assigns it from the polling task.
/// Partitions named in `offsets` start at the given offset, every other
/// partition keeps the offset the broker chose.
pub struct OffsetOverrideContext {
    topic: String,
    offsets: PartitionOffsets,
    pending: Mutex<Option<TopicPartitionList>>,
}

impl OffsetOverrideContext {
    pub fn new(topic: impl Into<String>, offsets: PartitionOffsets) -> Self {
        Self {
            topic: topic.into(),
            offsets,
            pending: Mutex::new(None),
        }
    }

    /// Takes the assignment recorded by the last rebalance, if any.
    fn take_pending(&self) -> Option<TopicPartitionList> {
        self.pending.lock().ok().and_then(|mut pending| pending.take())
    }

    /// The assignment with this context's offsets applied to its topic.
    fn overridden_assignment(&self, assigned: &TopicPartitionList) -> TopicPartitionList {
        let mut overridden = TopicPartitionList::new();
        for elem in assigned.elements() {
            let offset = if elem.topic() == self.topic {
                self.offsets
                    .get(&elem.partition())
                    .map(|o| Offset::Offset(*o))
                    .unwrap_or_else(|| elem.offset())
            } else {
                elem.offset()
            };
            if let Err(e) = overridden.add_partition_offset(elem.topic(), elem.partition(), offset)
            {
                tracing::warn!(
                    "Failed to set offset for {}[{}]: {e}",
                    elem.topic(),
                    elem.partition()
                );
            }
        }
        overridden
    }
}

impl ClientContext for OffsetOverrideContext {}

impl ConsumerContext for OffsetOverrideContext {
    fn post_rebalance(&self, rebalance: &Rebalance<'_>) {
        let Rebalance::Assign(assigned) = rebalance else {
            return;
        };
        if self.offsets.is_empty() {
            return;
        }
        let overridden = self.overridden_assignment(assigned);
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(overridden);
        }
    }
}

type StreamConsumer = RdkafkaStreamConsumer<OffsetOverrideContext>;

/// Kafka group consumer implementing [`LogConsumer`].
///
/// The underlying rdkafka consumer is created at subscribe time, because the
/// group id and offset overrides are only known then.
pub struct KafkaConsumer {
    config: ConsumerConfig,
    consumer: Option<StreamConsumer>,
    topic: Option<String>,
}

impl KafkaConsumer {
    pub fn new(config: ConsumerConfig) -> Self {
        Self {
            config,
            consumer: None,
            topic: None,
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        for (key, value) in &self.config.properties {
            client_config.set(key, value);
        }
        client_config
    }

    fn partition_ids(&self, topic: &str) -> Result<Vec<i32>, LogError> {
        let metadata = match &self.consumer {
            Some(consumer) => consumer.fetch_metadata(Some(topic), self.config.request_timeout),
            None => {
                let metadata_client: BaseConsumer = self
                    .client_config()
                    .create()
                    .map_err(LogError::transport)?;
                metadata_client.fetch_metadata(Some(topic), self.config.request_timeout)
            }
        }
        .map_err(LogError::transport)?;

        let topic_metadata = metadata
            .topics()
            .iter()
            .find(|t| t.name() == topic)
            .ok_or_else(|| LogError::Subscription(format!("Topic '{topic}' not found")))?;
        if let Some(err) = topic_metadata.error() {
            return Err(LogError::Subscription(format!(
                "Topic '{topic}' metadata error: {err:?}"
            )));
        }

        Ok(topic_metadata.partitions().iter().map(|p| p.id()).collect())
    }

    fn subscribed(&self) -> Result<(&StreamConsumer, &str), LogError> {
        match (&self.consumer, &self.topic) {
            (Some(consumer), Some(topic)) => Ok((consumer, topic.as_str())),
            _ => Err(LogError::NotSubscribed),
        }
    }
}

fn to_raw_message(msg: &BorrowedMessage<'_>) -> RawMessage {
    let timestamp = match msg.timestamp() {
        rdkafka::Timestamp::NotAvailable => Timestamp::NotAvailable,
        rdkafka::Timestamp::CreateTime(ms) => Timestamp::CreateTime(ms),
        rdkafka::Timestamp::LogAppendTime(ms) => Timestamp::LogAppendTime(ms),
    };
    let headers = msg
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|h| Header {
                    name: h.key.to_string(),
                    value: h.value.map(|v| v.to_vec()),
                })
                .collect()
        })
        .unwrap_or_default();

    RawMessage {
        topic: msg.topic().to_string(),
        partition: msg.partition(),
        offset: msg.offset(),
        timestamp,
        headers,
        key: msg.key().map(|k| k.to_vec()),
        value: msg.payload().map(|p| p.to_vec()),
    }
}

fn committed_offset(offset: Offset) -> CommittedOffset {
    match offset {
        Offset::Offset(o) => CommittedOffset::Offset(o),
        Offset::Beginning => CommittedOffset::Beginning,
        Offset::End => CommittedOffset::End,
        Offset::Stored => CommittedOffset::Stored,
        _ => CommittedOffset::Invalid,
    }
}

#[async_trait::async_trait]
impl LogConsumer for KafkaConsumer {
    async fn partition_count(&mut self, topic: &str) -> Result<i32, LogError> {
        let ids = self.partition_ids(topic)?;
        i32::try_from(ids.len())
            .map_err(|_| LogError::Subscription(format!("Topic '{topic}' has too many partitions")))
    }

    async fn subscribe(&mut self, request: SubscribeRequest) -> Result<(), LogError> {
        if request.topic.is_empty() {
            return Err(LogError::Subscription("A topic is required".to_string()));
        }
        if let Some(offsets) = &request.offsets {
            let partition_count = self.partition_count(&request.topic).await?;
            validate_offsets(&request.topic, offsets, partition_count)?;
        }

        let mut client_config = self.client_config();
        client_config
            .set("group.id", &request.group)
            .set("auto.offset.reset", &self.config.auto_offset_reset)
            .set("enable.auto.commit", self.config.enable_auto_commit.to_string())
            .set("session.timeout.ms", self.config.session_timeout_ms.to_string())
            .set("enable.partition.eof", "false");
        for (key, value) in &request.config {
            client_config.set(key, value);
        }

        let context = OffsetOverrideContext::new(
            request.topic.clone(),
            request.offsets.clone().unwrap_or_default(),
        );
        let consumer: StreamConsumer = client_config
            .create_with_context(context)
            .map_err(|e| LogError::Subscription(format!("Failed to create consumer: {e}")))?;

        consumer
            .subscribe(&[&request.topic])
            .map_err(|e| LogError::Subscription(format!("Failed to subscribe to topic: {e}")))?;

        tracing::debug!(
            "Subscribed to {} as group {} (offsets: {:?})",
            request.topic,
            request.group,
            request.offsets
        );
        self.consumer = Some(consumer);
        self.topic = Some(request.topic);
        Ok(())
    }

    async fn consume(
        &mut self,
        max: usize,
        timeout: Duration,
    ) -> Result<Vec<RawMessage>, LogError> {
        let (consumer, _) = self.subscribed()?;
        let deadline = Instant::now() + timeout;
        let mut messages = Vec::with_capacity(max);

        while messages.len() < max {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, consumer.recv()).await {
                Ok(Ok(msg)) => {
                    let context = consumer.context();
                    if let Some(assignment) = context.take_pending() {
                        tracing::debug!("Assigning with offset overrides {:?}", context.offsets);
                        consumer.assign(&assignment).map_err(LogError::transport)?;
                        // Every partition restarts fetching, so this message comes again
                        continue;
                    }
                    messages.push(to_raw_message(&msg));
                }
                Ok(Err(e)) => return Err(LogError::transport(e)),
                Err(_) => break, // Timeout, no more messages available right now
            }
        }

        Ok(messages)
    }

    async fn commit(&mut self, message: &RawMessage) -> Result<(), LogError> {
        let (consumer, _) = self.subscribed()?;
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )
        .map_err(LogError::transport)?;

        consumer
            .commit(&tpl, CommitMode::Sync)
            .map_err(LogError::transport)
    }

    async fn committed_offsets(
        &mut self,
        timeout: Duration,
    ) -> Result<BTreeMap<i32, CommittedOffset>, LogError> {
        let (_, topic) = self.subscribed()?;
        let topic = topic.to_string();
        let partitions = self.partition_ids(&topic)?;
        let (consumer, _) = self.subscribed()?;

        let mut tpl = TopicPartitionList::new();
        for partition in partitions {
            tpl.add_partition(&topic, partition);
        }
        let committed = consumer
            .committed_offsets(tpl, timeout)
            .map_err(LogError::transport)?;

        Ok(committed
            .elements()
            .iter()
            .filter(|elem| elem.topic() == topic)
            .map(|elem| (elem.partition(), committed_offset(elem.offset())))
            .collect())
    }

    async fn unsubscribe(&mut self) -> Result<(), LogError> {
        if let Some(consumer) = self.consumer.take() {
            consumer.unsubscribe();
            tracing::debug!("Unsubscribed from {}", self.topic.as_deref().unwrap_or_default());
        }
        self.topic = None;
        Ok(())
    }
}
