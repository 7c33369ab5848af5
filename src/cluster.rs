//! A connection to one cluster: log consumer, log producer and codec.

use crate::codec::Codec;
use crate::config::{ClusterConfig, SessionConfig};
use crate::envelope::EnvelopeTranslator;
use crate::error::Result;
use kafka_types::{
    CommittedOffset, DecodedValue, Format, Header, LogConsumer, LogError, LogProducer,
    NormalizedRecord, PartitionOffsets, ProduceRequest, RawMessage, SubscribeRequest,
};
use kbridge_kafka::{
    ConsumerConfig, KafkaConsumer, KafkaProducer, ProducerConfig, ProtoCompiler,
    ProtoDescriptorBuilder,
};
use kbridge_schema_registry::{HttpSchemaStore, SchemaCache};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SCHEMA_REGISTRY_TIMEOUT: Duration = Duration::from_secs(30);

/// Scratch directory for compiled protobuf schemas of cluster `name`.
pub fn scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join("kbridge").join(name)
}

static GROUP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A unique consumer group id, used when the caller names none.
pub fn unique_group_id() -> String {
    let sequence = GROUP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{}.{sequence}", chrono::Utc::now().timestamp_micros())
}

/// How to join a topic.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    pub group: Option<String>,
    pub offsets: Option<PartitionOffsets>,
    pub key_format: Format,
    pub value_format: Format,
    /// Extra client properties for this subscription only.
    pub config: BTreeMap<String, String>,
}

/// Per-subscription state. Created by [`Cluster::subscribe`], updated by every
/// [`Cluster::consume`] and dropped by [`Cluster::unsubscribe`].
#[derive(Debug, Clone)]
pub struct BatchCursor {
    pub topic: String,
    pub group: String,
    pub offsets: Option<PartitionOffsets>,
    pub translator: EnvelopeTranslator,
    pub messages_seen: usize,
    pub last_message: Option<RawMessage>,
}

/// Everything besides key and value that a single produce call takes.
#[derive(Debug, Clone, Default)]
pub struct ProduceOptions {
    pub key_format: Format,
    pub value_format: Format,
    pub key_schema: Option<String>,
    pub value_schema: Option<String>,
    pub partition: Option<i32>,
    pub timestamp: Option<i64>,
    pub headers: Vec<Header>,
}

pub struct Cluster {
    name: String,
    session: SessionConfig,
    consumer: Box<dyn LogConsumer>,
    producer: Box<dyn LogProducer>,
    codec: Codec,
    cursor: Option<BatchCursor>,
    unflushed: usize,
}

impl Cluster {
    pub fn new(
        name: impl Into<String>,
        session: SessionConfig,
        consumer: Box<dyn LogConsumer>,
        producer: Box<dyn LogProducer>,
        codec: Codec,
    ) -> Self {
        Self {
            name: name.into(),
            session,
            consumer,
            producer,
            codec,
            cursor: None,
            unflushed: 0,
        }
    }

    /// Connect to the broker and (when configured) the schema registry.
    pub fn connect(name: &str, config: &ClusterConfig) -> Result<Self> {
        let properties = config.kafka_properties();
        let session = config.session.clone();

        let consumer = KafkaConsumer::new(ConsumerConfig {
            properties: properties.clone(),
            auto_offset_reset: session.auto_offset_reset.clone(),
            session_timeout_ms: session.session_timeout_ms,
            enable_auto_commit: session.enable_auto_commit,
            request_timeout: session.timeout,
        });
        let producer = KafkaProducer::new(&ProducerConfig { properties })?;

        let cache = match &config.schema_registry {
            Some(registry) => {
                let store = HttpSchemaStore::new(
                    &registry.url,
                    registry.basic_auth_user_info.as_deref(),
                    SCHEMA_REGISTRY_TIMEOUT,
                )?;
                let compiler = if session.protoc {
                    ProtoCompiler::Protoc(session.protoc_path.clone())
                } else {
                    ProtoCompiler::Pure
                };
                Some(
                    SchemaCache::new(Arc::new(store))
                        .with_builder(ProtoDescriptorBuilder::new(scratch_dir(name), compiler)),
                )
            }
            None => None,
        };

        tracing::debug!(
            "Connected to cluster {name} (schema registry: {})",
            config
                .schema_registry
                .as_ref()
                .map(|r| r.url.as_str())
                .unwrap_or("none")
        );
        Ok(Self::new(
            name,
            session,
            Box::new(consumer),
            Box::new(producer),
            Codec::new(name, cache),
        ))
    }

    /// Load `clusters/<name>.toml` under `home` and connect.
    pub fn from_home(home: &Path, name: &str) -> Result<Self> {
        let config = ClusterConfig::load(home, name)?;
        Self::connect(name, &config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    pub fn codec_mut(&mut self) -> &mut Codec {
        &mut self.codec
    }

    pub fn cursor(&self) -> Option<&BatchCursor> {
        self.cursor.as_ref()
    }

    /// Subscribe to `topic`, replacing any previous subscription.
    pub async fn subscribe(&mut self, topic: &str, options: SubscribeOptions) -> Result<()> {
        if topic.is_empty() {
            return Err(LogError::Subscription("A topic is required".to_string()).into());
        }
        if self.cursor.is_some() {
            self.unsubscribe().await?;
        }

        let group = options.group.unwrap_or_else(unique_group_id);
        let request = SubscribeRequest {
            topic: topic.to_string(),
            group: group.clone(),
            offsets: options.offsets.clone(),
            config: options.config,
        };
        self.consumer.subscribe(request).await?;

        tracing::info!("Subscribed to {topic} on {} as group {group}", self.name);
        self.cursor = Some(BatchCursor {
            topic: topic.to_string(),
            group,
            offsets: options.offsets,
            translator: EnvelopeTranslator::new(options.key_format, options.value_format),
            messages_seen: 0,
            last_message: None,
        });
        Ok(())
    }

    /// Pull up to `max` messages within the session timeout and decode them.
    /// An empty result means nothing arrived in time.
    pub async fn consume(&mut self, max: usize) -> Result<Vec<NormalizedRecord>> {
        let cursor = self.cursor.as_mut().ok_or(LogError::NotSubscribed)?;
        let messages = self.consumer.consume(max, self.session.timeout).await?;
        if let Some(last) = messages.last() {
            cursor.last_message = Some(last.clone());
        }
        cursor.messages_seen += messages.len();
        let translator = cursor.translator;

        let mut records = Vec::with_capacity(messages.len());
        for raw in messages {
            records.push(translator.to_record(&mut self.codec, raw).await?);
        }
        tracing::debug!("Consumed batch of {} from {}", records.len(), self.name);
        Ok(records)
    }

    /// Commit the offset of the most recently consumed message.
    pub async fn commit(&mut self) -> Result<()> {
        let cursor = self.cursor.as_ref().ok_or(LogError::NotSubscribed)?;
        match &cursor.last_message {
            Some(message) => {
                self.consumer.commit(message).await?;
                tracing::debug!(
                    "Committed {}[{}] at {}",
                    message.topic,
                    message.partition,
                    message.offset + 1
                );
            }
            None => tracing::debug!("Nothing consumed yet, nothing to commit"),
        }
        Ok(())
    }

    /// Committed offsets of the subscribed group, per partition.
    pub async fn offsets(&mut self) -> Result<BTreeMap<i32, CommittedOffset>> {
        if self.cursor.is_none() {
            return Err(LogError::NotSubscribed.into());
        }
        Ok(self.consumer.committed_offsets(self.session.timeout).await?)
    }

    pub async fn unsubscribe(&mut self) -> Result<()> {
        self.consumer.unsubscribe().await?;
        if let Some(cursor) = self.cursor.take() {
            tracing::info!(
                "Unsubscribed from {} after {} messages",
                cursor.topic,
                cursor.messages_seen
            );
        }
        Ok(())
    }

    /// Encode and produce one message, flushing every `flush_num_messages`.
    pub async fn produce(
        &mut self,
        topic: &str,
        key: Option<&DecodedValue>,
        value: Option<&DecodedValue>,
        options: &ProduceOptions,
    ) -> Result<()> {
        let key = self
            .codec
            .encode(
                key,
                options.key_format,
                options.key_schema.as_deref(),
                topic,
                true,
            )
            .await?;
        let value = self
            .codec
            .encode(
                value,
                options.value_format,
                options.value_schema.as_deref(),
                topic,
                false,
            )
            .await?;

        self.send(ProduceRequest {
            topic: topic.to_string(),
            key,
            value,
            partition: options.partition,
            timestamp: options.timestamp,
            headers: options.headers.clone(),
        })
        .await
    }

    /// Produce an already encoded message, flushing every `flush_num_messages`.
    pub async fn send(&mut self, request: ProduceRequest) -> Result<()> {
        self.producer.produce(request).await?;
        self.unflushed += 1;
        if self.unflushed >= self.session.flush_num_messages {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.producer.flush(self.session.flush_timeout).await?;
        if self.unflushed > 0 {
            tracing::debug!("Flushed {} messages on {}", self.unflushed, self.name);
        }
        self.unflushed = 0;
        Ok(())
    }
}
