use kafka_types::{LogError, LogProducer, ProduceRequest};
use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{Header as RdkafkaHeader, OwnedHeaders};
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord, Producer};
use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration for the Kafka producer
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Raw librdkafka properties
    pub properties: BTreeMap<String, String>,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            properties: BTreeMap::from([(
                "bootstrap.servers".to_string(),
                "localhost:9092".to_string(),
            )]),
        }
    }
}

/// Kafka producer implementing [`LogProducer`].
///
/// `produce` only enqueues; delivery reports are collected and checked on
/// `flush`.
pub struct KafkaProducer {
    producer: FutureProducer,
    pending: Vec<DeliveryFuture>,
}

impl KafkaProducer {
    pub fn new(config: &ProducerConfig) -> Result<Self, LogError> {
        let mut client_config = ClientConfig::new();
        for (key, value) in &config.properties {
            client_config.set(key, value);
        }
        let producer: FutureProducer = client_config.create().map_err(LogError::transport)?;
        Ok(Self {
            producer,
            pending: Vec::new(),
        })
    }

    /// Number of messages enqueued since the last flush.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait::async_trait]
impl LogProducer for KafkaProducer {
    async fn produce(&mut self, request: ProduceRequest) -> Result<(), LogError> {
        let mut record: FutureRecord<'_, [u8], [u8]> = FutureRecord::to(&request.topic);
        if let Some(key) = &request.key {
            record = record.key(key.as_slice());
        }
        if let Some(value) = &request.value {
            record = record.payload(value.as_slice());
        }
        if let Some(partition) = request.partition {
            record = record.partition(partition);
        }
        if let Some(timestamp) = request.timestamp {
            record = record.timestamp(timestamp);
        }
        if !request.headers.is_empty() {
            let mut headers = OwnedHeaders::new_with_capacity(request.headers.len());
            for header in &request.headers {
                headers = headers.insert(RdkafkaHeader {
                    key: &header.name,
                    value: header.value.as_deref(),
                });
            }
            record = record.headers(headers);
        }

        loop {
            match self.producer.send_result(record) {
                Ok(delivery) => {
                    self.pending.push(delivery);
                    return Ok(());
                }
                Err((KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull), returned)) => {
                    tracing::debug!("Producer queue full, waiting for deliveries");
                    record = returned;
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                Err((e, _)) => return Err(LogError::transport(e)),
            }
        }
    }

    async fn flush(&mut self, timeout: Duration) -> Result<(), LogError> {
        self.producer.flush(timeout).map_err(LogError::transport)?;

        for delivery in self.pending.drain(..) {
            match delivery.await {
                Ok(Ok(_)) => {}
                Ok(Err((e, _))) => return Err(LogError::transport(e)),
                Err(canceled) => return Err(LogError::transport(canceled)),
            }
        }
        Ok(())
    }
}
