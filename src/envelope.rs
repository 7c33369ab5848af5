//! Raw broker messages to normalized records and back.

use crate::codec::Codec;
use crate::error::Result;
use kafka_types::{Format, NormalizedRecord, ProduceRequest, RawMessage};

/// Schema texts that take precedence over the ones a record was decoded with.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaOverrides<'a> {
    pub key: Option<&'a str>,
    pub value: Option<&'a str>,
}

/// Key and value formats used on one side of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvelopeTranslator {
    pub key_format: Format,
    pub value_format: Format,
}

impl EnvelopeTranslator {
    pub fn new(key_format: Format, value_format: Format) -> Self {
        Self {
            key_format,
            value_format,
        }
    }

    /// Decode key and value of `raw`. Headers, partition, offset and
    /// timestamp are carried over unchanged.
    pub async fn to_record(&self, codec: &mut Codec, raw: RawMessage) -> Result<NormalizedRecord> {
        let key = codec
            .decode(raw.key.as_deref(), self.key_format, &raw.topic, true)
            .await?;
        let value = codec
            .decode(raw.value.as_deref(), self.value_format, &raw.topic, false)
            .await?;

        Ok(NormalizedRecord {
            headers: raw.headers,
            topic: raw.topic,
            partition: raw.partition,
            offset: raw.offset,
            timestamp: raw.timestamp,
            key: key.value,
            value: value.value,
            key_schema: key.schema,
            value_schema: value.schema,
        })
    }

    /// Encode `record` for `topic`. The record's own schema texts are used
    /// unless `overrides` names one. Partition and timestamp are left for the
    /// caller to decide.
    pub async fn from_record(
        &self,
        codec: &mut Codec,
        record: &NormalizedRecord,
        topic: &str,
        overrides: SchemaOverrides<'_>,
    ) -> Result<ProduceRequest> {
        let key_schema = overrides.key.or(record.key_schema.as_deref());
        let value_schema = overrides.value.or(record.value_schema.as_deref());

        let key = codec
            .encode(record.key.as_ref(), self.key_format, key_schema, topic, true)
            .await?;
        let value = codec
            .encode(
                record.value.as_ref(),
                self.value_format,
                value_schema,
                topic,
                false,
            )
            .await?;

        Ok(ProduceRequest {
            topic: topic.to_string(),
            key,
            value,
            partition: None,
            timestamp: None,
            headers: record.headers.clone(),
        })
    }
}
