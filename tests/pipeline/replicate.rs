//! Topic to topic copies on one or two in-memory clusters.

use crate::{produce_strings, SNACK_PROTO};
use kafka_types::{Header, LogProducer, ProduceRequest, Timestamp};
use kbridge::pipeline::{self, Identity, Map};
use kbridge::testing::{init_tracing, memory_cluster, MemoryLog, MemorySchemaStore, CLOCK_START_MS};
use kbridge::{
    DecodedValue, DownloadOptions, Format, ProduceOptions, ReplicateOptions, RunOptions,
    SessionConfig,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_replicate_then_download_keeps_order() {
    init_tracing();
    let source_log = MemoryLog::new();
    let target_log = MemoryLog::new();
    produce_strings(&source_log, "orders", &["first", "second", "third"]).await;

    let mut source = memory_cluster("source", &source_log, None, SessionConfig::default());
    let mut target = memory_cluster("target", &target_log, None, SessionConfig::default());

    let consumed = pipeline::replicate(
        &mut source,
        "orders",
        &mut target,
        "orders-copy",
        &mut Identity,
        &ReplicateOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(consumed, 3);
    assert!(target_log.flush_count() >= 1);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orders.txt");
    let written = pipeline::download(&mut target, "orders-copy", &path, &DownloadOptions::default())
        .await
        .unwrap();
    assert_eq!(written, 3);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "first\nsecond\nthird\n"
    );
}

#[tokio::test]
async fn test_replicate_keeps_partitions_timestamps_and_headers() {
    let log = MemoryLog::new();
    log.create_topic("events", 2);
    log.create_topic("events-copy", 2);
    let mut producer = log.producer();
    for (partition, timestamp, value) in [(0, 1_000, "a"), (1, 2_000, "b"), (1, 3_000, "c")] {
        producer
            .produce(ProduceRequest {
                partition: Some(partition),
                timestamp: Some(timestamp),
                value: Some(value.as_bytes().to_vec()),
                headers: vec![Header::new("origin", "test")],
                ..ProduceRequest::new("events")
            })
            .await
            .unwrap();
    }

    let mut source = memory_cluster("source", &log, None, SessionConfig::default());
    let mut target = memory_cluster("target", &log, None, SessionConfig::default());
    pipeline::replicate(
        &mut source,
        "events",
        &mut target,
        "events-copy",
        &mut Identity,
        &ReplicateOptions::default(),
    )
    .await
    .unwrap();

    let copied = log.messages("events-copy");
    let summary: Vec<_> = copied
        .iter()
        .map(|m| (m.partition, m.timestamp, m.value.clone().unwrap()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (0, Timestamp::CreateTime(1_000), b"a".to_vec()),
            (1, Timestamp::CreateTime(2_000), b"b".to_vec()),
            (1, Timestamp::CreateTime(3_000), b"c".to_vec()),
        ]
    );
    assert!(copied
        .iter()
        .all(|m| m.headers == vec![Header::new("origin", "test")]));
}

#[tokio::test]
async fn test_replicate_without_timestamps_lets_target_assign() {
    let log = MemoryLog::new();
    let mut producer = log.producer();
    producer
        .produce(ProduceRequest {
            timestamp: Some(1_000),
            value: Some(b"v".to_vec()),
            ..ProduceRequest::new("t")
        })
        .await
        .unwrap();

    let mut source = memory_cluster("source", &log, None, SessionConfig::default());
    let mut target = memory_cluster("target", &log, None, SessionConfig::default());
    let options = ReplicateOptions {
        keep_timestamps: false,
        ..ReplicateOptions::default()
    };
    pipeline::replicate(&mut source, "t", &mut target, "t-copy", &mut Identity, &options)
        .await
        .unwrap();

    let copied = log.messages("t-copy");
    assert_eq!(copied.len(), 1);
    let millis = copied[0].timestamp.millis().unwrap();
    assert!(millis > CLOCK_START_MS, "expected a fresh timestamp, got {millis}");
}

#[tokio::test]
async fn test_replicate_applies_transform() {
    let log = MemoryLog::new();
    produce_strings(&log, "words", &["apple", "pear"]).await;

    let mut source = memory_cluster("source", &log, None, SessionConfig::default());
    let mut target = memory_cluster("target", &log, None, SessionConfig::default());
    let options = ReplicateOptions {
        run: RunOptions {
            key_format: Format::Str,
            value_format: Format::Str,
            ..RunOptions::default()
        },
        keep_timestamps: true,
    };
    let mut shout = Map(|mut record: kbridge::NormalizedRecord| {
        if let Some(DecodedValue::String(s)) = &mut record.value {
            *s = s.to_uppercase();
        }
        record
    });
    pipeline::replicate(&mut source, "words", &mut target, "WORDS", &mut shout, &options)
        .await
        .unwrap();

    let values: Vec<_> = log
        .messages("WORDS")
        .into_iter()
        .map(|m| String::from_utf8(m.value.unwrap()).unwrap())
        .collect();
    assert_eq!(values, vec!["APPLE", "PEAR"]);
}

#[tokio::test]
async fn test_replicate_protobuf_registers_schema_for_target_topic() {
    let log = MemoryLog::new();
    let store = Arc::new(MemorySchemaStore::new());
    let mut source = memory_cluster("source", &log, Some(store.clone()), SessionConfig::default());
    let mut target = memory_cluster("target", &log, Some(store.clone()), SessionConfig::default());

    let snack = DecodedValue::Json(json!({"name": "cookie", "calories": 500.0, "colour": "brown"}));
    let produce_options = ProduceOptions {
        value_format: Format::Protobuf,
        value_schema: Some(SNACK_PROTO.to_string()),
        ..ProduceOptions::default()
    };
    source
        .produce("snacks", None, Some(&snack), &produce_options)
        .await
        .unwrap();
    source.flush().await.unwrap();

    let options = ReplicateOptions {
        run: RunOptions {
            key_format: Format::Bytes,
            value_format: Format::Protobuf,
            ..RunOptions::default()
        },
        keep_timestamps: true,
    };
    let consumed = pipeline::replicate(
        &mut source,
        "snacks",
        &mut target,
        "snacks-copy",
        &mut Identity,
        &options,
    )
    .await
    .unwrap();
    assert_eq!(consumed, 1);

    // identical schema text, so the registry hands out the same id
    assert_eq!(store.subject_ids("snacks-copy-value"), store.subject_ids("snacks-value"));
    let copied = log.messages("snacks-copy");
    assert_eq!(copied[0].key, None);
    assert_eq!(copied[0].value, log.messages("snacks")[0].value);
}

#[tokio::test]
async fn test_replicate_protobuf_transform_reencodes_every_record() {
    let log = MemoryLog::new();
    let store = Arc::new(MemorySchemaStore::new());
    let mut source = memory_cluster("source", &log, Some(store.clone()), SessionConfig::default());
    let mut target = memory_cluster("target", &log, Some(store.clone()), SessionConfig::default());

    let produce_options = ProduceOptions {
        value_format: Format::Protobuf,
        value_schema: Some(SNACK_PROTO.to_string()),
        ..ProduceOptions::default()
    };
    for (name, calories) in [("cookie", 500.0), ("cake", 250.5), ("timtam", 100.0)] {
        let snack = DecodedValue::Json(json!({"name": name, "calories": calories, "colour": "brown"}));
        source
            .produce("snacks", None, Some(&snack), &produce_options)
            .await
            .unwrap();
    }
    source.flush().await.unwrap();

    let run = RunOptions {
        key_format: Format::Bytes,
        value_format: Format::Protobuf,
        ..RunOptions::default()
    };
    let options = ReplicateOptions {
        run: run.clone(),
        keep_timestamps: true,
    };
    let mut double = Map(|mut record: kbridge::NormalizedRecord| {
        if let Some(snack) = record.value.as_mut().and_then(DecodedValue::as_json_mut) {
            let calories = snack["calories"].as_f64().unwrap_or_default();
            snack["calories"] = json!(calories * 2.0);
        }
        record
    });
    let consumed = pipeline::replicate(
        &mut source,
        "snacks",
        &mut target,
        "snacks-doubled",
        &mut double,
        &options,
    )
    .await
    .unwrap();
    assert_eq!(consumed, 3);

    let copied = log.messages("snacks-doubled");
    assert_eq!(copied.len(), 3);
    assert_ne!(copied[0].value, log.messages("snacks")[0].value);

    let decoded = pipeline::grep(&mut target, "snacks-doubled", |_| true, &run)
        .await
        .unwrap();
    let snacks: Vec<_> = decoded
        .iter()
        .map(|record| {
            let snack = record.value.as_ref().and_then(DecodedValue::as_json).unwrap();
            (snack["name"].as_str().unwrap(), snack["calories"].as_f64().unwrap())
        })
        .collect();
    assert_eq!(
        snacks,
        vec![("cookie", 1000.0), ("cake", 501.0), ("timtam", 200.0)]
    );
}
