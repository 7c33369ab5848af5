//! Subscriptions, offsets, budgets and the fold family.

use crate::produce_strings;
use kafka_types::{CommittedOffset, LogError, PartitionOffsets};
use kbridge::pipeline::{self, Map};
use kbridge::testing::{memory_cluster, MemoryLog};
use kbridge::{DecodedValue, Error, RunOptions, SessionConfig, SubscribeOptions};
use std::collections::BTreeMap;

fn values(records: &[kbridge::NormalizedRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.value.as_ref().map(DecodedValue::to_text).unwrap_or_default())
        .collect()
}

#[tokio::test]
async fn test_explicit_offsets_skip_earlier_messages() {
    let log = MemoryLog::new();
    produce_strings(&log, "t", &["m0", "m1", "m2"]).await;
    let mut cluster = memory_cluster("local", &log, None, SessionConfig::default());

    let options = RunOptions {
        offsets: Some(PartitionOffsets::from([(0, 2)])),
        ..RunOptions::default()
    };
    let records = pipeline::grep(&mut cluster, "t", |_| true, &options)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].offset, 2);
    assert_eq!(values(&records), vec!["m2"]);
}

#[tokio::test]
async fn test_offset_for_missing_partition_is_rejected() {
    let log = MemoryLog::new();
    log.create_topic("t", 2);
    let mut cluster = memory_cluster("local", &log, None, SessionConfig::default());

    let options = RunOptions {
        offsets: Some(PartitionOffsets::from([(5, 0)])),
        ..RunOptions::default()
    };
    let err = pipeline::foreach(&mut cluster, "t", |_| {}, &options)
        .await
        .unwrap_err();
    match err {
        Error::Log(LogError::InvalidOffset {
            partition,
            partition_count,
            ..
        }) => {
            assert_eq!(partition, 5);
            assert_eq!(partition_count, 2);
        }
        other => panic!("expected InvalidOffset, got {other}"),
    }
    assert!(cluster.cursor().is_none());
}

#[tokio::test]
async fn test_budget_reads_whole_batches() {
    let log = MemoryLog::new();
    let values: Vec<String> = (0..10).map(|i| format!("m{i}")).collect();
    let refs: Vec<&str> = values.iter().map(String::as_str).collect();
    produce_strings(&log, "t", &refs).await;
    let mut cluster = memory_cluster("local", &log, None, SessionConfig::default());

    let options = RunOptions {
        n: Some(5),
        batch_size: 2,
        ..RunOptions::default()
    };
    let mut seen = Vec::new();
    let consumed = pipeline::foreach(
        &mut cluster,
        "t",
        |record| seen.push(record.offset),
        &options,
    )
    .await
    .unwrap();
    assert_eq!(consumed, 6);
    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_fold_and_grep() {
    let log = MemoryLog::new();
    produce_strings(&log, "fruit", &["apple", "banana", "avocado", "cherry"]).await;
    let mut cluster = memory_cluster("local", &log, None, SessionConfig::default());
    let options = RunOptions {
        batch_size: 3,
        ..RunOptions::default()
    };

    let lengths = pipeline::fold(
        &mut cluster,
        "fruit",
        &mut |record: kbridge::NormalizedRecord| {
            vec![record.value.map(|v| v.to_text().len()).unwrap_or_default()]
        },
        &options,
    )
    .await
    .unwrap();
    assert_eq!(lengths, vec![5, 6, 7, 6]);

    let a_words = pipeline::grep(
        &mut cluster,
        "fruit",
        |record| {
            record
                .value
                .as_ref()
                .and_then(DecodedValue::as_str)
                .is_some_and(|s| s.starts_with('a'))
        },
        &options,
    )
    .await
    .unwrap();
    assert_eq!(values(&a_words), vec!["apple", "avocado"]);

    let upper = pipeline::fold(
        &mut cluster,
        "fruit",
        &mut Map(|mut record: kbridge::NormalizedRecord| {
            record.value = record.value.map(|v| DecodedValue::from(v.to_text().to_uppercase()));
            record
        }),
        &options,
    )
    .await
    .unwrap();
    assert_eq!(values(&upper), vec!["APPLE", "BANANA", "AVOCADO", "CHERRY"]);
}

#[tokio::test]
async fn test_manual_commit_and_offsets() {
    let log = MemoryLog::new();
    produce_strings(&log, "t", &["a", "b", "c"]).await;
    let session = SessionConfig {
        enable_auto_commit: false,
        ..SessionConfig::default()
    };
    let mut cluster = memory_cluster("local", &log, None, session);

    let subscribe = || SubscribeOptions {
        group: Some("readers".to_string()),
        ..SubscribeOptions::default()
    };
    cluster.subscribe("t", subscribe()).await.unwrap();
    // committing before anything was consumed is a no-op
    cluster.commit().await.unwrap();
    assert_eq!(
        cluster.offsets().await.unwrap(),
        BTreeMap::from([(0, CommittedOffset::Invalid)])
    );

    let batch = cluster.consume(2).await.unwrap();
    assert_eq!(values(&batch), vec!["a", "b"]);
    cluster.commit().await.unwrap();
    assert_eq!(
        cluster.offsets().await.unwrap(),
        BTreeMap::from([(0, CommittedOffset::Offset(2))])
    );
    assert_eq!(log.committed("readers", "t", 0), Some(2));
    cluster.unsubscribe().await.unwrap();

    // the same group resumes after the committed message
    cluster.subscribe("t", subscribe()).await.unwrap();
    let batch = cluster.consume(10).await.unwrap();
    assert_eq!(values(&batch), vec!["c"]);
    assert_eq!(cluster.cursor().unwrap().messages_seen, 1);
    cluster.unsubscribe().await.unwrap();
}

#[tokio::test]
async fn test_latest_reset_skips_existing_messages() {
    let log = MemoryLog::new();
    produce_strings(&log, "t", &["old"]).await;
    let session = SessionConfig {
        auto_offset_reset: "latest".to_string(),
        ..SessionConfig::default()
    };
    let mut cluster = memory_cluster("local", &log, None, session);

    cluster
        .subscribe("t", SubscribeOptions::default())
        .await
        .unwrap();
    produce_strings(&log, "t", &["new"]).await;
    let batch = cluster.consume(10).await.unwrap();
    assert_eq!(values(&batch), vec!["new"]);
    cluster.unsubscribe().await.unwrap();
}
