//! Download and upload between topics and files.

use crate::{produce_strings, SNACK_PROTO};
use kbridge::pipeline;
use kbridge::testing::{memory_cluster, MemoryLog, MemorySchemaStore};
use kbridge::{DownloadOptions, Format, RunOptions, SessionConfig, UploadOptions};
use std::sync::Arc;

const SNACK_VALUES: &str = r#"{"name": "cookie", "calories": 500.0, "colour": "brown"}
{"name": "cake", "calories": 260.0, "colour": "white"}
{"name": "timtam", "calories": 80.0, "colour": "chocolate"}
"#;

const SNACK_KEY_VALUES: &str = r#"{"name": "cookie_key", "calories": 500.0, "colour": "brown"}/{"name": "cookie_value", "calories": 500.0, "colour": "brown"}
{"name": "cake_key", "calories": 260.0, "colour": "white"}/{"name": "cake_value", "calories": 260.0, "colour": "white"}
{"name": "timtam_key", "calories": 80.0, "colour": "chocolate"}/{"name": "timtam_value", "calories": 80.0, "colour": "chocolate"}
"#;

const SNACK_PROTO2: &str =
    "message Snack { required string name = 1; required float calories = 2; optional string colour = 3; }";

const SNACK_AVRO: &str = r#"{ "type": "record", "name": "myrecord", "fields": [{"name": "name",  "type": "string" }, {"name": "calories", "type": "float" }, {"name": "colour", "type": "string" }] }"#;

fn key_value_upload(format: Format, schema: &str) -> UploadOptions {
    UploadOptions {
        key_format: format,
        value_format: format,
        key_schema: Some(schema.to_string()),
        value_schema: Some(schema.to_string()),
        key_value_separator: Some("/".to_string()),
        ..UploadOptions::default()
    }
}

fn key_value_download(format: Format) -> DownloadOptions {
    DownloadOptions {
        run: RunOptions {
            key_format: format,
            value_format: format,
            ..RunOptions::default()
        },
        key_value_separator: Some("/".to_string()),
        ..DownloadOptions::default()
    }
}

/// Upload `content` with `upload`, download it with `download` through a
/// second cluster on the same log and registry, and return the file text.
async fn round_trip(
    content: &str,
    upload: &UploadOptions,
    download: &DownloadOptions,
    store: &Arc<MemorySchemaStore>,
) -> String {
    let log = MemoryLog::new();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("snacks.txt");
    let output = dir.path().join("snacks-out.txt");
    std::fs::write(&input, content).unwrap();

    let mut writer = memory_cluster("writer", &log, Some(store.clone()), SessionConfig::default());
    let produced = pipeline::upload(&mut writer, &input, "snacks", upload)
        .await
        .unwrap();
    assert_eq!(produced, content.lines().count());

    let mut reader = memory_cluster("reader", &log, Some(store.clone()), SessionConfig::default());
    let consumed = pipeline::download(&mut reader, "snacks", &output, download)
        .await
        .unwrap();
    assert_eq!(consumed, produced);
    std::fs::read_to_string(&output).unwrap()
}

#[tokio::test]
async fn test_protobuf_values_round_trip_byte_for_byte() {
    let store = Arc::new(MemorySchemaStore::new());
    let upload = UploadOptions {
        value_format: Format::Protobuf,
        value_schema: Some(SNACK_PROTO.to_string()),
        ..UploadOptions::default()
    };
    let download = DownloadOptions {
        run: RunOptions {
            value_format: Format::Protobuf,
            ..RunOptions::default()
        },
        ..DownloadOptions::default()
    };
    let written = round_trip(SNACK_VALUES, &upload, &download, &store).await;
    assert_eq!(written, SNACK_VALUES);
    assert_eq!(store.subject_ids("snacks-value").len(), 1);
    assert!(store.subject_ids("snacks-key").is_empty());
}

#[tokio::test]
async fn test_proto2_keys_and_values_round_trip_byte_for_byte() {
    let store = Arc::new(MemorySchemaStore::new());
    let written = round_trip(
        SNACK_KEY_VALUES,
        &key_value_upload(Format::Protobuf, SNACK_PROTO2),
        &key_value_download(Format::Protobuf),
        &store,
    )
    .await;
    assert_eq!(written, SNACK_KEY_VALUES);
    // one schema text, registered under both subjects
    assert_eq!(store.subject_ids("snacks-key"), store.subject_ids("snacks-value"));
}

#[tokio::test]
async fn test_avro_keys_and_values_round_trip_byte_for_byte() {
    let store = Arc::new(MemorySchemaStore::new());
    let written = round_trip(
        SNACK_KEY_VALUES,
        &key_value_upload(Format::Avro, SNACK_AVRO),
        &key_value_download(Format::Avro),
        &store,
    )
    .await;
    assert_eq!(written, SNACK_KEY_VALUES);
}

#[tokio::test]
async fn test_schema_fetched_once_per_cluster() {
    let log = MemoryLog::new();
    let store = Arc::new(MemorySchemaStore::new());
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("snacks.txt");
    std::fs::write(&input, SNACK_KEY_VALUES).unwrap();

    let mut writer = memory_cluster("writer", &log, Some(store.clone()), SessionConfig::default());
    pipeline::upload(
        &mut writer,
        &input,
        "snacks",
        &key_value_upload(Format::Protobuf, SNACK_PROTO2),
    )
    .await
    .unwrap();
    assert_eq!(store.get_count(), 0);

    let mut reader = memory_cluster("reader", &log, Some(store.clone()), SessionConfig::default());
    let output = dir.path().join("first.txt");
    pipeline::download(&mut reader, "snacks", &output, &key_value_download(Format::Protobuf))
        .await
        .unwrap();
    assert_eq!(store.get_count(), 1);

    let output = dir.path().join("second.txt");
    pipeline::download(&mut reader, "snacks", &output, &key_value_download(Format::Protobuf))
        .await
        .unwrap();
    assert_eq!(store.get_count(), 1);
}

#[tokio::test]
async fn test_download_append_and_custom_separators() {
    let log = MemoryLog::new();
    produce_strings(&log, "lines", &["a", "b"]).await;
    let mut cluster = memory_cluster("local", &log, None, SessionConfig::default());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    std::fs::write(&path, "existing|").unwrap();

    let options = DownloadOptions {
        message_separator: "|".to_string(),
        overwrite: false,
        ..DownloadOptions::default()
    };
    pipeline::download(&mut cluster, "lines", &path, &options)
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "existing|a|b|");

    let overwrite = DownloadOptions {
        key_value_separator: Some(":".to_string()),
        ..DownloadOptions::default()
    };
    pipeline::download(&mut cluster, "lines", &path, &overwrite)
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), ":a\n:b\n");
}

#[tokio::test]
async fn test_upload_skips_blank_lines_and_keeps_unsplit_records() {
    let log = MemoryLog::new();
    let mut cluster = memory_cluster("local", &log, None, SessionConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("in.txt");
    std::fs::write(&path, "k1=v1\n\n   \nno separator\nk2=v2=x\nk3=v3").unwrap();

    let options = UploadOptions {
        key_value_separator: Some("=".to_string()),
        ..UploadOptions::default()
    };
    let produced = pipeline::upload(&mut cluster, &path, "kv", &options)
        .await
        .unwrap();
    assert_eq!(produced, 4);

    let pairs: Vec<_> = log
        .messages("kv")
        .into_iter()
        .map(|m| {
            (
                m.key.map(|k| String::from_utf8(k).unwrap()),
                String::from_utf8(m.value.unwrap()).unwrap(),
            )
        })
        .collect();
    assert_eq!(
        pairs,
        vec![
            (Some("k1".to_string()), "v1".to_string()),
            (None, "no separator".to_string()),
            (None, "k2=v2=x".to_string()),
            (Some("k3".to_string()), "v3".to_string()),
        ]
    );
    assert_eq!(log.flush_count(), 1);
}

#[tokio::test]
async fn test_json_upload_and_download() {
    let log = MemoryLog::new();
    let mut cluster = memory_cluster("local", &log, None, SessionConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.jsonl");
    let output = dir.path().join("out.jsonl");
    std::fs::write(&input, "{\"id\": 1, \"tags\": [\"a\"]}\n{\"id\":2}\n").unwrap();

    let upload = UploadOptions {
        value_format: Format::Json,
        ..UploadOptions::default()
    };
    pipeline::upload(&mut cluster, &input, "docs", &upload)
        .await
        .unwrap();

    let download = DownloadOptions {
        run: RunOptions {
            value_format: Format::Json,
            ..RunOptions::default()
        },
        ..DownloadOptions::default()
    };
    pipeline::download(&mut cluster, "docs", &output, &download)
        .await
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "{\"id\": 1, \"tags\": [\"a\"]}\n{\"id\": 2}\n"
    );
}

#[tokio::test]
async fn test_upload_protobuf_without_schema_fails() {
    let log = MemoryLog::new();
    let store = Arc::new(MemorySchemaStore::new());
    let mut cluster = memory_cluster("local", &log, Some(store), SessionConfig::default());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("in.txt");
    std::fs::write(&path, "{\"name\":\"cookie\"}\n").unwrap();

    let options = UploadOptions {
        value_format: Format::Protobuf,
        ..UploadOptions::default()
    };
    let err = pipeline::upload(&mut cluster, &path, "snacks", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, kbridge::Error::Encode { .. }), "{err}");
    assert!(log.messages("snacks").is_empty());
}
