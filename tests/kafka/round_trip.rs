//! Upload, replicate and download through a live broker.

use kbridge::pipeline::{self, Identity};
use kbridge::testing::{generate_test_id, init_tracing};
use kbridge::{
    Cluster, DownloadOptions, Format, ReplicateOptions, RunOptions, UploadOptions,
};
use std::path::Path;

/// Kafka broker address for testing
const DEFAULT_KAFKA_BROKER: &str = "kafka:9092";

const SNACK_PROTO: &str = r#"syntax = "proto3";

message Snack {
  string name = 1;
  float calories = 2;
  string colour = 3;
}
"#;

fn write_cluster_config(home: &Path, name: &str) {
    let broker =
        std::env::var("KAFKA_BROKER").unwrap_or_else(|_| DEFAULT_KAFKA_BROKER.to_string());
    let mut config = format!(
        "[kafka]\n\"bootstrap.servers\" = \"{broker}\"\n\n[session]\ntimeout = \"5s\"\n"
    );
    if let Ok(url) = std::env::var("SCHEMA_REGISTRY_URL") {
        config.push_str(&format!("\n[schema_registry]\nurl = \"{url}\"\n"));
    }
    let clusters = home.join("clusters");
    std::fs::create_dir_all(&clusters).unwrap();
    std::fs::write(clusters.join(format!("{name}.toml")), config).unwrap();
}

#[tokio::test]
#[ignore = "requires a Kafka broker"]
async fn test_kafka_upload_replicate_download() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let test_id = generate_test_id();
    let home = tempfile::tempdir()?;
    write_cluster_config(home.path(), "local");

    let topic = format!("test-lines-{test_id}");
    let copy = format!("{topic}-copy");
    let input = home.path().join("in.txt");
    let output = home.path().join("out.txt");
    std::fs::write(&input, "k1/one\nk2/two\nk3/three\n")?;

    let mut cluster = Cluster::from_home(home.path(), "local")?;
    let with_keys = Some("/".to_string());
    let produced = pipeline::upload(
        &mut cluster,
        &input,
        &topic,
        &UploadOptions {
            key_value_separator: with_keys.clone(),
            ..UploadOptions::default()
        },
    )
    .await?;
    assert_eq!(produced, 3);

    let mut target = Cluster::from_home(home.path(), "local")?;
    let replicate = ReplicateOptions {
        run: RunOptions {
            n: Some(3),
            ..ReplicateOptions::default().run
        },
        keep_timestamps: true,
    };
    let replicated =
        pipeline::replicate(&mut cluster, &topic, &mut target, &copy, &mut Identity, &replicate)
            .await?;
    assert_eq!(replicated, 3);

    let download = DownloadOptions {
        run: RunOptions {
            n: Some(3),
            ..RunOptions::default()
        },
        key_value_separator: with_keys,
        ..DownloadOptions::default()
    };
    pipeline::download(&mut target, &copy, &output, &download).await?;
    assert_eq!(std::fs::read_to_string(&output)?, "k1/one\nk2/two\nk3/three\n");
    Ok(())
}

#[tokio::test]
#[ignore = "requires a Kafka broker and a schema registry"]
async fn test_kafka_protobuf_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    if std::env::var("SCHEMA_REGISTRY_URL").is_err() {
        tracing::warn!("SCHEMA_REGISTRY_URL not set, skipping");
        return Ok(());
    }
    let test_id = generate_test_id();
    let home = tempfile::tempdir()?;
    write_cluster_config(home.path(), "local");

    let topic = format!("test-snacks-{test_id}");
    let lines = "{\"name\": \"cookie\", \"calories\": 500.0, \"colour\": \"brown\"}\n";
    let input = home.path().join("snacks.txt");
    let output = home.path().join("snacks-out.txt");
    std::fs::write(&input, lines)?;

    let mut cluster = Cluster::from_home(home.path(), "local")?;
    pipeline::upload(
        &mut cluster,
        &input,
        &topic,
        &UploadOptions {
            value_format: Format::Protobuf,
            value_schema: Some(SNACK_PROTO.to_string()),
            ..UploadOptions::default()
        },
    )
    .await?;

    let download = DownloadOptions {
        run: RunOptions {
            value_format: Format::Protobuf,
            n: Some(1),
            ..RunOptions::default()
        },
        ..DownloadOptions::default()
    };
    pipeline::download(&mut cluster, &topic, &output, &download).await?;
    assert_eq!(std::fs::read_to_string(&output)?, lines);
    Ok(())
}
