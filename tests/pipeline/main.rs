//! Pipeline integration tests
//!
//! Every test runs against the in-memory log and schema store from
//! `kbridge::testing`, so no broker or registry is needed. Broker-backed
//! runs of the same drivers live in `tests/kafka`.

mod consume;
mod file_transfer;
mod replicate;

use kafka_types::{LogProducer, ProduceRequest};
use kbridge::testing::MemoryLog;

/// Produce `values` as string messages to partition 0 of `topic`.
pub async fn produce_strings(log: &MemoryLog, topic: &str, values: &[&str]) {
    let mut producer = log.producer();
    for value in values {
        producer
            .produce(ProduceRequest {
                value: Some(value.as_bytes().to_vec()),
                ..ProduceRequest::new(topic)
            })
            .await
            .unwrap();
    }
}

pub const SNACK_PROTO: &str = r#"syntax = "proto3";

message Snack {
  string name = 1;
  float calories = 2;
  string colour = 3;
}
"#;
