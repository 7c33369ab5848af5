//! Kafka broker E2E tests
//!
//! These run the pipeline drivers against a real broker and are ignored by
//! default. Point `KAFKA_BROKER` at a broker (and optionally
//! `SCHEMA_REGISTRY_URL` at a registry) and run with `--ignored`.

mod round_trip;
