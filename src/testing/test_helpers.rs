//! Shared helpers for unit and integration tests.

use super::memory_log::MemoryLog;
use super::schema_store::MemorySchemaStore;
use crate::cluster::Cluster;
use crate::codec::Codec;
use crate::config::SessionConfig;
use kbridge_kafka::{ProtoCompiler, ProtoDescriptorBuilder};
use kbridge_schema_registry::SchemaCache;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// Unique identifiers for parallel test execution
static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique test identifier for parallel test execution
pub fn generate_test_id() -> u64 {
    let timestamp = u64::try_from(chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
        .unwrap_or_default();
    let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    timestamp.wrapping_add(counter)
}

/// A scratch directory no other test (or test process) writes to.
pub fn unique_scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join("kbridge-test").join(format!(
        "{name}-{}-{}",
        std::process::id(),
        generate_test_id()
    ))
}

/// A [`Cluster`] over `log`, with a schema registry when `store` is given.
pub fn memory_cluster(
    name: &str,
    log: &MemoryLog,
    store: Option<Arc<MemorySchemaStore>>,
    session: SessionConfig,
) -> Cluster {
    let cache = store.map(|store| {
        SchemaCache::new(store).with_builder(ProtoDescriptorBuilder::new(
            unique_scratch_dir(name),
            ProtoCompiler::Pure,
        ))
    });
    Cluster::new(
        name,
        session.clone(),
        Box::new(log.consumer(&session)),
        Box::new(log.producer()),
        Codec::new(name, cache),
    )
}

/// Route `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
