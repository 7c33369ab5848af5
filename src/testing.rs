//! Test infrastructure: an in-memory log and schema store that stand in for
//! the broker and the schema registry.
//!
//! Integration tests under `tests/pipeline/` drive the full pipeline through
//! [`memory_cluster`] without any external service.

pub mod memory_log;
pub mod schema_store;
pub mod test_helpers;

pub use memory_log::{MemoryConsumer, MemoryLog, MemoryProducer, CLOCK_START_MS};
pub use schema_store::MemorySchemaStore;
pub use test_helpers::{generate_test_id, init_tracing, memory_cluster, unique_scratch_dir};
