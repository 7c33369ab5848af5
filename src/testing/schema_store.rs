//! In-memory [`SchemaStore`] with call counters.

use async_trait::async_trait;
use kafka_types::{Format, SchemaId};
use kbridge_schema_registry::{Error, RegisteredSchema, Result, SchemaStore};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct StoreState {
    /// Schema id `n` is at index `n - 1`.
    schemas: Vec<RegisteredSchema>,
    subjects: BTreeMap<String, Vec<SchemaId>>,
}

/// Assigns ids from 1 upwards. Registering identical text (of the same type)
/// again returns the existing id, under any subject.
#[derive(Debug, Default)]
pub struct MemorySchemaStore {
    state: Mutex<StoreState>,
    gets: AtomicUsize,
    registrations: AtomicUsize,
}

impl MemorySchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `schema` without a subject, as if another client registered it.
    pub fn insert(&self, schema: &str, format: Format) -> SchemaId {
        let registered = RegisteredSchema {
            schema: schema.to_string(),
            schema_type: schema_type(format),
        };
        let mut state = self.lock();
        if let Some(index) = state.schemas.iter().position(|s| *s == registered) {
            return id_at(index);
        }
        state.schemas.push(registered);
        id_at(state.schemas.len() - 1)
    }

    /// Number of `get_schema` calls so far.
    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `register` calls so far.
    pub fn register_count(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Ids registered under `subject`, in registration order.
    pub fn subject_ids(&self, subject: &str) -> Vec<SchemaId> {
        self.lock().subjects.get(subject).cloned().unwrap_or_default()
    }
}

/// Avro is the registry default and is stored without a type.
fn schema_type(format: Format) -> Option<String> {
    match format {
        Format::Avro => None,
        other => other.schema_type().map(str::to_string),
    }
}

fn id_at(index: usize) -> SchemaId {
    SchemaId(u32::try_from(index + 1).unwrap_or(u32::MAX))
}

#[async_trait]
impl SchemaStore for MemorySchemaStore {
    async fn get_schema(&self, id: SchemaId) -> Result<RegisteredSchema> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let index = usize::try_from(id.0).unwrap_or(usize::MAX);
        self.lock()
            .schemas
            .get(index.wrapping_sub(1))
            .cloned()
            .ok_or_else(|| Error::SchemaFetch {
                id,
                message: "Schema not found".to_string(),
            })
    }

    async fn register(&self, subject: &str, schema: &str, format: Format) -> Result<SchemaId> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        if !format.is_structural() {
            return Err(Error::SchemaRegistration {
                subject: subject.to_string(),
                message: format!("{format} schemas cannot be registered"),
            });
        }

        let id = self.insert(schema, format);
        let mut state = self.lock();
        let ids = state.subjects.entry(subject.to_string()).or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
        Ok(id)
    }
}
