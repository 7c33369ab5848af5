//! Per-id schema cache.
//!
//! Entries are keyed by `(format, schema id)`. Each format family has its own
//! map, so an id seen as Avro never answers a protobuf lookup. Entries are
//! never evicted or replaced: a schema change on the registry side always
//! produces a new id.

use crate::descriptor::{
    AvroDescriptorBuilder, DescriptorBuilder, JsonSchemaDescriptorBuilder, TypeDescriptor,
};
use crate::error::{Error, Result};
use crate::store::{subject_name, SchemaStore};
use kafka_types::{Format, SchemaId};
use std::collections::HashMap;
use std::sync::Arc;

/// A resolved schema with its compiled descriptor.
#[derive(Debug)]
pub struct SchemaEntry {
    pub id: SchemaId,
    pub format: Format,
    pub raw_text: String,
    pub descriptor: TypeDescriptor,
}

pub struct SchemaCache {
    store: Arc<dyn SchemaStore>,
    builders: HashMap<Format, Arc<dyn DescriptorBuilder>>,
    entries: HashMap<Format, HashMap<SchemaId, Arc<SchemaEntry>>>,
}

impl SchemaCache {
    /// Cache with the Avro and JSON Schema builders installed. Protobuf needs
    /// a builder with a scratch directory, added through [`Self::with_builder`].
    pub fn new(store: Arc<dyn SchemaStore>) -> Self {
        Self {
            store,
            builders: HashMap::new(),
            entries: HashMap::new(),
        }
        .with_builder(AvroDescriptorBuilder)
        .with_builder(JsonSchemaDescriptorBuilder)
    }

    /// Install or replace the builder for the builder's format.
    pub fn with_builder(mut self, builder: impl DescriptorBuilder + 'static) -> Self {
        self.builders.insert(builder.format(), Arc::new(builder));
        self
    }

    pub fn store(&self) -> &Arc<dyn SchemaStore> {
        &self.store
    }

    /// Return the entry for `id`, fetching and compiling it on first use.
    pub async fn resolve(&mut self, format: Format, id: SchemaId) -> Result<Arc<SchemaEntry>> {
        if let Some(entry) = self.cached(format, id) {
            return Ok(entry);
        }

        let registered = self.store.get_schema(id).await?;
        tracing::debug!("Resolved {format} schema {id} from the registry");
        self.insert(format, id, registered.schema)
    }

    /// Register `text` for the topic's key or value subject and return its id.
    pub async fn register(
        &mut self,
        text: &str,
        format: Format,
        topic: &str,
        is_key: bool,
    ) -> Result<SchemaId> {
        let subject = subject_name(topic, is_key);
        let id = self.store.register(&subject, text, format).await?;
        tracing::debug!("Registered {format} schema under {subject} as id {id}");
        Ok(id)
    }

    /// Entry for a schema the caller just registered. Compiles `text` only when
    /// the id is not cached yet, so registration never compiles twice.
    pub fn entry_for_registered(
        &mut self,
        format: Format,
        id: SchemaId,
        text: &str,
    ) -> Result<Arc<SchemaEntry>> {
        if let Some(entry) = self.cached(format, id) {
            return Ok(entry);
        }
        self.insert(format, id, text.to_string())
    }

    pub fn cached(&self, format: Format, id: SchemaId) -> Option<Arc<SchemaEntry>> {
        self.entries
            .get(&format)
            .and_then(|by_id| by_id.get(&id))
            .cloned()
    }

    /// Number of cached entries across all formats.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, format: Format, id: SchemaId, raw_text: String) -> Result<Arc<SchemaEntry>> {
        let builder = self
            .builders
            .get(&format)
            .ok_or(Error::UnsupportedFormat(format))?;
        let descriptor = builder.compile(id, &raw_text)?;
        let entry = Arc::new(SchemaEntry {
            id,
            format,
            raw_text,
            descriptor,
        });
        self.entries
            .entry(format)
            .or_default()
            .insert(id, Arc::clone(&entry));
        Ok(entry)
    }
}
